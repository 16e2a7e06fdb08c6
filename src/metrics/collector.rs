//! Metrics collection and registry.

use crate::component::{ComponentState, DepthCamera};
use crate::publish::FrameSink;
use crate::sensor::SensorDriver;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of component state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Whether the component is currently active.
    pub is_active: bool,
    /// Ticks executed.
    pub ticks: u64,
    /// Ticks aborted by a sensor error.
    pub failed_ticks: u64,
    /// Depth frames published.
    pub depth_frames: u64,
    /// Image frames published.
    pub image_frames: u64,
    /// Image frames with an unrecognized pixel format.
    pub unknown_formats: u64,
    /// Output port writes the sink rejected.
    pub sink_errors: u64,
    /// Sequence number of the last published depth frame.
    pub last_depth_sequence: Option<u32>,
    /// Sequence number of the last published image frame.
    pub last_image_sequence: Option<u32>,
}

/// Prometheus metrics registry for acquisition monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    active: IntGauge,

    // Tick metrics
    ticks_total: IntCounter,
    failed_ticks_total: IntCounter,

    // Stream metrics
    depth_frames_total: IntCounter,
    image_frames_total: IntCounter,
    unknown_formats_total: IntCounter,
    last_depth_sequence: IntGauge,
    last_image_sequence: IntGauge,

    // Port metrics
    sink_errors_total: IntCounter,
}

/// Advances a counter to an absolute total.
fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all acquisition metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let active = IntGauge::new(
            "depthcam_active",
            "Component activation state (1=active, 0=inactive)",
        )?;

        let ticks_total = IntCounter::new("depthcam_ticks_total", "Total ticks executed")?;
        let failed_ticks_total = IntCounter::new(
            "depthcam_failed_ticks_total",
            "Ticks skipped because the sensor update failed",
        )?;

        let depth_frames_total = IntCounter::new(
            "depthcam_depth_frames_total",
            "Depth frames published on the depth_map and points ports",
        )?;
        let image_frames_total = IntCounter::new(
            "depthcam_image_frames_total",
            "Image frames published on the image port",
        )?;
        let unknown_formats_total = IntCounter::new(
            "depthcam_unknown_formats_total",
            "Image frames with an unrecognized pixel format",
        )?;
        let last_depth_sequence = IntGauge::new(
            "depthcam_last_depth_sequence",
            "Driver sequence number of the last published depth frame",
        )?;
        let last_image_sequence = IntGauge::new(
            "depthcam_last_image_sequence",
            "Driver sequence number of the last published image frame",
        )?;

        let sink_errors_total = IntCounter::new(
            "depthcam_sink_errors_total",
            "Output port writes rejected by the transport",
        )?;

        registry.register(Box::new(active.clone()))?;
        registry.register(Box::new(ticks_total.clone()))?;
        registry.register(Box::new(failed_ticks_total.clone()))?;
        registry.register(Box::new(depth_frames_total.clone()))?;
        registry.register(Box::new(image_frames_total.clone()))?;
        registry.register(Box::new(unknown_formats_total.clone()))?;
        registry.register(Box::new(last_depth_sequence.clone()))?;
        registry.register(Box::new(last_image_sequence.clone()))?;
        registry.register(Box::new(sink_errors_total.clone()))?;

        Ok(Self {
            registry,
            active,
            ticks_total,
            failed_ticks_total,
            depth_frames_total,
            image_frames_total,
            unknown_formats_total,
            last_depth_sequence,
            last_image_sequence,
            sink_errors_total,
        })
    }

    /// Updates all metrics from a snapshot of component state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.active.set(i64::from(snapshot.is_active));

        // Counters only move forward, so apply the difference
        advance(&self.ticks_total, snapshot.ticks);
        advance(&self.failed_ticks_total, snapshot.failed_ticks);
        advance(&self.depth_frames_total, snapshot.depth_frames);
        advance(&self.image_frames_total, snapshot.image_frames);
        advance(&self.unknown_formats_total, snapshot.unknown_formats);
        advance(&self.sink_errors_total, snapshot.sink_errors);

        if let Some(seq) = snapshot.last_depth_sequence {
            self.last_depth_sequence.set(i64::from(seq));
        }
        if let Some(seq) = snapshot.last_image_sequence {
            self.last_image_sequence.set(i64::from(seq));
        }
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl MetricsSnapshot {
    /// Creates a snapshot from the current state of a component.
    pub fn from_camera<D: SensorDriver, S: FrameSink>(camera: &DepthCamera<D, S>) -> Self {
        let stats = camera.stats();
        Self {
            is_active: camera.state() == ComponentState::Active,
            ticks: stats.ticks,
            failed_ticks: stats.failed_ticks,
            depth_frames: stats.depth_frames,
            image_frames: stats.image_frames,
            unknown_formats: stats.unknown_formats,
            sink_errors: stats.sink_errors,
            last_depth_sequence: stats.last_depth_sequence,
            last_image_sequence: stats.last_image_sequence,
        }
    }
}
