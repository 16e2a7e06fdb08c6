//! Depth camera component driven through the lifecycle hooks.

use super::factory::InstanceGuard;
use super::poller::{FramePoller, TickReport};
use super::{ComponentError, ComponentState, Lifecycle};
use crate::config::SensorConfig;
use crate::convert::{Projection, UnknownFormatPolicy};
use crate::publish::{FrameSink, PortCounters, Publisher};
use crate::sensor::{CalibrationParams, SensorDriver, SensorSession, StreamKind};

/// Running totals over the component's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub ticks: u64,
    pub failed_ticks: u64,
    pub depth_frames: u64,
    pub image_frames: u64,
    pub unknown_formats: u64,
    pub dropped_images: u64,
    /// Output port writes the sink rejected.
    pub sink_errors: u64,
    pub last_depth_sequence: Option<u32>,
    pub last_image_sequence: Option<u32>,
}

impl AcquisitionStats {
    fn record(&mut self, report: &TickReport) {
        if let Some(seq) = report.depth_sequence {
            self.depth_frames += 1;
            self.last_depth_sequence = Some(seq);
        }
        if let Some(seq) = report.image_sequence {
            self.image_frames += 1;
            self.last_image_sequence = Some(seq);
        }
        if report.unknown_format {
            self.unknown_formats += 1;
        }
        if report.image_dropped {
            self.dropped_images += 1;
        }
    }
}

/// Periodic acquisition component over one sensor session.
pub struct DepthCamera<D: SensorDriver, S: FrameSink> {
    config: SensorConfig,
    state: ComponentState,
    session: SensorSession<D>,
    calibration: Option<CalibrationParams>,
    poller: FramePoller,
    publisher: Publisher<S>,
    stats: AcquisitionStats,
    _instance: Option<InstanceGuard>,
}

impl<D: SensorDriver, S: FrameSink> DepthCamera<D, S> {
    pub fn new(config: SensorConfig, driver: D, sink: S) -> Self {
        Self {
            config,
            state: ComponentState::Created,
            session: SensorSession::new(driver),
            calibration: None,
            poller: FramePoller::default(),
            publisher: Publisher::new(sink),
            stats: AcquisitionStats::default(),
            _instance: None,
        }
    }

    /// Replaces the pixel-to-point projection.
    pub fn with_projection(mut self, projection: Box<dyn Projection>) -> Self {
        self.poller.set_projection(projection);
        self
    }

    pub fn with_unknown_format_policy(mut self, policy: UnknownFormatPolicy) -> Self {
        self.poller.set_unknown_format_policy(policy);
        self
    }

    pub(super) fn with_instance_guard(mut self, guard: InstanceGuard) -> Self {
        self._instance = Some(guard);
        self
    }

    pub fn state(&self) -> ComponentState {
        self.state
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Calibration read during the current or last activation.
    pub fn calibration(&self) -> Option<&CalibrationParams> {
        self.calibration.as_ref()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn port_counters(&self) -> PortCounters {
        self.publisher.counters()
    }

    pub fn session(&self) -> &SensorSession<D> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SensorSession<D> {
        &mut self.session
    }

    pub fn poller(&self) -> &FramePoller {
        &self.poller
    }

    pub fn sink(&self) -> &S {
        self.publisher.sink()
    }

    pub fn sink_mut(&mut self) -> &mut S {
        self.publisher.sink_mut()
    }

    fn expect_state(
        &self,
        hook: &'static str,
        allowed: &[ComponentState],
    ) -> Result<(), ComponentError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ComponentError::InvalidState {
                hook,
                state: self.state,
            })
        }
    }

    fn initialize(&mut self) -> Result<(), ComponentError> {
        self.config.validate()?;
        self.session.open()?;
        for kind in StreamKind::ALL {
            if let Err(e) = self.session.create_stream(kind) {
                self.session.release();
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn activate(&mut self) -> Result<(), ComponentError> {
        for kind in StreamKind::ALL {
            if self.config.is_enabled(kind) {
                self.session.configure(kind, self.config.mode(kind))?;
            }
        }
        let calibration = self.session.read_calibration()?;
        self.poller.prepare(&self.config, calibration.clone());
        self.calibration = Some(calibration);
        self.session.start()?;
        Ok(())
    }
}

impl<D: SensorDriver, S: FrameSink> Lifecycle for DepthCamera<D, S> {
    fn on_initialize(&mut self) -> Result<(), ComponentError> {
        self.expect_state("initialize", &[ComponentState::Created])?;
        match self.initialize() {
            Ok(()) => {
                self.state = ComponentState::Inactive;
                tracing::info!(config = ?self.config, "Component initialized");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Component initialization failed");
                Err(e)
            }
        }
    }

    fn on_finalize(&mut self) -> Result<(), ComponentError> {
        if self.state == ComponentState::Finalized {
            return Ok(());
        }
        self.session.close();
        self.state = ComponentState::Finalized;
        tracing::info!(stats = ?self.stats, "Component finalized");
        Ok(())
    }

    fn on_activated(&mut self) -> Result<(), ComponentError> {
        self.expect_state("activate", &[ComponentState::Inactive])?;
        match self.activate() {
            Ok(()) => {
                self.state = ComponentState::Active;
                tracing::info!("Component activated");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Component activation failed");
                Err(e)
            }
        }
    }

    fn on_deactivated(&mut self) -> Result<(), ComponentError> {
        self.expect_state(
            "deactivate",
            &[ComponentState::Inactive, ComponentState::Active],
        )?;
        if self.state == ComponentState::Active {
            self.session.stop();
            self.state = ComponentState::Inactive;
            tracing::info!("Component deactivated");
        }
        Ok(())
    }

    fn on_execute(&mut self) -> Result<TickReport, ComponentError> {
        self.expect_state("execute", &[ComponentState::Active])?;
        self.stats.ticks += 1;
        match self.poller.tick(&mut self.session, &mut self.publisher) {
            Ok(report) => {
                self.stats.record(&report);
                self.stats.sink_errors = self.publisher.counters().failed;
                Ok(report)
            }
            Err(e) => {
                self.stats.failed_ticks += 1;
                Err(e.into())
            }
        }
    }
}

impl<D: SensorDriver, S: FrameSink> std::fmt::Debug for DepthCamera<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthCamera")
            .field("state", &self.state)
            .field("session", &self.session.state())
            .field("config", &self.config)
            .field("stats", &self.stats)
            .finish()
    }
}
