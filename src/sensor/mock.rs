//! Simulated depth/image sensor.
//!
//! Deterministic stand-in for a hardware driver, used by tests, the
//! benchmark and the demo binary. Every driver call can be made to fail
//! through [`MockFailures`].

use super::calibration::{
    MAX_DEPTH_VALUE, MIN_DEPTH_VALUE, NO_SAMPLE_VALUE, SHADOW_VALUE, ZERO_PLANE_DISTANCE,
    ZERO_PLANE_PIXEL_SIZE,
};
use super::driver::{DriverError, FieldOfView, SensorDriver};
use super::frame::{OutputMode, PixelFormat, RawDepthFrame, RawImageFrame, StreamKind};
use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use std::collections::HashMap;

/// Mode a generator produces before any output mode is applied.
pub const DEFAULT_MODE: OutputMode = OutputMode {
    width: 640,
    height: 480,
    fps: 30,
};

/// How the simulated depth generator fills its frames.
#[derive(Debug, Clone)]
pub enum DepthPattern {
    /// Every pixel reports the same value.
    Constant(u16),
    /// Diagonal ramp from 500 mm, repeating every 4 m.
    Ramp,
    /// Exact samples, reused for every frame.
    Samples(Vec<u16>),
    /// Seeded noise around `base`, with a share of sentinel pixels.
    Noise {
        seed: u64,
        base: u16,
        spread: u16,
        invalid_ratio: f64,
    },
}

impl Default for DepthPattern {
    fn default() -> Self {
        DepthPattern::Noise {
            seed: 0x5eed,
            base: 1500,
            spread: 2000,
            invalid_ratio: 0.05,
        }
    }
}

/// Driver calls that should fail on their next invocation (and every one after).
#[derive(Debug, Clone, Default)]
pub struct MockFailures {
    pub init: bool,
    pub create_depth: bool,
    pub create_image: bool,
    pub configure_depth: bool,
    pub configure_image: bool,
    /// Name of a property whose read fails.
    pub property: Option<String>,
    pub field_of_view: bool,
    pub start: bool,
    pub stop: bool,
    pub update: bool,
    pub fetch_depth: bool,
    pub fetch_image: bool,
}

/// In-process simulated sensor.
pub struct MockDriver {
    /// Failure injection switches.
    pub failures: MockFailures,
    /// Modes accepted by `set_output_mode`; `None` accepts anything.
    pub supported_modes: Option<Vec<OutputMode>>,
    pub int_properties: HashMap<String, u64>,
    pub real_properties: HashMap<String, f64>,
    pub fov: FieldOfView,
    /// A depth frame becomes ready every this many updates; `None` never.
    pub depth_period: Option<u64>,
    /// An image frame becomes ready every this many updates; `None` never.
    pub image_period: Option<u64>,
    pub depth_pattern: DepthPattern,
    /// Format the image generator reports.
    pub image_format: PixelFormat,
    initialised: bool,
    created: [bool; 2],
    modes: [Option<OutputMode>; 2],
    generating: bool,
    pending: [bool; 2],
    frame_ids: [u32; 2],
    update_count: u64,
    property_reads: usize,
    rng: ChaCha8Rng,
    depth: Option<RawDepthFrame>,
    image: Option<RawImageFrame>,
}

impl Default for MockDriver {
    fn default() -> Self {
        let int_properties = [
            (NO_SAMPLE_VALUE, 0),
            (SHADOW_VALUE, 65535),
            (MIN_DEPTH_VALUE, 500),
            (MAX_DEPTH_VALUE, 10000),
            (ZERO_PLANE_DISTANCE, 120),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let real_properties = [(ZERO_PLANE_PIXEL_SIZE.to_string(), 0.1042)]
            .into_iter()
            .collect();

        let depth_pattern = DepthPattern::default();
        let seed = match &depth_pattern {
            DepthPattern::Noise { seed, .. } => *seed,
            _ => 0,
        };

        Self {
            failures: MockFailures::default(),
            supported_modes: None,
            int_properties,
            real_properties,
            fov: FieldOfView {
                horizontal: 1.0144,
                vertical: 0.7898,
            },
            depth_period: Some(1),
            image_period: Some(1),
            depth_pattern,
            image_format: PixelFormat::Rgb24,
            initialised: false,
            created: [false; 2],
            modes: [None; 2],
            generating: false,
            pending: [false; 2],
            frame_ids: [0; 2],
            update_count: 0,
            property_reads: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            depth: None,
            image: None,
        }
    }
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the depth fill pattern, reseeding the noise source if needed.
    pub fn with_depth_pattern(mut self, pattern: DepthPattern) -> Self {
        if let DepthPattern::Noise { seed, .. } = pattern {
            self.rng = ChaCha8Rng::seed_from_u64(seed);
        }
        self.depth_pattern = pattern;
        self
    }

    pub fn with_image_format(mut self, format: PixelFormat) -> Self {
        self.image_format = format;
        self
    }

    /// Sets how many updates pass between frames on each stream.
    pub fn with_periods(mut self, depth: Option<u64>, image: Option<u64>) -> Self {
        self.depth_period = depth;
        self.image_period = image;
        self
    }

    pub fn with_supported_modes(mut self, modes: Vec<OutputMode>) -> Self {
        self.supported_modes = Some(modes);
        self
    }

    /// Number of property and field-of-view reads so far.
    pub fn property_reads(&self) -> usize {
        self.property_reads
    }

    /// Number of `wait_none_update_all` calls so far.
    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    /// Output mode last applied to a stream.
    pub fn mode(&self, kind: StreamKind) -> Option<OutputMode> {
        self.modes[kind.index()]
    }

    fn active_mode(&self, kind: StreamKind) -> OutputMode {
        self.modes[kind.index()].unwrap_or(DEFAULT_MODE)
    }

    fn require_node(&self, kind: StreamKind) -> Result<(), DriverError> {
        if !self.initialised {
            return Err(DriverError::new("context not initialised"));
        }
        if !self.created[kind.index()] {
            return Err(DriverError::new(format!("no {} node", kind)));
        }
        Ok(())
    }

    fn timestamp_us(&self, fps: u32) -> u64 {
        self.update_count * 1_000_000 / u64::from(fps.max(1))
    }

    fn next_depth_frame(&mut self) {
        let mode = self.active_mode(StreamKind::Depth);
        let id = self.frame_ids[0].wrapping_add(1);
        self.frame_ids[0] = id;
        let timestamp_us = self.timestamp_us(mode.fps);

        let mut samples = self
            .depth
            .take()
            .map(|frame| frame.samples)
            .unwrap_or_default();
        samples.clear();

        match &self.depth_pattern {
            DepthPattern::Constant(value) => samples.resize(mode.pixel_count(), *value),
            DepthPattern::Ramp => {
                for y in 0..mode.height {
                    for x in 0..mode.width {
                        samples.push(500 + ((x + y) % 4000) as u16);
                    }
                }
            }
            DepthPattern::Samples(values) => samples.extend_from_slice(values),
            DepthPattern::Noise {
                base,
                spread,
                invalid_ratio,
                ..
            } => {
                let (base, spread, invalid_ratio) = (*base, *spread, *invalid_ratio);
                let no_sample = self.int_properties.get(NO_SAMPLE_VALUE).copied().unwrap_or(0);
                let shadow = self.int_properties.get(SHADOW_VALUE).copied().unwrap_or(0);
                for _ in 0..mode.pixel_count() {
                    let roll = f64::from(self.rng.next_u32()) / f64::from(u32::MAX);
                    let value = self.rng.next_u32();
                    let sample = if roll < invalid_ratio / 2.0 {
                        no_sample as u16
                    } else if roll < invalid_ratio {
                        shadow as u16
                    } else {
                        base.saturating_add((value % u32::from(spread.max(1))) as u16)
                    };
                    samples.push(sample);
                }
            }
        }

        self.depth = Some(RawDepthFrame {
            width: mode.width,
            height: mode.height,
            frame_id: id,
            timestamp_us,
            samples,
        });
    }

    fn next_image_frame(&mut self) {
        let mode = self.active_mode(StreamKind::Image);
        let id = self.frame_ids[1].wrapping_add(1);
        self.frame_ids[1] = id;
        let timestamp_us = self.timestamp_us(mode.fps);

        let bytes_per_pixel = match self.image_format {
            PixelFormat::Rgb24 => 3,
            PixelFormat::Yuv422 | PixelFormat::Grayscale16 => 2,
            PixelFormat::Grayscale8 | PixelFormat::Other(_) => 1,
            PixelFormat::Mjpeg => 0,
        };
        let size = if bytes_per_pixel == 0 {
            // Compressed: roughly one byte per eight pixels
            mode.pixel_count() / 8
        } else {
            mode.pixel_count() * bytes_per_pixel
        };

        let mut data = self
            .image
            .take()
            .map(|frame| frame.data)
            .unwrap_or_default();
        data.clear();
        data.extend((0..size).map(|i| ((i as u32).wrapping_add(id) % 256) as u8));

        self.image = Some(RawImageFrame {
            width: mode.width,
            height: mode.height,
            frame_id: id,
            timestamp_us,
            pixel_format: self.image_format,
            data,
        });
    }
}

impl SensorDriver for MockDriver {
    fn init(&mut self) -> Result<(), DriverError> {
        if self.failures.init {
            return Err(DriverError::new("device not connected"));
        }
        self.initialised = true;
        tracing::debug!("MockDriver context initialised");
        Ok(())
    }

    fn shutdown(&mut self) {
        self.initialised = false;
        self.generating = false;
        self.created = [false; 2];
        self.pending = [false; 2];
        tracing::debug!("MockDriver context shut down");
    }

    fn create(&mut self, kind: StreamKind) -> Result<(), DriverError> {
        if !self.initialised {
            return Err(DriverError::new("context not initialised"));
        }
        let fail = match kind {
            StreamKind::Depth => self.failures.create_depth,
            StreamKind::Image => self.failures.create_image,
        };
        if fail {
            return Err(DriverError::new(format!("no {} node available", kind)));
        }
        if self.created[kind.index()] {
            return Err(DriverError::new(format!("{} node already exists", kind)));
        }
        self.created[kind.index()] = true;
        Ok(())
    }

    fn set_output_mode(&mut self, kind: StreamKind, mode: OutputMode) -> Result<(), DriverError> {
        self.require_node(kind)?;
        let fail = match kind {
            StreamKind::Depth => self.failures.configure_depth,
            StreamKind::Image => self.failures.configure_image,
        };
        let supported = self
            .supported_modes
            .as_ref()
            .map_or(true, |modes| modes.contains(&mode));
        if fail || !supported || mode.fps == 0 {
            return Err(DriverError::new(format!("unsupported output mode {}", mode)));
        }
        self.modes[kind.index()] = Some(mode);
        Ok(())
    }

    fn get_int_property(&mut self, kind: StreamKind, name: &str) -> Result<u64, DriverError> {
        self.require_node(kind)?;
        self.property_reads += 1;
        if self.failures.property.as_deref() == Some(name) {
            return Err(DriverError::new(format!("property {} unavailable", name)));
        }
        self.int_properties
            .get(name)
            .copied()
            .ok_or_else(|| DriverError::new(format!("unknown property {}", name)))
    }

    fn get_real_property(&mut self, kind: StreamKind, name: &str) -> Result<f64, DriverError> {
        self.require_node(kind)?;
        self.property_reads += 1;
        if self.failures.property.as_deref() == Some(name) {
            return Err(DriverError::new(format!("property {} unavailable", name)));
        }
        self.real_properties
            .get(name)
            .copied()
            .ok_or_else(|| DriverError::new(format!("unknown property {}", name)))
    }

    fn field_of_view(&mut self, kind: StreamKind) -> Result<FieldOfView, DriverError> {
        self.require_node(kind)?;
        self.property_reads += 1;
        if self.failures.field_of_view {
            return Err(DriverError::new("field of view unavailable"));
        }
        Ok(self.fov)
    }

    fn start_all(&mut self) -> Result<(), DriverError> {
        if !self.initialised {
            return Err(DriverError::new("context not initialised"));
        }
        if self.failures.start {
            return Err(DriverError::new("failed to start generation"));
        }
        self.generating = true;
        Ok(())
    }

    fn stop_all(&mut self) -> Result<(), DriverError> {
        // Generation halts even when the driver reports an error
        self.generating = false;
        self.pending = [false; 2];
        if self.failures.stop {
            return Err(DriverError::new("failed to stop generation"));
        }
        Ok(())
    }

    fn wait_none_update_all(&mut self) -> Result<(), DriverError> {
        if self.failures.update {
            return Err(DriverError::new("device disconnected"));
        }
        if !self.generating {
            return Ok(());
        }
        self.update_count += 1;
        for kind in StreamKind::ALL {
            let period = match kind {
                StreamKind::Depth => self.depth_period,
                StreamKind::Image => self.image_period,
            };
            if let Some(period) = period {
                if self.created[kind.index()] && self.update_count % period.max(1) == 0 {
                    self.pending[kind.index()] = true;
                }
            }
        }
        Ok(())
    }

    fn is_new_data_available(&self, kind: StreamKind) -> bool {
        self.generating && self.pending[kind.index()]
    }

    fn wait_and_update_data(&mut self, kind: StreamKind) -> Result<(), DriverError> {
        self.require_node(kind)?;
        if !self.generating {
            return Err(DriverError::new("generation not started"));
        }
        let fail = match kind {
            StreamKind::Depth => self.failures.fetch_depth,
            StreamKind::Image => self.failures.fetch_image,
        };
        if fail {
            return Err(DriverError::new(format!("{} frame read failed", kind)));
        }
        self.pending[kind.index()] = false;
        match kind {
            StreamKind::Depth => self.next_depth_frame(),
            StreamKind::Image => self.next_image_frame(),
        }
        Ok(())
    }

    fn depth_metadata(&self) -> Option<&RawDepthFrame> {
        self.depth.as_ref()
    }

    fn image_metadata(&self) -> Option<&RawImageFrame> {
        self.image.as_ref()
    }
}
