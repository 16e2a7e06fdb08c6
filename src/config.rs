//! Stream and runtime configuration.
//!
//! Options are applied once at initialization. Changing them takes
//! effect on the next activation.

use crate::convert::UnknownFormatPolicy;
use crate::sensor::{OutputMode, StreamKind};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Requested output modes for the depth and image streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub enable_depth: bool,
    /// Depth frame rate.
    pub dm_fps: u32,
    /// Depth width in pixels.
    pub dm_x: u32,
    /// Depth height in pixels.
    pub dm_y: u32,
    pub enable_image: bool,
    /// Image frame rate.
    pub im_fps: u32,
    /// Image width in pixels.
    pub im_x: u32,
    /// Image height in pixels.
    pub im_y: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enable_depth: true,
            dm_fps: 30,
            dm_x: 640,
            dm_y: 480,
            enable_image: true,
            im_fps: 30,
            im_x: 640,
            im_y: 480,
        }
    }
}

impl SensorConfig {
    /// A configuration with only the depth stream enabled.
    pub fn depth_only(width: u32, height: u32, fps: u32) -> Self {
        Self {
            enable_depth: true,
            dm_x: width,
            dm_y: height,
            dm_fps: fps,
            enable_image: false,
            ..Default::default()
        }
    }

    /// A configuration with only the image stream enabled.
    pub fn image_only(width: u32, height: u32, fps: u32) -> Self {
        Self {
            enable_depth: false,
            enable_image: true,
            im_x: width,
            im_y: height,
            im_fps: fps,
            ..Default::default()
        }
    }

    /// Returns true if the stream is enabled.
    pub fn is_enabled(&self, kind: StreamKind) -> bool {
        match kind {
            StreamKind::Depth => self.enable_depth,
            StreamKind::Image => self.enable_image,
        }
    }

    /// Requested output mode for a stream, whether or not it is enabled.
    pub fn mode(&self, kind: StreamKind) -> OutputMode {
        match kind {
            StreamKind::Depth => OutputMode::new(self.dm_x, self.dm_y, self.dm_fps),
            StreamKind::Image => OutputMode::new(self.im_x, self.im_y, self.im_fps),
        }
    }

    /// Highest frame rate among enabled streams.
    pub fn max_fps(&self) -> u32 {
        StreamKind::ALL
            .into_iter()
            .filter(|&kind| self.is_enabled(kind))
            .map(|kind| self.mode(kind).fps)
            .max()
            .unwrap_or(0)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enable_depth && !self.enable_image {
            return Err(ConfigError::NoStreamsEnabled);
        }
        for stream in StreamKind::ALL.into_iter().filter(|&k| self.is_enabled(k)) {
            let mode = self.mode(stream);
            if mode.width == 0 || mode.height == 0 {
                return Err(ConfigError::InvalidDimensions { stream });
            }
            if mode.fps == 0 {
                return Err(ConfigError::InvalidFrameRate { stream });
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {stream} dimensions (width and height must be non-zero)")]
    InvalidDimensions { stream: StreamKind },
    #[error("invalid {stream} frame rate (must be non-zero)")]
    InvalidFrameRate { stream: StreamKind },
    #[error("no streams enabled")]
    NoStreamsEnabled,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Conversion pipeline options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// What to do with image frames in an unrecognized pixel format.
    #[serde(default)]
    pub unknown_format: UnknownFormatPolicy,
}

/// Execution options for the standalone binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Tick rate in Hz; 0 follows the fastest enabled stream.
    pub tick_hz: u32,
    /// Number of ticks to run; 0 runs until interrupted.
    pub ticks: u64,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            tick_hz: 0,
            ticks: 0,
            metrics_port: 9090,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.sensor.validate()?;
        Ok(config)
    }
}
