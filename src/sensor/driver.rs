//! Sensor driver boundary.
//!
//! The session talks to hardware only through [`SensorDriver`], so a
//! vendor binding and the in-process [`MockDriver`](super::MockDriver)
//! are interchangeable.

use super::frame::{OutputMode, RawDepthFrame, RawImageFrame, StreamKind};
use thiserror::Error;

/// Status reported by the driver when an operation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{status}")]
pub struct DriverError {
    status: String,
}

impl DriverError {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }

    /// Returns the driver status string.
    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Angular field of view of a generator, in radians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldOfView {
    pub horizontal: f64,
    pub vertical: f64,
}

/// Operations a depth/image sensor driver exposes.
///
/// Calls mirror the driver's own API: one context, one generator node
/// per stream, and a non-blocking update followed by per-stream
/// availability checks.
pub trait SensorDriver {
    /// Initializes the driver context.
    fn init(&mut self) -> Result<(), DriverError>;

    /// Releases the driver context.
    fn shutdown(&mut self);

    /// Creates the generator node for a stream.
    fn create(&mut self, kind: StreamKind) -> Result<(), DriverError>;

    /// Applies an output mode to a generator.
    fn set_output_mode(&mut self, kind: StreamKind, mode: OutputMode) -> Result<(), DriverError>;

    /// Reads an integer property from a generator.
    fn get_int_property(&mut self, kind: StreamKind, name: &str) -> Result<u64, DriverError>;

    /// Reads a real-valued property from a generator.
    fn get_real_property(&mut self, kind: StreamKind, name: &str) -> Result<f64, DriverError>;

    /// Reads the field of view of a generator.
    fn field_of_view(&mut self, kind: StreamKind) -> Result<FieldOfView, DriverError>;

    /// Starts all created generators.
    fn start_all(&mut self) -> Result<(), DriverError>;

    /// Stops all generators.
    fn stop_all(&mut self) -> Result<(), DriverError>;

    /// Updates all generators without waiting for any of them.
    fn wait_none_update_all(&mut self) -> Result<(), DriverError>;

    /// Returns true if the stream has a frame that has not been retrieved.
    fn is_new_data_available(&self, kind: StreamKind) -> bool;

    /// Waits for new data on one stream and makes it the current frame.
    fn wait_and_update_data(&mut self, kind: StreamKind) -> Result<(), DriverError>;

    /// Current depth frame, if one has been retrieved.
    fn depth_metadata(&self) -> Option<&RawDepthFrame>;

    /// Current image frame, if one has been retrieved.
    fn image_metadata(&self) -> Option<&RawImageFrame>;
}
