//! Sensor session lifecycle.
//!
//! ```text
//! Unopened → Opened → Configured → Generating ⇄ Stopped → Closed
//! ```
//!
//! Reactivation goes `Stopped → Configured → Generating`. Any failure while
//! configuring, reading calibration or starting drops the session back to
//! `Opened`.

use super::calibration::{
    CalibrationParams, MAX_DEPTH_VALUE, MIN_DEPTH_VALUE, NO_SAMPLE_VALUE, SHADOW_VALUE,
    ZERO_PLANE_DISTANCE, ZERO_PLANE_PIXEL_SIZE,
};
use super::driver::{DriverError, SensorDriver};
use super::frame::{OutputMode, RawDepthFrame, RawImageFrame, StreamKind};
use std::fmt;
use thiserror::Error;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unopened,
    Opened,
    Configured,
    Generating,
    Stopped,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unopened => "unopened",
            SessionState::Opened => "opened",
            SessionState::Configured => "configured",
            SessionState::Generating => "generating",
            SessionState::Stopped => "stopped",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during sensor session operations.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("failed to initialise sensor: {0}")]
    Init(#[source] DriverError),
    #[error("failed to create {kind} node: {source}")]
    StreamCreate { kind: StreamKind, source: DriverError },
    #[error("failed to configure {kind} node: {source}")]
    Config { kind: StreamKind, source: DriverError },
    #[error("failed to read calibration property {property}: {source}")]
    Calibration {
        property: &'static str,
        source: DriverError,
    },
    #[error("failed to start data generation: {0}")]
    Start(#[source] DriverError),
    #[error("sensor update failed: {0}")]
    Poll(#[source] DriverError),
    #[error("cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// Exclusive owner of a sensor driver context and its generator nodes.
pub struct SensorSession<D: SensorDriver> {
    driver: D,
    state: SessionState,
    streams: [bool; 2],
}

impl<D: SensorDriver> SensorSession<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: SessionState::Unopened,
            streams: [false; 2],
        }
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if a generator node exists for the stream.
    pub fn has_stream(&self, kind: StreamKind) -> bool {
        self.streams[kind.index()]
    }

    /// Borrows the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutably borrows the underlying driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    /// Establishes the sensor context.
    pub fn open(&mut self) -> Result<(), SessionError> {
        self.expect_state("open", &[SessionState::Unopened])?;
        self.driver.init().map_err(SessionError::Init)?;
        self.state = SessionState::Opened;
        tracing::info!("Sensor session opened");
        Ok(())
    }

    /// Creates the generator node for a stream.
    pub fn create_stream(&mut self, kind: StreamKind) -> Result<(), SessionError> {
        self.expect_state("create stream", &[SessionState::Opened])?;
        if self.has_stream(kind) {
            return Err(SessionError::StreamCreate {
                kind,
                source: DriverError::new("node already exists"),
            });
        }
        self.driver
            .create(kind)
            .map_err(|source| SessionError::StreamCreate { kind, source })?;
        self.streams[kind.index()] = true;
        tracing::debug!(stream = %kind, "Generator node created");
        Ok(())
    }

    /// Applies an output mode to a stream.
    pub fn configure(&mut self, kind: StreamKind, mode: OutputMode) -> Result<(), SessionError> {
        self.expect_state(
            "configure",
            &[
                SessionState::Opened,
                SessionState::Configured,
                SessionState::Stopped,
            ],
        )?;
        if !self.has_stream(kind) {
            self.state = SessionState::Opened;
            return Err(SessionError::Config {
                kind,
                source: DriverError::new("node does not exist"),
            });
        }
        if let Err(source) = self.driver.set_output_mode(kind, mode) {
            self.state = SessionState::Opened;
            return Err(SessionError::Config { kind, source });
        }
        self.state = SessionState::Configured;
        tracing::info!(stream = %kind, mode = %mode, "Stream configured");
        Ok(())
    }

    /// Reads sentinels, bounds and optics from the depth generator.
    pub fn read_calibration(&mut self) -> Result<CalibrationParams, SessionError> {
        self.expect_state("read calibration", &[SessionState::Configured])?;
        match self.read_properties() {
            Ok(calibration) => {
                tracing::info!(
                    no_sample = calibration.no_sample_value,
                    shadow = calibration.shadow_value,
                    min_depth = calibration.min_depth,
                    max_depth = calibration.max_depth,
                    pixel_size = calibration.pixel_size,
                    focal_length = calibration.depth_focal_length,
                    "Calibration read"
                );
                Ok(calibration)
            }
            Err(e) => {
                self.state = SessionState::Opened;
                Err(e)
            }
        }
    }

    fn read_properties(&mut self) -> Result<CalibrationParams, SessionError> {
        const DEPTH: StreamKind = StreamKind::Depth;
        let driver = &mut self.driver;
        let mut int = |property: &'static str| {
            driver
                .get_int_property(DEPTH, property)
                .map_err(|source| SessionError::Calibration { property, source })
        };

        let no_sample_value = int(NO_SAMPLE_VALUE)?;
        let shadow_value = int(SHADOW_VALUE)?;
        let min_depth = int(MIN_DEPTH_VALUE)?;
        let max_depth = int(MAX_DEPTH_VALUE)?;
        let depth_focal_length = int(ZERO_PLANE_DISTANCE)?;

        let pixel_size = self
            .driver
            .get_real_property(DEPTH, ZERO_PLANE_PIXEL_SIZE)
            .map_err(|source| SessionError::Calibration {
                property: ZERO_PLANE_PIXEL_SIZE,
                source,
            })?;
        let field_of_view =
            self.driver
                .field_of_view(DEPTH)
                .map_err(|source| SessionError::Calibration {
                    property: "FieldOfView",
                    source,
                })?;

        Ok(CalibrationParams {
            no_sample_value,
            shadow_value,
            min_depth,
            max_depth,
            pixel_size,
            depth_focal_length,
            field_of_view,
        })
    }

    /// Starts all generators.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.expect_state("start", &[SessionState::Configured])?;
        if let Err(e) = self.driver.start_all() {
            self.state = SessionState::Opened;
            return Err(SessionError::Start(e));
        }
        self.state = SessionState::Generating;
        tracing::info!("Data generation started");
        Ok(())
    }

    /// Halts all generators. Failures are logged, never returned.
    pub fn stop(&mut self) {
        if self.state != SessionState::Generating {
            tracing::debug!(state = %self.state, "Stop ignored: session not generating");
            return;
        }
        if let Err(e) = self.driver.stop_all() {
            tracing::warn!(error = %e, "Failed to stop data generation");
        }
        self.state = SessionState::Stopped;
        tracing::info!("Data generation stopped");
    }

    /// Drives one non-blocking update across all generators.
    pub fn poll_once(&mut self) -> Result<(), SessionError> {
        self.expect_state("poll", &[SessionState::Generating])?;
        self.driver.wait_none_update_all().map_err(SessionError::Poll)
    }

    /// Returns true if a stream has a frame ready to fetch.
    pub fn has_new_frame(&self, kind: StreamKind) -> bool {
        self.state == SessionState::Generating
            && self.has_stream(kind)
            && self.driver.is_new_data_available(kind)
    }

    /// Retrieves the ready depth frame.
    ///
    /// Only call after [`has_new_frame`](Self::has_new_frame) returned true,
    /// so the driver's wait returns immediately.
    pub fn fetch_depth(&mut self) -> Result<&RawDepthFrame, SessionError> {
        self.update_frame(StreamKind::Depth)?;
        self.depth_frame()
    }

    /// Retrieves the ready image frame.
    pub fn fetch_image(&mut self) -> Result<&RawImageFrame, SessionError> {
        self.update_frame(StreamKind::Image)?;
        self.image_frame()
    }

    /// Swaps the ready frame of one stream into the driver's metadata.
    ///
    /// Updating one stream leaves the other stream's metadata in place, so
    /// several streams can be updated before any of them is read.
    pub fn update_frame(&mut self, kind: StreamKind) -> Result<(), SessionError> {
        let operation = match kind {
            StreamKind::Depth => "fetch depth",
            StreamKind::Image => "fetch image",
        };
        self.expect_state(operation, &[SessionState::Generating])?;
        self.driver
            .wait_and_update_data(kind)
            .map_err(SessionError::Poll)
    }

    /// Depth frame from the last [`update_frame`](Self::update_frame).
    pub fn depth_frame(&self) -> Result<&RawDepthFrame, SessionError> {
        self.driver
            .depth_metadata()
            .ok_or_else(|| SessionError::Poll(DriverError::new("no depth metadata")))
    }

    /// Image frame from the last [`update_frame`](Self::update_frame).
    pub fn image_frame(&self) -> Result<&RawImageFrame, SessionError> {
        self.driver
            .image_metadata()
            .ok_or_else(|| SessionError::Poll(DriverError::new("no image metadata")))
    }

    /// Shuts the driver context down and returns to `Unopened`, so the
    /// session can be opened again. No-op once closed.
    pub fn release(&mut self) {
        match self.state {
            SessionState::Unopened | SessionState::Closed => return,
            SessionState::Generating => self.stop(),
            _ => {}
        }
        self.driver.shutdown();
        self.streams = [false; 2];
        self.state = SessionState::Unopened;
        tracing::info!("Sensor session released");
    }

    /// Releases the sensor context. Safe to call more than once.
    pub fn close(&mut self) {
        match self.state {
            SessionState::Closed => return,
            SessionState::Unopened => {
                self.state = SessionState::Closed;
                return;
            }
            SessionState::Generating => self.stop(),
            _ => {}
        }
        self.driver.shutdown();
        self.streams = [false; 2];
        self.state = SessionState::Closed;
        tracing::info!("Sensor session closed");
    }
}

impl<D: SensorDriver> Drop for SensorSession<D> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::MockDriver;

    fn opened() -> SensorSession<MockDriver> {
        let mut session = SensorSession::new(MockDriver::new());
        session.open().unwrap();
        session.create_stream(StreamKind::Depth).unwrap();
        session.create_stream(StreamKind::Image).unwrap();
        session
    }

    fn generating() -> SensorSession<MockDriver> {
        let mut session = opened();
        session
            .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
            .unwrap();
        session.read_calibration().unwrap();
        session.start().unwrap();
        session
    }

    #[test]
    fn test_open_failure_stays_unopened() {
        let mut driver = MockDriver::new();
        driver.failures.init = true;
        let mut session = SensorSession::new(driver);

        assert!(matches!(session.open(), Err(SessionError::Init(_))));
        assert_eq!(session.state(), SessionState::Unopened);
        assert!(matches!(
            session.create_stream(StreamKind::Depth),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_duplicate_stream_rejected() {
        let mut session = opened();
        assert!(matches!(
            session.create_stream(StreamKind::Depth),
            Err(SessionError::StreamCreate {
                kind: StreamKind::Depth,
                ..
            })
        ));
    }

    #[test]
    fn test_lifecycle_states() {
        let mut session = opened();
        assert_eq!(session.state(), SessionState::Opened);

        session
            .configure(StreamKind::Depth, OutputMode::new(320, 240, 30))
            .unwrap();
        assert_eq!(session.state(), SessionState::Configured);

        session.read_calibration().unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Generating);

        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);

        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.driver().is_initialised());
    }

    #[test]
    fn test_config_failure_reverts_to_opened() {
        let mut session = opened();
        session.driver_mut().failures.configure_image = true;

        session
            .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
            .unwrap();
        let err = session
            .configure(StreamKind::Image, OutputMode::new(640, 480, 30))
            .unwrap_err();

        assert!(matches!(
            err,
            SessionError::Config {
                kind: StreamKind::Image,
                ..
            }
        ));
        assert_eq!(session.state(), SessionState::Opened);
        assert!(session.start().is_err());
    }

    #[test]
    fn test_calibration_failure_names_property() {
        let mut session = opened();
        session.driver_mut().failures.property = Some(SHADOW_VALUE.to_string());
        session
            .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
            .unwrap();

        match session.read_calibration() {
            Err(SessionError::Calibration { property, .. }) => {
                assert_eq!(property, SHADOW_VALUE)
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(session.state(), SessionState::Opened);
    }

    #[test]
    fn test_calibration_values() {
        let mut session = opened();
        session
            .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
            .unwrap();
        let calib = session.read_calibration().unwrap();

        assert_eq!(calib.no_sample_value, 0);
        assert_eq!(calib.shadow_value, 65535);
        assert_eq!(calib.depth_focal_length, 120);
        assert!((calib.pixel_size - 0.1042).abs() < 1e-12);
        assert_eq!(session.driver().property_reads(), 7);
    }

    #[test]
    fn test_start_failure() {
        let mut session = opened();
        session.driver_mut().failures.start = true;
        session
            .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
            .unwrap();
        session.read_calibration().unwrap();

        assert!(matches!(session.start(), Err(SessionError::Start(_))));
        assert_eq!(session.state(), SessionState::Opened);
    }

    #[test]
    fn test_poll_requires_generating() {
        let mut session = opened();
        assert!(matches!(
            session.poll_once(),
            Err(SessionError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_poll_failure() {
        let mut session = generating();
        session.driver_mut().failures.update = true;
        assert!(matches!(session.poll_once(), Err(SessionError::Poll(_))));
    }

    #[test]
    fn test_fetch_after_poll() {
        let mut session = generating();
        session.poll_once().unwrap();
        assert!(session.has_new_frame(StreamKind::Depth));

        let frame = session.fetch_depth().unwrap();
        assert_eq!(frame.width, 640);
        assert_eq!(frame.samples.len(), 640 * 480);
        assert!(!session.has_new_frame(StreamKind::Depth));
    }

    #[test]
    fn test_update_both_streams_before_reading() {
        let mut session = generating();
        session.poll_once().unwrap();

        session.update_frame(StreamKind::Depth).unwrap();
        session.update_frame(StreamKind::Image).unwrap();

        let depth = session.depth_frame().unwrap();
        let image = session.image_frame().unwrap();
        assert_eq!(depth.frame_id, 1);
        assert_eq!(image.frame_id, 1);
        assert_eq!(depth.samples.len(), 640 * 480);
    }

    #[test]
    fn test_update_frame_requires_generating() {
        let mut session = opened();
        assert!(matches!(
            session.update_frame(StreamKind::Image),
            Err(SessionError::InvalidState {
                operation: "fetch image",
                ..
            })
        ));
        assert!(matches!(session.depth_frame(), Err(SessionError::Poll(_))));
    }

    #[test]
    fn test_release_allows_reopen() {
        let mut session = opened();
        session.release();
        assert_eq!(session.state(), SessionState::Unopened);
        assert!(!session.has_stream(StreamKind::Depth));
        assert!(!session.driver().is_initialised());

        session.open().unwrap();
        session.create_stream(StreamKind::Depth).unwrap();
        assert_eq!(session.state(), SessionState::Opened);
    }

    #[test]
    fn test_stop_failure_is_not_fatal() {
        let mut session = generating();
        session.driver_mut().failures.stop = true;
        session.stop();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.has_new_frame(StreamKind::Depth));
    }

    #[test]
    fn test_reactivation_without_open() {
        let mut session = generating();
        session.stop();

        session
            .configure(StreamKind::Depth, OutputMode::new(320, 240, 30))
            .unwrap();
        session.read_calibration().unwrap();
        session.start().unwrap();
        assert_eq!(session.state(), SessionState::Generating);
        assert_eq!(
            session.driver().mode(StreamKind::Depth),
            Some(OutputMode::new(320, 240, 30))
        );
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut session = generating();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(
            session.open(),
            Err(SessionError::InvalidState { .. })
        ));
    }
}
