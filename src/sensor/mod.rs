//! Sensor driver boundary and session lifecycle.
//!
//! The session is the only owner of the driver context. It applies
//! output modes, reads depth calibration and exposes a non-blocking
//! poll plus per-stream frame retrieval.

mod calibration;
mod driver;
mod frame;
mod mock;
mod session;

pub use calibration::{
    CalibrationParams, Intrinsics, MAX_DEPTH_VALUE, MIN_DEPTH_VALUE, NO_SAMPLE_VALUE,
    SHADOW_VALUE, ZERO_PLANE_DISTANCE, ZERO_PLANE_PIXEL_SIZE,
};
pub use driver::{DriverError, FieldOfView, SensorDriver};
pub use frame::{OutputMode, PixelFormat, RawDepthFrame, RawImageFrame, StreamKind};
pub use mock::{DepthPattern, MockDriver, MockFailures, DEFAULT_MODE};
pub use session::{SensorSession, SessionError, SessionState};
