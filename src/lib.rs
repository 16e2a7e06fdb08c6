//! Depth Camera Acquisition Library
//!
//! Periodic acquisition from a depth/RGB sensor. Each tick pulls newly
//! available frames, converts them into standard output buffers and
//! publishes them on three ports: `depth_map`, `points` and `image`.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! scheduler → component → poller → session (driver)
//!                           ↓
//!                 depth / image converters → publisher → sink
//! ```
//!
//! # Design Principles
//!
//! - **Single-threaded ticks**: no locking; the scheduler never re-enters a tick
//! - **Skip, don't tear**: a failed sensor update publishes nothing that tick
//! - **Best-effort teardown**: stop and close failures are logged, never escalated
//! - **Pluggable geometry**: the point-cloud projection is a replaceable trait object
//!
//! # Example
//!
//! ```no_run
//! use depthcam::{
//!     component::{DepthCamera, Lifecycle},
//!     config::SensorConfig,
//!     publish::MemorySink,
//!     sensor::MockDriver,
//! };
//!
//! let mut camera = DepthCamera::new(
//!     SensorConfig::default(),
//!     MockDriver::new(),
//!     MemorySink::new(),
//! );
//!
//! camera.on_initialize().unwrap();
//! camera.on_activated().unwrap();
//!
//! for _ in 0..10 {
//!     let report = camera.on_execute().unwrap();
//!     if let Some(seq) = report.depth_sequence {
//!         println!("published depth frame {}", seq);
//!     }
//! }
//!
//! camera.on_deactivated().unwrap();
//! camera.on_finalize().unwrap();
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod component;
pub mod config;
pub mod convert;
pub mod metrics;
pub mod publish;
pub mod scheduler;
pub mod sensor;

// Re-export commonly used types at crate root
pub use component::{ComponentError, ComponentFactory, DepthCamera, Lifecycle, TickReport};
pub use config::{FileConfig, SensorConfig};
pub use convert::{DepthMap, ImageFrame, PointCloud, Projection};
pub use publish::{FrameSink, LogSink, MemorySink};
pub use scheduler::PeriodicScheduler;
pub use sensor::{MockDriver, SensorDriver, SensorSession, StreamKind};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
