//! Output ports for depth maps, point clouds and images.

mod publisher;
mod sink;

pub use publisher::{PortCounters, Publisher};
pub use sink::{FrameSink, LogSink, MemorySink, SinkError, DEPTH_MAP_PORT, IMAGE_PORT, POINTS_PORT};
