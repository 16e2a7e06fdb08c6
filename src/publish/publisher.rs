//! Per-port delivery with write accounting.

use super::sink::{FrameSink, SinkError, DEPTH_MAP_PORT, IMAGE_PORT, POINTS_PORT};
use crate::convert::{DepthMap, ImageFrame, PointCloud};

/// Writes per port since creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortCounters {
    pub points: u64,
    pub depth_map: u64,
    pub image: u64,
    /// Writes the sink rejected.
    pub failed: u64,
}

/// Hands completed buffers to a [`FrameSink`].
///
/// A rejected write is logged and counted; it never fails the tick.
pub struct Publisher<S: FrameSink> {
    sink: S,
    counters: PortCounters,
}

impl<S: FrameSink> Publisher<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            counters: PortCounters::default(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn counters(&self) -> PortCounters {
        self.counters
    }

    /// Publishes the point cloud, then the depth map.
    pub fn publish_depth(&mut self, depth_map: &DepthMap, cloud: &PointCloud) {
        let result = self.sink.write_points(cloud);
        if self.record(POINTS_PORT, result) {
            self.counters.points += 1;
        }
        let result = self.sink.write_depth_map(depth_map);
        if self.record(DEPTH_MAP_PORT, result) {
            self.counters.depth_map += 1;
        }
    }

    pub fn publish_image(&mut self, image: &ImageFrame) {
        let result = self.sink.write_image(image);
        if self.record(IMAGE_PORT, result) {
            self.counters.image += 1;
        }
    }

    fn record(&mut self, port: &'static str, result: Result<(), SinkError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.counters.failed += 1;
                tracing::warn!(port, error = %e, "Output port write failed");
                false
            }
        }
    }
}
