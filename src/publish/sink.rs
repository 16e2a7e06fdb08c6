//! Output port boundary.

use crate::convert::{DepthMap, ImageFrame, PointCloud};
use thiserror::Error;

/// Port carrying [`PointCloud`] values.
pub const POINTS_PORT: &str = "points";
/// Port carrying [`DepthMap`] values.
pub const DEPTH_MAP_PORT: &str = "depth_map";
/// Port carrying [`ImageFrame`] values.
pub const IMAGE_PORT: &str = "image";

/// Errors reported by a sink when a write is not delivered.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("port {port} disconnected")]
    Disconnected { port: &'static str },
    #[error("write to port {port} failed: {reason}")]
    WriteFailed { port: &'static str, reason: String },
}

/// Transport that delivers published buffers to consumers.
pub trait FrameSink {
    fn write_points(&mut self, cloud: &PointCloud) -> Result<(), SinkError>;

    fn write_depth_map(&mut self, depth_map: &DepthMap) -> Result<(), SinkError>;

    fn write_image(&mut self, image: &ImageFrame) -> Result<(), SinkError>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn write_points(&mut self, cloud: &PointCloud) -> Result<(), SinkError> {
        (**self).write_points(cloud)
    }

    fn write_depth_map(&mut self, depth_map: &DepthMap) -> Result<(), SinkError> {
        (**self).write_depth_map(depth_map)
    }

    fn write_image(&mut self, image: &ImageFrame) -> Result<(), SinkError> {
        (**self).write_image(image)
    }
}

/// Keeps a copy of every write, in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub points: Vec<PointCloud>,
    pub depth_maps: Vec<DepthMap>,
    pub images: Vec<ImageFrame>,
    /// Port names in delivery order.
    pub deliveries: Vec<&'static str>,
    /// Ports whose writes should fail.
    pub disconnected: Vec<&'static str>,
    /// Writes accepted before every later write fails; `None` is unbounded.
    pub max_writes: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total writes across all ports.
    pub fn write_count(&self) -> usize {
        self.deliveries.len()
    }

    /// Stops accepting writes once `limit` have been delivered.
    pub fn with_max_writes(mut self, limit: usize) -> Self {
        self.max_writes = Some(limit);
        self
    }

    fn accept(&mut self, port: &'static str) -> Result<(), SinkError> {
        if self.disconnected.contains(&port) {
            return Err(SinkError::Disconnected { port });
        }
        if let Some(limit) = self.max_writes.filter(|&limit| self.deliveries.len() >= limit) {
            return Err(SinkError::WriteFailed {
                port,
                reason: format!("capture limit of {} writes reached", limit),
            });
        }
        self.deliveries.push(port);
        Ok(())
    }
}

impl FrameSink for MemorySink {
    fn write_points(&mut self, cloud: &PointCloud) -> Result<(), SinkError> {
        self.accept(POINTS_PORT)?;
        self.points.push(cloud.clone());
        Ok(())
    }

    fn write_depth_map(&mut self, depth_map: &DepthMap) -> Result<(), SinkError> {
        self.accept(DEPTH_MAP_PORT)?;
        self.depth_maps.push(depth_map.clone());
        Ok(())
    }

    fn write_image(&mut self, image: &ImageFrame) -> Result<(), SinkError> {
        self.accept(IMAGE_PORT)?;
        self.images.push(image.clone());
        Ok(())
    }
}

/// Logs a summary of every write.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn write_points(&mut self, cloud: &PointCloud) -> Result<(), SinkError> {
        tracing::debug!(
            port = POINTS_PORT,
            sequence = cloud.sequence(),
            width = cloud.width(),
            height = cloud.height(),
            bytes = cloud.data().len(),
            "Published point cloud"
        );
        Ok(())
    }

    fn write_depth_map(&mut self, depth_map: &DepthMap) -> Result<(), SinkError> {
        tracing::debug!(
            port = DEPTH_MAP_PORT,
            sequence = depth_map.sequence(),
            width = depth_map.width(),
            height = depth_map.height(),
            bytes = depth_map.pixels().len(),
            "Published depth map"
        );
        Ok(())
    }

    fn write_image(&mut self, image: &ImageFrame) -> Result<(), SinkError> {
        tracing::debug!(
            port = IMAGE_PORT,
            sequence = image.sequence(),
            format = %image.format(),
            bit_depth = image.bit_depth(),
            bytes = image.pixels().len(),
            "Published image"
        );
        Ok(())
    }
}
