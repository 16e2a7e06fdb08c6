//! Conversion of raw sensor frames into published buffers.
//!
//! Depth frames become a float depth map plus an XYZ point cloud.
//! Image frames are copied verbatim and tagged with their format.
//! Converters do no I/O and cannot fail.

mod depth;
mod image;
mod projection;

pub use depth::{
    DepthConverter, DepthMap, FieldType, PointCloud, PointField, DEPTH_BIT_DEPTH, DEPTH_FORMAT,
    POINT_STEP,
};
pub use image::{
    image_format, ImageConversion, ImageConverter, ImageFormat, ImageFrame, UnknownFormatPolicy,
};
pub use projection::{PinholeProjection, Projection};
