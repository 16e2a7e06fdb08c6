//! Raw frame metadata as reported by the sensor driver.

use std::fmt;

/// One modality of frame production on the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// Depth generator (millimetre samples).
    Depth,
    /// Colour or grayscale image generator.
    Image,
}

impl StreamKind {
    /// Both streams, in publish order.
    pub const ALL: [StreamKind; 2] = [StreamKind::Depth, StreamKind::Image];

    pub(crate) fn index(self) -> usize {
        match self {
            StreamKind::Depth => 0,
            StreamKind::Image => 1,
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Depth => f.write_str("depth"),
            StreamKind::Image => f.write_str("image"),
        }
    }
}

/// Output-mode request applied to a generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Horizontal resolution in pixels.
    pub width: u32,
    /// Vertical resolution in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: u32,
}

impl OutputMode {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    /// Number of pixels in one frame.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.fps)
    }
}

/// Pixel format reported by the image generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 8-bit RGB.
    Rgb24,
    /// Packed YUV 4:2:2.
    Yuv422,
    /// 8-bit grayscale.
    Grayscale8,
    /// 16-bit grayscale.
    Grayscale16,
    /// Compressed JPEG frames.
    Mjpeg,
    /// A driver-specific code this crate has no mapping for.
    Other(u32),
}

/// Per-frame depth metadata and samples.
#[derive(Clone)]
pub struct RawDepthFrame {
    /// Reported horizontal resolution.
    pub width: u32,
    /// Reported vertical resolution.
    pub height: u32,
    /// Driver frame id. Opaque, wraps with the driver's counter.
    pub frame_id: u32,
    /// Driver timestamp in microseconds.
    pub timestamp_us: u64,
    /// Row-major depth samples in millimetres.
    pub samples: Vec<u16>,
}

impl RawDepthFrame {
    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }
}

impl fmt::Debug for RawDepthFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawDepthFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_id", &self.frame_id)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// Per-frame image metadata and pixel bytes.
#[derive(Clone)]
pub struct RawImageFrame {
    /// Reported horizontal resolution.
    pub width: u32,
    /// Reported vertical resolution.
    pub height: u32,
    /// Driver frame id.
    pub frame_id: u32,
    /// Driver timestamp in microseconds.
    pub timestamp_us: u64,
    /// Format of `data` as reported by the driver.
    pub pixel_format: PixelFormat,
    /// Raw pixel bytes; length is the driver-reported data size.
    pub data: Vec<u8>,
}

impl fmt::Debug for RawImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImageFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("frame_id", &self.frame_id)
            .field("pixel_format", &self.pixel_format)
            .field("data_bytes", &self.data.len())
            .finish()
    }
}
