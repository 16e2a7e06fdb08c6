//! Raw image frames to tagged pixel buffers.

use crate::sensor::{PixelFormat, RawImageFrame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format tag carried by an [`ImageFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Rgb,
    Yuv422,
    Grey,
    /// No recognized format has been seen yet, or the policy marked it.
    Unknown,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Rgb => "RGB",
            ImageFormat::Yuv422 => "YUV422",
            ImageFormat::Grey => "GREY",
            ImageFormat::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps a driver pixel format to its tag and bits per pixel.
///
/// Returns `None` for formats without a mapping.
pub fn image_format(pixel_format: PixelFormat) -> Option<(ImageFormat, u32)> {
    match pixel_format {
        PixelFormat::Rgb24 => Some((ImageFormat::Rgb, 24)),
        PixelFormat::Yuv422 => Some((ImageFormat::Yuv422, 32)),
        PixelFormat::Grayscale8 => Some((ImageFormat::Grey, 8)),
        PixelFormat::Grayscale16 => Some((ImageFormat::Grey, 16)),
        PixelFormat::Mjpeg | PixelFormat::Other(_) => None,
    }
}

/// Handling of image frames whose pixel format has no mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFormatPolicy {
    /// Copy the pixels but keep the previous tag and bit depth.
    #[default]
    Retain,
    /// Copy the pixels and tag them `UNKNOWN` with bit depth 0.
    MarkUnknown,
    /// Leave the output untouched and skip publishing.
    Drop,
}

/// Published image with its format metadata.
#[derive(Clone)]
pub struct ImageFrame {
    width: u32,
    height: u32,
    bit_depth: u32,
    format: ImageFormat,
    pixels: Vec<u8>,
    sequence: u32,
    device_timestamp_us: u64,
    timestamp: DateTime<Utc>,
}

impl Default for ImageFrame {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            bit_depth: 0,
            format: ImageFormat::Unknown,
            pixels: Vec::new(),
            sequence: 0,
            device_timestamp_us: 0,
            timestamp: Utc::now(),
        }
    }
}

impl ImageFrame {
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[inline]
    pub fn scale_divisor(&self) -> f64 {
        1.0
    }

    /// Pixel bytes exactly as the driver delivered them.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Driver capture time, in microseconds on the driver's own clock.
    #[inline]
    pub fn device_timestamp_us(&self) -> u64 {
        self.device_timestamp_us
    }

    /// Host time at which the frame was converted.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bit_depth", &self.bit_depth)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// Result of one image conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageConversion {
    /// Format recognized; frame updated.
    Recognized,
    /// Format unrecognized; frame updated per policy.
    Unrecognized(PixelFormat),
    /// Format unrecognized; frame left untouched.
    Dropped(PixelFormat),
}

impl ImageConversion {
    /// Returns true if the image should be published.
    pub fn should_publish(self) -> bool {
        !matches!(self, ImageConversion::Dropped(_))
    }
}

/// Copies raw image frames into an [`ImageFrame`].
#[derive(Debug, Default)]
pub struct ImageConverter {
    frame: ImageFrame,
    policy: UnknownFormatPolicy,
}

impl ImageConverter {
    pub fn new(policy: UnknownFormatPolicy) -> Self {
        Self {
            frame: ImageFrame::default(),
            policy,
        }
    }

    pub fn policy(&self) -> UnknownFormatPolicy {
        self.policy
    }

    /// The most recently converted image.
    pub fn frame(&self) -> &ImageFrame {
        &self.frame
    }

    /// Converts one frame, re-deriving format and bit depth from it.
    pub fn convert(&mut self, raw: &RawImageFrame) -> ImageConversion {
        let outcome = match image_format(raw.pixel_format) {
            Some((format, bit_depth)) => {
                self.frame.format = format;
                self.frame.bit_depth = bit_depth;
                ImageConversion::Recognized
            }
            None => {
                tracing::warn!(
                    pixel_format = ?raw.pixel_format,
                    policy = ?self.policy,
                    "Unrecognized image pixel format"
                );
                match self.policy {
                    UnknownFormatPolicy::Retain => ImageConversion::Unrecognized(raw.pixel_format),
                    UnknownFormatPolicy::MarkUnknown => {
                        self.frame.format = ImageFormat::Unknown;
                        self.frame.bit_depth = 0;
                        ImageConversion::Unrecognized(raw.pixel_format)
                    }
                    UnknownFormatPolicy::Drop => {
                        return ImageConversion::Dropped(raw.pixel_format);
                    }
                }
            }
        };

        self.frame.width = raw.width;
        self.frame.height = raw.height;
        self.frame.pixels.clear();
        self.frame.pixels.extend_from_slice(&raw.data);
        self.frame.sequence = raw.frame_id;
        self.frame.device_timestamp_us = raw.timestamp_us;
        self.frame.timestamp = Utc::now();

        tracing::trace!(
            sequence = raw.frame_id,
            format = %self.frame.format,
            bytes = raw.data.len(),
            "Image frame converted"
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pixel_format: PixelFormat, data: Vec<u8>) -> RawImageFrame {
        RawImageFrame {
            width: 4,
            height: 2,
            frame_id: 9,
            timestamp_us: 33_333,
            pixel_format,
            data,
        }
    }

    #[test]
    fn test_format_mapping() {
        assert_eq!(image_format(PixelFormat::Rgb24), Some((ImageFormat::Rgb, 24)));
        assert_eq!(
            image_format(PixelFormat::Yuv422),
            Some((ImageFormat::Yuv422, 32))
        );
        assert_eq!(
            image_format(PixelFormat::Grayscale8),
            Some((ImageFormat::Grey, 8))
        );
        assert_eq!(
            image_format(PixelFormat::Grayscale16),
            Some((ImageFormat::Grey, 16))
        );
        assert_eq!(image_format(PixelFormat::Mjpeg), None);
        assert_eq!(image_format(PixelFormat::Other(77)), None);
    }

    #[test]
    fn test_tag_strings() {
        assert_eq!(ImageFormat::Rgb.as_str(), "RGB");
        assert_eq!(ImageFormat::Yuv422.as_str(), "YUV422");
        assert_eq!(ImageFormat::Grey.as_str(), "GREY");
    }

    #[test]
    fn test_bytes_copied_verbatim() {
        let mut converter = ImageConverter::default();
        let data: Vec<u8> = (0..24).collect();
        let outcome = converter.convert(&raw(PixelFormat::Rgb24, data.clone()));

        assert_eq!(outcome, ImageConversion::Recognized);
        let frame = converter.frame();
        assert_eq!(frame.pixels(), &data[..]);
        assert_eq!((frame.width(), frame.height()), (4, 2));
        assert_eq!(frame.sequence(), 9);
        assert_eq!(frame.device_timestamp_us(), 33_333);
    }

    #[test]
    fn test_buffer_follows_reported_size() {
        let mut converter = ImageConverter::default();
        converter.convert(&raw(PixelFormat::Rgb24, vec![1; 24]));
        converter.convert(&raw(PixelFormat::Grayscale8, vec![2; 8]));
        assert_eq!(converter.frame().pixels(), &[2u8; 8][..]);
        assert_eq!(converter.frame().bit_depth(), 8);
    }

    #[test]
    fn test_unknown_format_retains_previous() {
        let mut converter = ImageConverter::new(UnknownFormatPolicy::Retain);
        converter.convert(&raw(PixelFormat::Grayscale16, vec![0; 16]));

        let outcome = converter.convert(&raw(PixelFormat::Mjpeg, vec![7; 5]));
        assert_eq!(outcome, ImageConversion::Unrecognized(PixelFormat::Mjpeg));
        assert!(outcome.should_publish());
        assert_eq!(converter.frame().format(), ImageFormat::Grey);
        assert_eq!(converter.frame().bit_depth(), 16);
        assert_eq!(converter.frame().pixels().len(), 5);
    }

    #[test]
    fn test_unknown_format_marked() {
        let mut converter = ImageConverter::new(UnknownFormatPolicy::MarkUnknown);
        converter.convert(&raw(PixelFormat::Rgb24, vec![0; 24]));
        converter.convert(&raw(PixelFormat::Other(3), vec![0; 8]));
        assert_eq!(converter.frame().format(), ImageFormat::Unknown);
        assert_eq!(converter.frame().bit_depth(), 0);
    }

    #[test]
    fn test_unknown_format_dropped() {
        let mut converter = ImageConverter::new(UnknownFormatPolicy::Drop);
        converter.convert(&raw(PixelFormat::Rgb24, vec![3; 24]));

        let outcome = converter.convert(&raw(PixelFormat::Mjpeg, vec![9; 5]));
        assert!(!outcome.should_publish());
        assert_eq!(converter.frame().pixels(), &[3u8; 24][..]);
        assert_eq!(converter.frame().format(), ImageFormat::Rgb);
    }

    #[test]
    fn test_first_unknown_frame_stays_unknown() {
        let mut converter = ImageConverter::default();
        converter.convert(&raw(PixelFormat::Other(1), vec![0; 8]));
        assert_eq!(converter.frame().format(), ImageFormat::Unknown);
        assert_eq!(converter.frame().bit_depth(), 0);
    }
}
