//! Depth calibration read from the sensor at activation.

use super::driver::FieldOfView;

/// Integer property: raw value meaning "no measurement".
pub const NO_SAMPLE_VALUE: &str = "NoSampleValue";
/// Integer property: raw value meaning "occluded by sensor geometry".
pub const SHADOW_VALUE: &str = "ShadowValue";
/// Integer property: smallest depth the sensor reports.
pub const MIN_DEPTH_VALUE: &str = "MinDepthValue";
/// Integer property: largest depth the sensor reports.
pub const MAX_DEPTH_VALUE: &str = "MaxDepthValue";
/// Real property: zero-plane pixel size in millimetres.
pub const ZERO_PLANE_PIXEL_SIZE: &str = "ZPPS";
/// Integer property: zero-plane distance (focal length) in millimetres.
pub const ZERO_PLANE_DISTANCE: &str = "ZPD";

/// Horizontal resolution the zero-plane properties refer to.
const REFERENCE_WIDTH: f64 = 640.0;

/// Sentinels, bounds and optics of the depth generator.
///
/// Immutable for the duration of one activation.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationParams {
    pub no_sample_value: u64,
    pub shadow_value: u64,
    /// Metadata for consumers; output values are never clamped to it.
    pub min_depth: u64,
    /// Metadata for consumers; output values are never clamped to it.
    pub max_depth: u64,
    /// Zero-plane pixel size (mm).
    pub pixel_size: f64,
    /// Zero-plane distance (mm).
    pub depth_focal_length: u64,
    pub field_of_view: FieldOfView,
}

impl CalibrationParams {
    /// Returns true if a raw sample is either sentinel.
    #[inline]
    pub fn is_invalid_sample(&self, sample: u16) -> bool {
        let sample = u64::from(sample);
        sample == self.no_sample_value || sample == self.shadow_value
    }

    /// Focal length in pixels for a depth map `width` pixels wide.
    pub fn focal_length_px(&self, width: u32) -> f64 {
        let vga_focal = self.depth_focal_length as f64 / (2.0 * self.pixel_size);
        vga_focal * (f64::from(width) / REFERENCE_WIDTH)
    }

    /// Derives projection constants for the configured depth resolution.
    pub fn intrinsics(&self, width: u32, height: u32) -> Intrinsics {
        let focal = self.focal_length_px(width);
        let proj_const = if focal > 0.0 && focal.is_finite() {
            1.0 / focal
        } else {
            0.0
        };
        Intrinsics {
            proj_const,
            centre_x: f64::from(width) / 2.0,
            centre_y: f64::from(height) / 2.0,
        }
    }
}

/// Projection constants derived at activation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    /// Reciprocal focal length in pixels.
    pub proj_const: f64,
    pub centre_x: f64,
    pub centre_y: f64,
}
