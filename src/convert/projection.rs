//! Pixel-to-point projection used to fill the point cloud.

use crate::sensor::Intrinsics;

/// Maps a depth pixel to metric XYZ.
///
/// Implemented for closures, so callers can plug in their own camera
/// model without a new type.
pub trait Projection {
    /// Projects pixel `(u, v)` at `depth` metres. `depth` is never NaN.
    fn project(&self, intrinsics: &Intrinsics, u: u32, v: u32, depth: f32) -> [f32; 3];
}

impl<F> Projection for F
where
    F: Fn(&Intrinsics, u32, u32, f32) -> [f32; 3],
{
    fn project(&self, intrinsics: &Intrinsics, u: u32, v: u32, depth: f32) -> [f32; 3] {
        self(intrinsics, u, v, depth)
    }
}

/// Pinhole model around the image centre.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinholeProjection;

impl Projection for PinholeProjection {
    fn project(&self, intrinsics: &Intrinsics, u: u32, v: u32, depth: f32) -> [f32; 3] {
        let z = f64::from(depth);
        let x = (f64::from(u) - intrinsics.centre_x) * z * intrinsics.proj_const;
        let y = (f64::from(v) - intrinsics.centre_y) * z * intrinsics.proj_const;
        [x as f32, y as f32, depth]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intrinsics() -> Intrinsics {
        Intrinsics {
            proj_const: 0.5,
            centre_x: 2.0,
            centre_y: 1.0,
        }
    }

    #[test]
    fn test_centre_pixel_on_axis() {
        let p = PinholeProjection.project(&intrinsics(), 2, 1, 3.0);
        assert_eq!(p, [0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_off_axis_pixel() {
        let p = PinholeProjection.project(&intrinsics(), 4, 0, 2.0);
        assert_eq!(p, [2.0, -1.0, 2.0]);
    }

    #[test]
    fn test_closure_projection() {
        let flat = |_: &Intrinsics, u: u32, v: u32, d: f32| [u as f32, v as f32, d];
        assert_eq!(flat.project(&intrinsics(), 5, 6, 1.0), [5.0, 6.0, 1.0]);
    }
}
