//! Raw depth samples to a float depth map and a point cloud.
//!
//! Both outputs are little-endian byte buffers sized once per
//! activation and overwritten in place on every depth frame.

use super::projection::Projection;
use crate::sensor::{CalibrationParams, Intrinsics, RawDepthFrame};
use chrono::{DateTime, Utc};

/// Format tag of the depth map.
pub const DEPTH_FORMAT: &str = "DEPTH";
/// Bits per depth-map pixel (one `f32`).
pub const DEPTH_BIT_DEPTH: u32 = 32;
/// Bytes per point-cloud record (x, y, z as `f32`).
pub const POINT_STEP: u32 = 12;

/// Driver units per metre.
const MILLIMETRES_PER_METRE: f32 = 1000.0;

/// Element type of a point-cloud field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Float32,
}

impl FieldType {
    /// Size of one element in bytes.
    pub fn size(self) -> u32 {
        match self {
            FieldType::Float32 => 4,
        }
    }
}

/// Describes one named field inside a point record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointField {
    pub name: &'static str,
    pub offset: u32,
    pub datatype: FieldType,
    pub count: u32,
}

fn xyz_fields() -> Vec<PointField> {
    ["x", "y", "z"]
        .into_iter()
        .zip((0..).step_by(FieldType::Float32.size() as usize))
        .map(|(name, offset)| PointField {
            name,
            offset,
            datatype: FieldType::Float32,
            count: 1,
        })
        .collect()
}

/// Dense depth image in metres; NaN marks pixels without a measurement.
#[derive(Clone)]
pub struct DepthMap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
    sequence: u32,
    device_timestamp_us: u64,
    timestamp: DateTime<Utc>,
}

impl DepthMap {
    fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * 4;
        Self {
            width,
            height,
            pixels: vec![0; len],
            sequence: 0,
            device_timestamp_us: 0,
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Always 32: one IEEE-754 float per pixel.
    #[inline]
    pub fn bit_depth(&self) -> u32 {
        DEPTH_BIT_DEPTH
    }

    #[inline]
    pub fn format(&self) -> &'static str {
        DEPTH_FORMAT
    }

    /// Values are already in metres.
    #[inline]
    pub fn scale_divisor(&self) -> f64 {
        1.0
    }

    /// Row-major little-endian `f32` pixels.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Driver frame id of the last conversion.
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

    /// Depth in metres at a row-major pixel index.
    pub fn depth_at(&self, index: usize) -> Option<f32> {
        let bytes = self.pixels.get(index * 4..index * 4 + 4)?;
        Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

impl std::fmt::Debug for DepthMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthMap")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// Unorganized-layout XYZ cloud with one record per depth pixel.
#[derive(Clone)]
pub struct PointCloud {
    fields: Vec<PointField>,
    width: u32,
    height: u32,
    data: Vec<u8>,
    sequence: u32,
    device_timestamp_us: u64,
    timestamp: DateTime<Utc>,
}

impl PointCloud {
    fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize) * POINT_STEP as usize;
        Self {
            fields: xyz_fields(),
            width,
            height,
            data: vec![0; len],
            sequence: 0,
            device_timestamp_us: 0,
            timestamp: Utc::now(),
        }
    }

    /// Field layout: x, y, z as `f32` at offsets 0, 4, 8.
    pub fn fields(&self) -> &[PointField] {
        &self.fields
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn point_step(&self) -> u32 {
        POINT_STEP
    }

    #[inline]
    pub fn row_step(&self) -> u32 {
        POINT_STEP * self.width
    }

    #[inline]
    pub fn is_bigendian(&self) -> bool {
        false
    }

    /// NaN points may be present.
    #[inline]
    pub fn is_dense(&self) -> bool {
        false
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    #[inline]
    pub fn device_timestamp_us(&self) -> u64 {
        self.device_timestamp_us
    }

    /// Host time at which the frame was converted.
    #[inline]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of point records.
    pub fn len(&self) -> usize {
        self.data.len() / POINT_STEP as usize
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decodes the record at `index`.
    pub fn point(&self, index: usize) -> Option<[f32; 3]> {
        let start = index * POINT_STEP as usize;
        let record = self.data.get(start..start + POINT_STEP as usize)?;
        let mut xyz = [0.0f32; 3];
        for (value, bytes) in xyz.iter_mut().zip(record.chunks_exact(4)) {
            *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }
        Some(xyz)
    }
}

impl std::fmt::Debug for PointCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointCloud")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("data_bytes", &self.data.len())
            .finish()
    }
}

/// Converts depth frames into a [`DepthMap`] and [`PointCloud`].
///
/// Built once per activation for the configured depth resolution.
pub struct DepthConverter {
    calibration: CalibrationParams,
    intrinsics: Intrinsics,
    depth_map: DepthMap,
    cloud: PointCloud,
}

impl DepthConverter {
    /// Allocates output buffers for a `width` x `height` depth stream.
    pub fn new(width: u32, height: u32, calibration: CalibrationParams) -> Self {
        let intrinsics = calibration.intrinsics(width, height);
        Self {
            calibration,
            intrinsics,
            depth_map: DepthMap::new(width, height),
            cloud: PointCloud::new(width, height),
        }
    }

    pub fn calibration(&self) -> &CalibrationParams {
        &self.calibration
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    pub fn depth_map(&self) -> &DepthMap {
        &self.depth_map
    }

    pub fn point_cloud(&self) -> &PointCloud {
        &self.cloud
    }

    /// Overwrites both outputs from one frame.
    ///
    /// # Panics
    ///
    /// If the frame resolution or sample count differs from the
    /// configured depth mode.
    pub fn convert(&mut self, raw: &RawDepthFrame, projection: &dyn Projection) {
        let (width, height) = (self.depth_map.width, self.depth_map.height);
        assert_eq!(
            (raw.width, raw.height),
            (width, height),
            "depth frame resolution differs from configured mode"
        );
        assert_eq!(
            raw.samples.len(),
            raw.pixel_count(),
            "depth frame sample count differs from its resolution"
        );

        let row = width as usize;
        let pixels = self.depth_map.pixels.chunks_exact_mut(4);
        let points = self.cloud.data.chunks_exact_mut(POINT_STEP as usize);

        for (index, ((&sample, pixel), point)) in
            raw.samples.iter().zip(pixels).zip(points).enumerate()
        {
            let depth = if self.calibration.is_invalid_sample(sample) {
                f32::NAN
            } else {
                f32::from(sample) / MILLIMETRES_PER_METRE
            };
            let xyz = if depth.is_nan() {
                [f32::NAN; 3]
            } else {
                let (u, v) = ((index % row) as u32, (index / row) as u32);
                projection.project(&self.intrinsics, u, v, depth)
            };
            pixel.copy_from_slice(&depth.to_le_bytes());
            for (slot, value) in point.chunks_exact_mut(4).zip(xyz) {
                slot.copy_from_slice(&value.to_le_bytes());
            }
        }

        let timestamp = Utc::now();
        self.depth_map.sequence = raw.frame_id;
        self.depth_map.device_timestamp_us = raw.timestamp_us;
        self.depth_map.timestamp = timestamp;
        self.cloud.sequence = raw.frame_id;
        self.cloud.device_timestamp_us = raw.timestamp_us;
        self.cloud.timestamp = timestamp;

        tracing::trace!(
            sequence = raw.frame_id,
            pixels = raw.samples.len(),
            "Depth frame converted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::PinholeProjection;
    use crate::sensor::FieldOfView;
    use proptest::prelude::*;

    fn calibration() -> CalibrationParams {
        CalibrationParams {
            no_sample_value: 0,
            shadow_value: 65535,
            min_depth: 500,
            max_depth: 10000,
            pixel_size: 0.1042,
            depth_focal_length: 120,
            field_of_view: FieldOfView {
                horizontal: 1.0144,
                vertical: 0.7898,
            },
        }
    }

    fn frame(width: u32, height: u32, samples: Vec<u16>) -> RawDepthFrame {
        RawDepthFrame {
            width,
            height,
            frame_id: 42,
            timestamp_us: 66_666,
            samples,
        }
    }

    #[test]
    fn test_millimetres_to_metres() {
        let mut converter = DepthConverter::new(1, 1, calibration());
        converter.convert(&frame(1, 1, vec![1500]), &PinholeProjection);
        assert_eq!(converter.depth_map().depth_at(0), Some(1.5));
    }

    #[test]
    fn test_sentinels_become_nan() {
        let mut converter = DepthConverter::new(3, 1, calibration());
        converter.convert(&frame(3, 1, vec![0, 800, 65535]), &PinholeProjection);

        let map = converter.depth_map();
        assert!(map.depth_at(0).unwrap().is_nan());
        assert_eq!(map.depth_at(1), Some(0.8));
        assert!(map.depth_at(2).unwrap().is_nan());

        let cloud = converter.point_cloud();
        assert!(cloud.point(0).unwrap().iter().all(|v| v.is_nan()));
        assert_eq!(cloud.point(1).unwrap()[2], 0.8);
        assert!(cloud.point(2).unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_no_clamping_to_bounds() {
        let mut converter = DepthConverter::new(2, 1, calibration());
        converter.convert(&frame(2, 1, vec![100, 20000]), &PinholeProjection);
        assert_eq!(converter.depth_map().depth_at(0), Some(0.1));
        assert_eq!(converter.depth_map().depth_at(1), Some(20.0));
    }

    #[test]
    fn test_vga_buffer_sizes() {
        let converter = DepthConverter::new(640, 480, calibration());
        assert_eq!(converter.depth_map().pixels().len(), 1_228_800);
        assert_eq!(converter.point_cloud().data().len(), 3_686_400);
        assert_eq!(converter.point_cloud().row_step(), 640 * 12);
        assert_eq!(converter.point_cloud().len(), 640 * 480);
    }

    #[test]
    fn test_point_field_layout() {
        let converter = DepthConverter::new(4, 4, calibration());
        let cloud = converter.point_cloud();
        let layout: Vec<_> = cloud.fields().iter().map(|f| (f.name, f.offset)).collect();
        assert_eq!(layout, vec![("x", 0), ("y", 4), ("z", 8)]);
        assert!(cloud
            .fields()
            .iter()
            .all(|f| f.datatype == FieldType::Float32 && f.count == 1));
        assert!(!cloud.is_bigendian());
        assert!(!cloud.is_dense());
    }

    #[test]
    fn test_sequence_copied_from_driver() {
        let mut converter = DepthConverter::new(1, 1, calibration());
        converter.convert(&frame(1, 1, vec![1000]), &PinholeProjection);
        assert_eq!(converter.depth_map().sequence(), 42);
        assert_eq!(converter.point_cloud().sequence(), 42);
    }

    #[test]
    fn test_device_timestamp_copied_from_driver() {
        let mut converter = DepthConverter::new(1, 1, calibration());
        let before = Utc::now();
        converter.convert(&frame(1, 1, vec![1000]), &PinholeProjection);

        assert_eq!(converter.depth_map().device_timestamp_us(), 66_666);
        assert_eq!(converter.point_cloud().device_timestamp_us(), 66_666);
        assert!(converter.depth_map().timestamp() >= before);
        assert_eq!(
            converter.depth_map().timestamp(),
            converter.point_cloud().timestamp()
        );
    }

    #[test]
    fn test_projection_receives_pixel_coordinates() {
        let mut converter = DepthConverter::new(3, 2, calibration());
        let coords = |_: &Intrinsics, u: u32, v: u32, d: f32| [u as f32, v as f32, d];
        converter.convert(&frame(3, 2, vec![1000; 6]), &coords);
        assert_eq!(converter.point_cloud().point(5), Some([2.0, 1.0, 1.0]));
    }

    #[test]
    #[should_panic(expected = "resolution differs")]
    fn test_resolution_mismatch_panics() {
        let mut converter = DepthConverter::new(640, 480, calibration());
        converter.convert(&frame(320, 240, vec![0; 320 * 240]), &PinholeProjection);
    }

    #[test]
    #[should_panic(expected = "sample count")]
    fn test_short_frame_panics() {
        let mut converter = DepthConverter::new(2, 2, calibration());
        converter.convert(&frame(2, 2, vec![0; 3]), &PinholeProjection);
    }

    proptest! {
        #[test]
        fn prop_each_sample_converts(samples in proptest::collection::vec(any::<u16>(), 1..64)) {
            let width = samples.len() as u32;
            let calib = calibration();
            let mut converter = DepthConverter::new(width, 1, calib.clone());
            converter.convert(&frame(width, 1, samples.clone()), &PinholeProjection);

            for (i, &s) in samples.iter().enumerate() {
                let value = converter.depth_map().depth_at(i).unwrap();
                if calib.is_invalid_sample(s) {
                    prop_assert!(value.is_nan());
                } else {
                    prop_assert_eq!(value, f32::from(s) / 1000.0);
                }
            }
        }

        #[test]
        fn prop_buffer_lengths(width in 1u32..64, height in 1u32..64) {
            let mut converter = DepthConverter::new(width, height, calibration());
            let n = (width * height) as usize;
            converter.convert(&frame(width, height, vec![1234; n]), &PinholeProjection);
            prop_assert_eq!(converter.depth_map().pixels().len(), n * 4);
            prop_assert_eq!(converter.point_cloud().data().len(), n * 12);
        }
    }
}
