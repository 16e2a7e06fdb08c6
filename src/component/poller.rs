//! Per-tick acquisition: poll, convert, publish.

use crate::config::SensorConfig;
use crate::convert::{
    DepthConverter, ImageConversion, ImageConverter, PinholeProjection, Projection,
    UnknownFormatPolicy,
};
use crate::publish::{FrameSink, Publisher};
use crate::sensor::{CalibrationParams, SensorDriver, SensorSession, SessionError, StreamKind};

/// What one tick published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Sequence number of the depth frame published this tick.
    pub depth_sequence: Option<u32>,
    /// Sequence number of the image frame published this tick.
    pub image_sequence: Option<u32>,
    /// Image frame arrived in a format without a mapping.
    pub unknown_format: bool,
    /// Image frame was fetched but not published.
    pub image_dropped: bool,
}

impl TickReport {
    pub fn published_depth(&self) -> bool {
        self.depth_sequence.is_some()
    }

    pub fn published_image(&self) -> bool {
        self.image_sequence.is_some()
    }

    /// Returns true if nothing was published.
    pub fn is_idle(&self) -> bool {
        !self.published_depth() && !self.published_image()
    }
}

/// Drives the conversion pipeline once per tick.
///
/// Depth and image streams are checked independently; a tick may
/// publish neither, either or both.
pub struct FramePoller {
    depth_enabled: bool,
    image_enabled: bool,
    depth: Option<DepthConverter>,
    image: ImageConverter,
    projection: Box<dyn Projection>,
}

impl FramePoller {
    pub fn new(policy: UnknownFormatPolicy) -> Self {
        Self {
            depth_enabled: false,
            image_enabled: false,
            depth: None,
            image: ImageConverter::new(policy),
            projection: Box::new(PinholeProjection),
        }
    }

    /// Replaces the point-cloud projection.
    pub fn set_projection(&mut self, projection: Box<dyn Projection>) {
        self.projection = projection;
    }

    /// Replaces the image converter, discarding its last frame.
    pub fn set_unknown_format_policy(&mut self, policy: UnknownFormatPolicy) {
        self.image = ImageConverter::new(policy);
    }

    /// Sizes the depth outputs for a new activation.
    pub fn prepare(&mut self, config: &SensorConfig, calibration: CalibrationParams) {
        self.depth_enabled = config.enable_depth;
        self.image_enabled = config.enable_image;
        self.depth = config
            .enable_depth
            .then(|| DepthConverter::new(config.dm_x, config.dm_y, calibration));
    }

    pub fn depth(&self) -> Option<&DepthConverter> {
        self.depth.as_ref()
    }

    pub fn image(&self) -> &ImageConverter {
        &self.image
    }

    /// Runs one tick.
    ///
    /// Every ready stream is updated and read before any converter runs.
    /// A failed poll or fetch therefore returns with nothing published and
    /// the previous outputs left as they were.
    pub fn tick<D, S>(
        &mut self,
        session: &mut SensorSession<D>,
        publisher: &mut Publisher<S>,
    ) -> Result<TickReport, SessionError>
    where
        D: SensorDriver,
        S: FrameSink,
    {
        session.poll_once()?;

        let depth_ready = self.depth_enabled
            && self.depth.is_some()
            && session.has_new_frame(StreamKind::Depth);
        let image_ready = self.image_enabled && session.has_new_frame(StreamKind::Image);

        if depth_ready {
            session.update_frame(StreamKind::Depth)?;
        }
        if image_ready {
            session.update_frame(StreamKind::Image)?;
        }
        let depth_raw = if depth_ready {
            Some(session.depth_frame()?)
        } else {
            None
        };
        let image_raw = if image_ready {
            Some(session.image_frame()?)
        } else {
            None
        };

        let mut report = TickReport::default();

        if let (Some(raw), Some(converter)) = (depth_raw, self.depth.as_mut()) {
            converter.convert(raw, self.projection.as_ref());
            publisher.publish_depth(converter.depth_map(), converter.point_cloud());
            report.depth_sequence = Some(converter.depth_map().sequence());
        }

        if let Some(raw) = image_raw {
            let conversion = self.image.convert(raw);
            report.unknown_format = !matches!(conversion, ImageConversion::Recognized);
            if conversion.should_publish() {
                publisher.publish_image(self.image.frame());
                report.image_sequence = Some(self.image.frame().sequence());
            } else {
                report.image_dropped = true;
            }
        }

        tracing::trace!(
            depth = ?report.depth_sequence,
            image = ?report.image_sequence,
            "Tick complete"
        );
        Ok(report)
    }
}

impl Default for FramePoller {
    fn default() -> Self {
        Self::new(UnknownFormatPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::MemorySink;
    use crate::sensor::{DepthPattern, MockDriver, PixelFormat};

    struct Rig {
        session: SensorSession<MockDriver>,
        publisher: Publisher<MemorySink>,
        poller: FramePoller,
    }

    fn rig(config: SensorConfig, driver: MockDriver) -> Rig {
        let mut session = SensorSession::new(driver);
        session.open().unwrap();
        session.create_stream(StreamKind::Depth).unwrap();
        session.create_stream(StreamKind::Image).unwrap();
        for kind in StreamKind::ALL {
            if config.is_enabled(kind) {
                session.configure(kind, config.mode(kind)).unwrap();
            }
        }
        let calibration = session.read_calibration().unwrap();
        session.start().unwrap();

        let mut poller = FramePoller::default();
        poller.prepare(&config, calibration);
        Rig {
            session,
            publisher: Publisher::new(MemorySink::new()),
            poller,
        }
    }

    impl Rig {
        fn tick(&mut self) -> Result<TickReport, SessionError> {
            self.poller.tick(&mut self.session, &mut self.publisher)
        }
    }

    #[test]
    fn test_both_streams_published() {
        let mut rig = rig(
            SensorConfig::default(),
            MockDriver::new().with_depth_pattern(DepthPattern::Constant(2000)),
        );
        let report = rig.tick().unwrap();

        assert_eq!(report.depth_sequence, Some(1));
        assert_eq!(report.image_sequence, Some(1));
        let sink = rig.publisher.sink();
        assert_eq!(sink.deliveries, vec!["points", "depth_map", "image"]);
        assert_eq!(sink.depth_maps[0].depth_at(0), Some(2.0));
    }

    #[test]
    fn test_poll_failure_publishes_nothing() {
        let mut rig = rig(SensorConfig::default(), MockDriver::new());
        rig.tick().unwrap();
        let before = rig.publisher.sink().write_count();

        rig.session.driver_mut().failures.update = true;
        assert!(matches!(rig.tick(), Err(SessionError::Poll(_))));
        assert_eq!(rig.publisher.sink().write_count(), before);
        assert_eq!(
            rig.poller.depth().unwrap().depth_map().sequence(),
            rig.publisher.sink().depth_maps[0].sequence()
        );
    }

    #[test]
    fn test_no_depth_frame_skips_depth_ports() {
        let mut rig = rig(
            SensorConfig::default(),
            MockDriver::new().with_periods(None, Some(1)),
        );
        let report = rig.tick().unwrap();

        assert!(!report.published_depth());
        assert!(report.published_image());
        let sink = rig.publisher.sink();
        assert!(sink.points.is_empty());
        assert!(sink.depth_maps.is_empty());
        assert_eq!(rig.poller.depth().unwrap().depth_map().sequence(), 0);
    }

    #[test]
    fn test_independent_frame_rates() {
        let mut rig = rig(
            SensorConfig::default(),
            MockDriver::new().with_periods(Some(1), Some(3)),
        );
        let reports: Vec<_> = (0..6).map(|_| rig.tick().unwrap()).collect();

        assert!(reports.iter().all(|r| r.published_depth()));
        let images = reports.iter().filter(|r| r.published_image()).count();
        assert_eq!(images, 2);
    }

    #[test]
    fn test_disabled_image_never_written() {
        let mut rig = rig(SensorConfig::depth_only(640, 480, 30), MockDriver::new());
        for _ in 0..3 {
            rig.tick().unwrap();
        }
        assert!(rig.publisher.sink().images.is_empty());
        assert_eq!(rig.publisher.sink().depth_maps.len(), 3);
    }

    #[test]
    fn test_dropped_image_not_published() {
        let mut rig = rig(
            SensorConfig::image_only(320, 240, 30),
            MockDriver::new().with_image_format(PixelFormat::Mjpeg),
        );
        rig.poller.set_unknown_format_policy(UnknownFormatPolicy::Drop);

        let report = rig.tick().unwrap();
        assert!(report.unknown_format);
        assert!(report.image_dropped);
        assert!(rig.publisher.sink().images.is_empty());
    }

    #[test]
    fn test_fetch_failure_aborts_tick() {
        let mut rig = rig(SensorConfig::default(), MockDriver::new());
        rig.session.driver_mut().failures.fetch_depth = true;
        assert!(matches!(rig.tick(), Err(SessionError::Poll(_))));
        assert_eq!(rig.publisher.sink().write_count(), 0);
    }

    #[test]
    fn test_image_fetch_failure_keeps_depth_unpublished() {
        let mut rig = rig(SensorConfig::default(), MockDriver::new());
        rig.tick().unwrap();

        rig.session.driver_mut().failures.fetch_image = true;
        assert!(matches!(rig.tick(), Err(SessionError::Poll(_))));

        let sink = rig.publisher.sink();
        assert_eq!(sink.deliveries, vec!["points", "depth_map", "image"]);
        assert_eq!(rig.publisher.counters().depth_map, 1);
        assert_eq!(rig.poller.depth().unwrap().depth_map().sequence(), 1);
    }
}
