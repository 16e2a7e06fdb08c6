use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depthcam::convert::{DepthConverter, PinholeProjection};
use depthcam::sensor::{DepthPattern, MockDriver, OutputMode, SensorSession, StreamKind};

fn vga_depth(c: &mut Criterion) {
    let mut session = SensorSession::new(MockDriver::new().with_depth_pattern(DepthPattern::Ramp));
    session.open().unwrap();
    session.create_stream(StreamKind::Depth).unwrap();
    session
        .configure(StreamKind::Depth, OutputMode::new(640, 480, 30))
        .unwrap();
    let calibration = session.read_calibration().unwrap();
    session.start().unwrap();
    session.poll_once().unwrap();
    let raw = session.fetch_depth().unwrap().clone();

    let mut converter = DepthConverter::new(640, 480, calibration);
    c.bench_function("depth_vga_convert", |b| {
        b.iter(|| converter.convert(black_box(&raw), &PinholeProjection))
    });
}

criterion_group!(benches, vga_depth);
criterion_main!(benches);
