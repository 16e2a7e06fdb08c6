//! Depth Camera Acquisition CLI
//!
//! Runs the acquisition component against the simulated sensor at a
//! fixed tick rate, logging every published buffer.

use clap::Parser;
use depthcam::{
    component::{DepthCamera, Lifecycle},
    config::{FileConfig, SensorConfig},
    metrics::{MetricsRegistry, MetricsSnapshot},
    publish::LogSink,
    scheduler::PeriodicScheduler,
    sensor::MockDriver,
    ComponentFactory,
};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing::{info, warn};

/// Periodic depth/image acquisition with a simulated sensor.
#[derive(Debug, Parser)]
#[command(name = "depthcam", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run (0 runs until Ctrl-C).
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Tick rate in Hz (default: fastest enabled stream).
    #[arg(short, long)]
    rate: Option<u32>,

    /// Publish only the depth stream.
    #[arg(long, conflicts_with = "image_only")]
    depth_only: bool,

    /// Publish only the image stream.
    #[arg(long)]
    image_only: bool,

    /// Metrics server port (0 to disable).
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn load_config(args: &Args) -> Result<FileConfig, depthcam::config::ConfigError> {
    let mut config = match &args.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if args.depth_only {
        config.sensor.enable_image = false;
        config.sensor.enable_depth = true;
    }
    if args.image_only {
        config.sensor.enable_depth = false;
        config.sensor.enable_image = true;
    }
    if let Some(ticks) = args.ticks {
        config.run.ticks = ticks;
    }
    if let Some(rate) = args.rate {
        config.run.tick_hz = rate;
    }
    if let Some(port) = args.metrics_port {
        config.run.metrics_port = port;
    }

    config.sensor.validate()?;
    Ok(config)
}

fn tick_rate(run_hz: u32, sensor: &SensorConfig) -> u32 {
    if run_hz > 0 {
        run_hz
    } else {
        sensor.max_fps()
    }
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(
    port: u16,
    registry: MetricsRegistry,
) -> depthcam::metrics::SharedMetricsState {
    use depthcam::metrics::{MetricsServer, MetricsServerConfig};

    let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
    let state = server.state();
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                warn!("Failed to start metrics runtime: {}", e);
                return;
            }
        };
        if let Err(e) = runtime.block_on(server.run()) {
            warn!("Metrics server stopped: {}", e);
        }
    });
    state
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    info!("Depth camera acquisition v{}", depthcam::VERSION);
    info!("This is a demonstration using simulated sensor input");

    let config = match load_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let factory = ComponentFactory::new();
    let camera: Result<DepthCamera<MockDriver, LogSink>, _> =
        factory.create(config.sensor.clone(), MockDriver::new(), LogSink);
    let mut camera = match camera {
        Ok(c) => c.with_unknown_format_policy(config.pipeline.unknown_format),
        Err(e) => {
            eprintln!("Failed to create component: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = camera.on_initialize() {
        eprintln!("Failed to initialize sensor: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = camera.on_activated() {
        eprintln!("Failed to activate sensor: {}", e);
        let _ = camera.on_finalize();
        std::process::exit(1);
    }

    let registry = match MetricsRegistry::new() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to create metrics registry: {}", e);
            std::process::exit(1);
        }
    };

    #[cfg(feature = "metrics")]
    let metrics_state = (config.run.metrics_port > 0)
        .then(|| spawn_metrics_server(config.run.metrics_port, registry));
    #[cfg(not(feature = "metrics"))]
    let local_registry = registry;

    let rate = tick_rate(config.run.tick_hz, &config.sensor);
    let scheduler = PeriodicScheduler::new(rate).with_max_ticks(config.run.ticks);

    let stop = scheduler.stop_handle();
    if let Err(e) = ctrlc::set_handler(move || stop.store(true, Ordering::Release)) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    info!(rate_hz = rate, ticks = config.run.ticks, "Acquiring...");

    // The scheduler borrows the component mutably, so snapshots are
    // taken from the tick reports it hands back.
    let mut snapshot = MetricsSnapshot {
        is_active: true,
        ..Default::default()
    };
    let summary = scheduler.run(&mut camera, |tick, result| {
        snapshot.ticks = tick;
        match result {
            Ok(report) => {
                if let Some(seq) = report.depth_sequence {
                    snapshot.depth_frames += 1;
                    snapshot.last_depth_sequence = Some(seq);
                }
                if let Some(seq) = report.image_sequence {
                    snapshot.image_frames += 1;
                    snapshot.last_image_sequence = Some(seq);
                }
                if report.unknown_format {
                    snapshot.unknown_formats += 1;
                }
            }
            Err(_) => snapshot.failed_ticks += 1,
        }

        #[cfg(feature = "metrics")]
        if let Some(state) = &metrics_state {
            state.blocking_write().update(&snapshot);
        }
        #[cfg(not(feature = "metrics"))]
        local_registry.update(&snapshot);
    });

    if let Err(e) = camera.on_deactivated() {
        warn!("Deactivation failed: {}", e);
    }

    #[cfg(feature = "metrics")]
    if let Some(state) = &metrics_state {
        state
            .blocking_write()
            .update(&MetricsSnapshot::from_camera(&camera));
    }

    let stats = camera.stats();
    info!(
        "Ran {} ticks ({} failed, {} overran): {} depth frames, {} image frames",
        summary.ticks,
        summary.failed_ticks,
        summary.overruns,
        stats.depth_frames,
        stats.image_frames
    );
    if stats.unknown_formats > 0 {
        warn!("{} image frames had an unrecognized pixel format", stats.unknown_formats);
    }

    #[cfg(not(feature = "metrics"))]
    {
        local_registry.update(&MetricsSnapshot::from_camera(&camera));
        match local_registry.encode() {
            Ok(text) => println!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }

    if let Err(e) = camera.on_finalize() {
        warn!("Finalize failed: {}", e);
    }
    info!("Done.");
}
