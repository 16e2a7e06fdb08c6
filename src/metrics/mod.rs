//! Prometheus metrics exporter for acquisition monitoring.
//!
//! This module provides observability into the acquisition pipeline
//! by exposing metrics in Prometheus format. With the `metrics` feature an
//! HTTP exporter also serves `/metrics`, `/health` and `/status`.
//!
//! # Metrics Exposed
//!
//! ## Component Metrics
//! - `depthcam_active` - Activation state (1=active, 0=inactive)
//! - `depthcam_ticks_total` - Ticks executed
//! - `depthcam_failed_ticks_total` - Ticks skipped after a failed sensor update
//!
//! ## Stream Metrics
//! - `depthcam_depth_frames_total` - Depth frames published
//! - `depthcam_image_frames_total` - Image frames published
//! - `depthcam_unknown_formats_total` - Image frames in an unrecognized format
//! - `depthcam_last_depth_sequence` - Driver sequence of the last depth frame
//! - `depthcam_last_image_sequence` - Driver sequence of the last image frame
//!
//! ## Port Metrics
//! - `depthcam_sink_errors_total` - Writes rejected by the transport
//!
//! # Example
//!
//! ```no_run
//! use depthcam::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     is_active: true,
//!     ticks: 120,
//!     depth_frames: 118,
//!     last_depth_sequence: Some(118),
//!     ..Default::default()
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{
    MetricsServer, MetricsServerConfig, MetricsState, ServerError, SharedMetricsState,
};
