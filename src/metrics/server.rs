//! HTTP exporter for acquisition metrics.
//!
//! Routes:
//! - `/metrics`: Prometheus text exposition
//! - `/health`: 200 while the component is acquiring, 503 otherwise
//! - `/status`: one-line summary of the latest snapshot

use super::{MetricsError, MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("metrics server failed: {0}")]
    Serve(String),
}

/// Listener settings for the exporter.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Registry plus the snapshot it was last updated from.
pub struct MetricsState {
    registry: MetricsRegistry,
    latest: MetricsSnapshot,
}

impl MetricsState {
    /// Pushes a snapshot into the registry and keeps it for `/health` and `/status`.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.latest = snapshot.clone();
    }

    pub fn latest(&self) -> &MetricsSnapshot {
        &self.latest
    }

    pub fn encode(&self) -> Result<String, MetricsError> {
        self.registry.encode()
    }

    fn status_line(&self) -> String {
        let s = &self.latest;
        let seq = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
        format!(
            "active={} ticks={} failed={} depth={} (last {}) image={} (last {}) unknown_formats={}",
            s.is_active,
            s.ticks,
            s.failed_ticks,
            s.depth_frames,
            seq(s.last_depth_sequence),
            s.image_frames,
            seq(s.last_image_sequence),
            s.unknown_formats,
        )
    }
}

pub type SharedMetricsState = Arc<RwLock<MetricsState>>;

/// Serves the acquisition registry over HTTP.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedMetricsState,
}

impl MetricsServer {
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(MetricsState {
                registry,
                latest: MetricsSnapshot::default(),
            })),
        }
    }

    /// Handle for pushing snapshots while the server runs.
    pub fn state(&self) -> SharedMetricsState {
        Arc::clone(&self.state)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    match state.read().await.encode() {
        Ok(body) => (StatusCode::OK, [("content-type", PROMETHEUS_CONTENT_TYPE)], body),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics encoding failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", TEXT_CONTENT_TYPE)],
                format!("failed to encode metrics: {}", e),
            )
        }
    }
}

async fn health_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    if state.read().await.latest().is_active {
        (StatusCode::OK, "acquiring")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "inactive")
    }
}

async fn status_handler(State(state): State<SharedMetricsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", TEXT_CONTENT_TYPE)],
        state.read().await.status_line(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> MetricsServer {
        MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap())
    }

    #[test]
    fn test_config_ports() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
        assert_eq!(MetricsServerConfig::with_port(8080).bind_addr.port(), 8080);
    }

    #[tokio::test]
    async fn test_metrics_handler_serves_registry() {
        let state = server().state();
        state.write().await.update(&MetricsSnapshot {
            ticks: 7,
            ..Default::default()
        });

        assert!(state.read().await.encode().unwrap().contains("depthcam_ticks_total 7"));
        let response = metrics_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_follows_activation() {
        let state = server().state();
        let response = health_handler(State(Arc::clone(&state))).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.write().await.update(&MetricsSnapshot {
            is_active: true,
            ..Default::default()
        });
        let response = health_handler(State(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_line_shows_sequences() {
        let state = server().state();
        state.write().await.update(&MetricsSnapshot {
            is_active: true,
            ticks: 3,
            depth_frames: 3,
            last_depth_sequence: Some(3),
            ..Default::default()
        });

        let line = state.read().await.status_line();
        assert!(line.contains("depth=3 (last 3)"));
        assert!(line.contains("image=0 (last -)"));
    }
}
