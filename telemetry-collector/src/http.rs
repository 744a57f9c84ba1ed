//! Collector HTTP query surface.
//!
//! Routes and response shapes are fixed for compatibility with the API
//! gateway collaborator (see crate-level docs); an embedding binary only
//! needs to `axum::serve` the router this module builds.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

// Layer 3: Internal module imports
use crate::ring::RingStats;
use crate::telemetry::Telemetry;
use crate::worker::Collector;

const DEFAULT_TELEMETRY_LIMIT: usize = 100;

/// Build the collector's query router, wired to `collector`.
pub fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/api/v1/gpus/{gpu_id}/telemetry", get(telemetry_for_gpu))
        .route("/api/v1/hosts", get(hosts))
        .route("/api/v1/hosts/{hostname}/gpus", get(gpus_for_host))
        .with_state(collector)
        .layer(TraceLayer::new_for_http())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: chrono::DateTime<Utc>,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

async fn stats(State(collector): State<Arc<Collector>>) -> Json<RingStats> {
    Json(collector.ring().stats())
}

#[derive(Deserialize)]
struct TelemetryQuery {
    limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
struct TelemetryResponse {
    data: Vec<Telemetry>,
    total: usize,
    gpu_id: String,
}

async fn telemetry_for_gpu(
    State(collector): State<Arc<Collector>>,
    Path(gpu_id): Path<String>,
    Query(query): Query<TelemetryQuery>,
) -> Json<TelemetryResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_TELEMETRY_LIMIT);
    let data = collector.ring().telemetry(&gpu_id, limit);
    Json(TelemetryResponse {
        total: data.len(),
        gpu_id,
        data,
    })
}

#[derive(Serialize, Deserialize)]
struct HostsResponse {
    hosts: Vec<String>,
    total: usize,
}

async fn hosts(State(collector): State<Arc<Collector>>) -> Json<HostsResponse> {
    let hosts = collector.ring().hosts();
    Json(HostsResponse {
        total: hosts.len(),
        hosts,
    })
}

#[derive(Serialize)]
struct HostGpusResponse {
    hostname: String,
    gpus: Vec<String>,
    total: usize,
}

async fn gpus_for_host(
    State(collector): State<Arc<Collector>>,
    Path(hostname): Path<String>,
) -> Json<HostGpusResponse> {
    let gpus = collector.ring().gpus_for_host(&hostname);
    Json(HostGpusResponse {
        total: gpus.len(),
        hostname,
        gpus,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::CollectorConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use telemetry_broker::{Broker, BrokerConfig};
    use tempfile::tempdir;
    use tower::ServiceExt;

    async fn test_collector() -> Arc<Collector> {
        let broker = Broker::new(BrokerConfig::default());
        let dir = tempdir().unwrap();
        let config = CollectorConfig::builder()
            .with_workers(1)
            .with_data_dir(dir.path())
            .with_checkpoints(false, dir.path())
            .build()
            .unwrap();
        Collector::start(broker, config).unwrap()
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let collector = test_collector().await;
        let app = router(collector);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn telemetry_for_unknown_gpu_returns_empty_data() {
        let collector = test_collector().await;
        let app = router(collector);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/gpus/missing/telemetry")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: TelemetryResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.total, 0);
        assert!(parsed.data.is_empty());
    }

    #[tokio::test]
    async fn hosts_returns_empty_set_initially() {
        let collector = test_collector().await;
        let app = router(collector);

        let response = app
            .oneshot(Request::builder().uri("/api/v1/hosts").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: HostsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed.total, 0);
    }
}
