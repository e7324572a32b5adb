//! Status listener
//!
//! Optional HTTP surface for watching a long run and re-trusting keys without
//! restarting it.
//!
//! Endpoints:
//! - GET  /health             pool JSON; 200 while any key is available, 503 otherwise
//! - GET  /status             masked plain-text key report
//! - GET  /metrics            Prometheus text exposition
//! - POST /keys/{index}/enable  re-enable one key (clears disabled, errors, cooldown)
//! - POST /keys/reset         re-enable every key

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use key_pool::SharedPool;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{info, warn};

/// Shared state for status handlers.
#[derive(Clone)]
pub struct StatusState {
    pub pool: SharedPool,
    pub prometheus: PrometheusHandle,
}

/// Build the status router. At most `max_connections` requests are served at once.
pub fn build_router(state: StatusState, max_connections: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .route("/keys/reset", post(reset_handler))
        .route("/keys/{index}/enable", post(enable_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

async fn health_handler(State(state): State<StatusState>) -> impl IntoResponse {
    let health = state.pool.health().await;
    let any_available = health["keys_available"].as_u64().unwrap_or(0) > 0;
    let status_code = if any_available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        [(CONTENT_TYPE, "application/json")],
        health.to_string(),
    )
}

async fn status_handler(State(state): State<StatusState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.pool.report().await,
    )
}

async fn metrics_handler(State(state): State<StatusState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.prometheus.render(),
    )
}

/// POST /keys/{index}/enable (0-based index, as in /health).
async fn enable_handler(
    State(state): State<StatusState>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    let (status_code, body) = match state.pool.enable(index).await {
        Ok(()) => {
            info!(key_index = index, "key enabled via status listener");
            (
                StatusCode::OK,
                serde_json::json!({ "index": index, "status": "enabled" }),
            )
        }
        Err(e) => {
            warn!(key_index = index, error = %e, "enable request rejected");
            (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": e.to_string() }),
            )
        }
    };

    (
        status_code,
        [(CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn reset_handler(State(state): State<StatusState>) -> impl IntoResponse {
    state.pool.reset_all().await;
    info!("all keys reset via status listener");
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "application/json")],
        serde_json::json!({ "status": "reset" }).to_string(),
    )
}
