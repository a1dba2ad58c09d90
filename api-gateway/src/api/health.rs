//! Health check handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, Json};
use common::error::Error;

use crate::api::response::{DependencyHealth, HealthResponse};
use crate::AppState;

/// Account id probed to check the store; it never needs to exist
const PROBE_ACCOUNT_ID: &str = "__health_probe__";

/// Report liveness of the server and its profile store
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "All dependencies up", body = HealthResponse),
        (status = 503, description = "Profile store unreachable", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let probe_start = Instant::now();

    // Any answer from the store means it is reachable, even NotFound
    let store_status = match state.balance_service.get_balance(PROBE_ACCOUNT_ID).await {
        Ok(_) | Err(Error::ProfileNotFound(_)) => "up",
        Err(_) => "down",
    };
    let latency_ms = probe_start.elapsed().as_millis() as u64;

    let healthy = store_status == "up";
    let report = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        profile_store: DependencyHealth {
            status: store_status.to_string(),
            latency_ms,
        },
    };

    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report))
}
