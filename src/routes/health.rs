//! Liveness, health and readiness endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

/// Fixed body returned by the uptime-monitor ping
pub const PING_BODY: &str = "Alive and tracking gold rates.";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Readiness check response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub store: CheckStatus,
    pub tracker: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub healthy: bool,
    pub message: String,
}

/// GET /ping
///
/// Keep-alive for uptime monitors. Never touches the store.
pub async fn ping() -> (StatusCode, &'static str) {
    (StatusCode::OK, PING_BODY)
}

/// GET /health
///
/// Basic health check - returns 200 if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ready
///
/// Readiness check - verifies the sample store answers
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let store_check = match state.store.ping().await {
        Ok(()) => CheckStatus {
            healthy: true,
            message: "Connected".to_string(),
        },
        Err(e) => CheckStatus {
            healthy: false,
            message: format!("Store unavailable: {}", e),
        },
    };

    // Tracker failures are reported, not fatal: the next tick retries.
    let snapshot = state.metrics.get_metrics();
    let tracker_check = CheckStatus {
        healthy: true,
        message: format!(
            "{} cycles, {} failed",
            snapshot.cycles_total, snapshot.cycle_failures_total
        ),
    };

    let all_healthy = store_check.healthy && tracker_check.healthy;
    let status = if all_healthy { "ready" } else { "not_ready" };
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            status,
            checks: ReadinessChecks {
                store: store_check,
                tracker: tracker_check,
            },
        }),
    )
}
