//! HTTP surface: liveness, metrics and read-only history

pub mod health;
pub mod metrics;
pub mod samples;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the service router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Liveness and probes
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // History
        .route("/api/v1/samples", get(samples::get_samples))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
