//! Sample history API endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Sample, TimeRange};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for the history endpoint
#[derive(Debug, Deserialize)]
pub struct SamplesQuery {
    /// Inclusive start time
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end time (defaults to now)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of samples to return (default: 100, max: 1000)
    pub limit: Option<usize>,
}

/// Response for the history endpoint
#[derive(Debug, Serialize)]
pub struct SamplesResponse {
    pub count: usize,
    pub samples: Vec<Sample>,
}

/// GET /api/v1/samples
///
/// Returns stored samples, newest first. Compacted days appear as a single
/// sample stamped at the start of that day.
///
/// Query parameters:
/// - from: Start time (default: unbounded)
/// - to: End time (default: now)
/// - limit: Maximum results (default: 100, max: 1000)
pub async fn get_samples(
    State(state): State<AppState>,
    Query(params): Query<SamplesQuery>,
) -> Result<Json<SamplesResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    let range = match (params.from, params.to) {
        (None, None) => None,
        (from, to) => {
            let to = to.unwrap_or_else(Utc::now);
            if let Some(from) = from {
                if from >= to {
                    return Err(AppError::InvalidRequest(
                        "'from' must be before 'to'".into(),
                    ));
                }
            }
            Some(TimeRange { start: from, end: to })
        }
    };

    let samples = state.store.recent(range, limit).await?;

    Ok(Json(SamplesResponse {
        count: samples.len(),
        samples,
    }))
}
