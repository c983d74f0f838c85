//! Application state shared across handlers

use crate::routes::metrics::Metrics;
use crate::store::SampleStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sample store, read-only from the HTTP side
    pub store: Arc<dyn SampleStore>,
    /// Tracker counters for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state
    ///
    /// # Arguments
    /// * `store` - Sample store shared with the tracker task
    /// * `metrics` - Counters the tracker task records into
    pub fn new(store: Arc<dyn SampleStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }
}
