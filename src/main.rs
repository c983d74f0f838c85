//! GoldVault - gold price tracker with self-compacting history

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gold_vault::clock::SystemClock;
use gold_vault::config::Config;
use gold_vault::db::Database;
use gold_vault::engine::RetentionEngine;
use gold_vault::routes::{self, metrics::Metrics};
use gold_vault::services::http_client;
use gold_vault::services::price_source::HttpPriceSource;
use gold_vault::services::rate_source::HttpRateSource;
use gold_vault::state::AppState;
use gold_vault::store::{InMemorySampleStore, SampleStore};
use gold_vault::tasks::tracker::{self, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gold_vault=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;

    // Connect to database, or keep history in memory
    let store: Arc<dyn SampleStore> = match &config.database_url {
        Some(url) => {
            let db = Database::new(url)
                .await
                .context("Failed to connect to database")?;
            db.ensure_schema()
                .await
                .context("Failed to create schema")?;
            info!("Database: {}", url.split('@').last().unwrap_or("***"));
            Arc::new(db)
        }
        None => {
            warn!("DATABASE_URL not set, history is kept in memory only");
            Arc::new(InMemorySampleStore::new())
        }
    };

    // Upstream sources
    let client = http_client(config.http_timeout)?;
    let rate_source = Arc::new(HttpRateSource::new(client.clone(), &config.rate_source_url));
    let price_source = Arc::new(HttpPriceSource::new(client, &config.price_source_url));

    let metrics = Arc::new(Metrics::new());

    // Tracker task - refresh, ingest, expire, compact every tick
    let engine = RetentionEngine::new(store.clone(), rate_source, price_source, config.policy)
        .with_initial_rate(config.fallback_rate)
        .with_rate_margin(config.rate_margin);
    let scheduler = Scheduler::new(engine, SystemClock, config.tick_interval, metrics.clone());
    tokio::spawn(tracker::tracker_task(scheduler));

    let app = routes::router(AppState::new(store, metrics));

    info!("GoldVault v{} starting on {}", env!("CARGO_PKG_VERSION"), config.listen_addr);
    info!(
        tick_secs = config.tick_interval.as_secs(),
        retention_days = config.policy.max_age.num_days(),
        compaction_threshold = config.policy.compaction_threshold,
        "Tracker configured"
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
