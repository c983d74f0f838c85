//! Database access layer with SQLx and PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{Sample, TimeRange};
use crate::store::SampleStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS gold_samples (
    id BIGSERIAL PRIMARY KEY,
    timestamp TIMESTAMPTZ NOT NULL,
    ounce_price DOUBLE PRECISION NOT NULL,
    gram_price_kwd DOUBLE PRECISION NOT NULL
)
"#;

const SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS gold_samples_timestamp_idx ON gold_samples (timestamp)";

/// Database connection pool and operations
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::Store(format!("Failed to connect: {}", e)))?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// Create the samples table and its timestamp index if missing
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(SCHEMA_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

/// Append `WHERE` clauses for a half-open range
fn push_range(builder: &mut QueryBuilder<'_, Postgres>, range: TimeRange) {
    builder.push(" WHERE timestamp < ");
    builder.push_bind(range.end);
    if let Some(start) = range.start {
        builder.push(" AND timestamp >= ");
        builder.push_bind(start);
    }
}

fn row_to_sample(row: &PgRow) -> Sample {
    let timestamp: DateTime<Utc> = row.get("timestamp");
    Sample {
        timestamp,
        raw_price: row.get("ounce_price"),
        derived_value: row.get("gram_price_kwd"),
    }
}

#[async_trait]
impl SampleStore for Database {
    async fn insert(&self, sample: &Sample) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO gold_samples (timestamp, ounce_price, gram_price_kwd)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(sample.timestamp)
        .bind(sample.raw_price)
        .bind(sample.derived_value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_range(&self, range: TimeRange) -> Result<Vec<Sample>> {
        let mut builder =
            QueryBuilder::new("SELECT timestamp, ounce_price, gram_price_kwd FROM gold_samples");
        push_range(&mut builder, range);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_sample).collect())
    }

    async fn delete_range(&self, range: TimeRange) -> Result<u64> {
        let mut builder = QueryBuilder::new("DELETE FROM gold_samples");
        push_range(&mut builder, range);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn replace_range(&self, range: TimeRange, replacement: &Sample) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        let mut builder = QueryBuilder::new("DELETE FROM gold_samples");
        push_range(&mut builder, range);
        let deleted = builder.build().execute(&mut *tx).await?.rows_affected();

        sqlx::query(
            r#"
            INSERT INTO gold_samples (timestamp, ounce_price, gram_price_kwd)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(replacement.timestamp)
        .bind(replacement.raw_price)
        .bind(replacement.derived_value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(deleted)
    }

    async fn recent(&self, range: Option<TimeRange>, limit: usize) -> Result<Vec<Sample>> {
        let mut builder =
            QueryBuilder::new("SELECT timestamp, ounce_price, gram_price_kwd FROM gold_samples");
        if let Some(range) = range {
            push_range(&mut builder, range);
        }
        builder.push(" ORDER BY timestamp DESC LIMIT ");
        builder.push_bind(limit as i64);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_sample).collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
