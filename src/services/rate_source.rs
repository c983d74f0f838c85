//! USD to local-currency exchange rate source

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};

/// Default open exchange-rate endpoint (USD base)
pub const DEFAULT_RATE_URL: &str = "https://open.er-api.com/v6/latest/USD";

/// Currency the tracker converts into
pub const TARGET_CURRENCY: &str = "KWD";

/// Supplies the current USD -> target-currency multiplier.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the raw rate, before any margin is applied
    async fn fetch_rate(&self) -> Result<f64>;
}

/// Rate source backed by an `{"rates": {"KWD": n}}` JSON endpoint
pub struct HttpRateSource {
    client: Client,
    url: String,
    currency: String,
}

impl HttpRateSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            currency: TARGET_CURRENCY.to_string(),
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self) -> Result<f64> {
        let payload = super::get_json(&self.client, &self.url).await?;
        let rate = extract_rate(&payload, &self.currency)?;
        debug!(currency = %self.currency, rate = rate, "Fetched exchange rate");
        Ok(rate)
    }
}

/// Pull `rates.<currency>` out of the payload.
///
/// A missing, non-numeric, or non-positive value is a fetch failure.
pub fn extract_rate(payload: &Value, currency: &str) -> Result<f64> {
    let rate = payload
        .get("rates")
        .and_then(|rates| rates.get(currency))
        .ok_or_else(|| AppError::TransientFetch(format!("rates.{} missing from payload", currency)))?
        .as_f64()
        .ok_or_else(|| AppError::TransientFetch(format!("rates.{} is not a number", currency)))?;

    if !rate.is_finite() || rate <= 0.0 {
        return Err(AppError::TransientFetch(format!(
            "rates.{} is not a usable rate: {}",
            currency, rate
        )));
    }

    Ok(rate)
}
