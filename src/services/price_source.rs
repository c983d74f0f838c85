//! Gold spot price source

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, Result};

/// Default XAU spot price endpoint (USD per troy ounce)
pub const DEFAULT_PRICE_URL: &str = "https://api.gold-api.com/price/XAU";

/// Supplies the current gold price per troy ounce in USD.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self) -> Result<f64>;
}

/// Price source backed by a `{"price": n}` JSON endpoint
pub struct HttpPriceSource {
    client: Client,
    url: String,
}

impl HttpPriceSource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl PriceSource for HttpPriceSource {
    async fn fetch_price(&self) -> Result<f64> {
        let payload = super::get_json(&self.client, &self.url).await?;
        let price = extract_price(&payload)?;
        debug!(price = price, "Fetched gold price");
        Ok(price)
    }
}

/// Pull the numeric `price` field out of the payload
pub fn extract_price(payload: &Value) -> Result<f64> {
    payload
        .get("price")
        .and_then(Value::as_f64)
        .ok_or_else(|| AppError::TransientFetch("numeric price missing from payload".into()))
}
