//! Upstream data sources

pub mod price_source;
pub mod rate_source;

use reqwest::Client;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Build the HTTP client shared by the upstream sources
pub fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("gold-vault/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// GET `url` and decode the body as JSON, treating non-2xx as a fetch failure
pub(crate) async fn get_json(client: &Client, url: &str) -> Result<serde_json::Value> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::TransientFetch(format!(
            "{} returned status {}",
            url, status
        )));
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
