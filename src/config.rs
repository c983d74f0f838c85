//! Service configuration read from environment variables

use chrono::{Duration as ChronoDuration, FixedOffset};
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::{FALLBACK_RATE, RATE_MARGIN};
use crate::error::{AppError, Result};
use crate::models::RetentionPolicy;
use crate::services::price_source::DEFAULT_PRICE_URL;
use crate::services::rate_source::DEFAULT_RATE_URL;

/// Longest accepted retention window, roughly ten years
pub const MAX_RETENTION_DAYS: i64 = 3650;

/// Runtime configuration.
///
/// Every field has a default; `DATABASE_URL` is the only optional one and
/// selects the in-memory store when unset.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub database_url: Option<String>,
    pub rate_source_url: String,
    pub price_source_url: String,
    pub tick_interval: Duration,
    pub http_timeout: Duration,
    pub fallback_rate: f64,
    pub rate_margin: f64,
    pub policy: RetentionPolicy,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let listen_addr = match var("LISTEN_ADDR") {
            Some(addr) => parse("LISTEN_ADDR", &addr)?,
            None => {
                let port: u16 = parse_or(&var, "PORT", 3000)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let tick_secs: u64 = parse_or(&var, "TICK_INTERVAL_SECS", 60)?;
        if tick_secs == 0 {
            return Err(AppError::Config("TICK_INTERVAL_SECS must be at least 1".into()));
        }

        let fallback_rate: f64 = parse_or(&var, "FALLBACK_RATE", FALLBACK_RATE)?;
        if !fallback_rate.is_finite() || fallback_rate <= 0.0 {
            return Err(AppError::Config("FALLBACK_RATE must be positive".into()));
        }

        let retention_days: i64 = parse_or(&var, "RETENTION_DAYS", 7)?;
        if retention_days < 2 {
            return Err(AppError::Config(
                "RETENTION_DAYS must be at least 2 so yesterday survives until compaction".into(),
            ));
        }
        let max_age = ChronoDuration::try_days(retention_days)
            .filter(|_| retention_days <= MAX_RETENTION_DAYS)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "RETENTION_DAYS must be at most {}, got {}",
                    MAX_RETENTION_DAYS, retention_days
                ))
            })?;

        let rate_margin: f64 = parse_or(&var, "RATE_MARGIN", RATE_MARGIN)?;
        if !rate_margin.is_finite() {
            return Err(AppError::Config("RATE_MARGIN must be a finite number".into()));
        }

        let timeout_secs: u64 = parse_or(&var, "HTTP_TIMEOUT_SECS", 10)?;
        if timeout_secs == 0 {
            return Err(AppError::Config("HTTP_TIMEOUT_SECS must be at least 1".into()));
        }

        let offset_minutes: i32 = parse_or(&var, "UTC_OFFSET_MINUTES", 0)?;
        let utc_offset = offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                AppError::Config(format!("UTC_OFFSET_MINUTES out of range: {}", offset_minutes))
            })?;

        Ok(Self {
            listen_addr,
            database_url: var("DATABASE_URL"),
            rate_source_url: var("RATE_SOURCE_URL").unwrap_or_else(|| DEFAULT_RATE_URL.to_string()),
            price_source_url: var("PRICE_SOURCE_URL")
                .unwrap_or_else(|| DEFAULT_PRICE_URL.to_string()),
            tick_interval: Duration::from_secs(tick_secs),
            http_timeout: Duration::from_secs(timeout_secs),
            fallback_rate,
            rate_margin,
            policy: RetentionPolicy {
                max_age,
                compaction_threshold: parse_or(&var, "COMPACTION_THRESHOLD", 10)?,
                utc_offset,
            },
        })
    }
}

fn parse<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AppError::Config(format!("Invalid {}: {:?}", name, raw)))
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => parse(name, &raw),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| env.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert!(config.database_url.is_none());
        assert_eq!(config.rate_source_url, DEFAULT_RATE_URL);
        assert_eq!(config.price_source_url, DEFAULT_PRICE_URL);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
        assert_eq!(config.fallback_rate, 0.308);
        assert_eq!(config.rate_margin, 0.002);
        assert_eq!(config.policy.max_age, ChronoDuration::days(7));
        assert_eq!(config.policy.compaction_threshold, 10);
    }

    #[test]
    fn test_port_variable() {
        let config = load(&[("PORT", "8080")]).unwrap();
        assert_eq!(config.listen_addr.port(), 8080);
    }

    #[test]
    fn test_listen_addr_wins_over_port() {
        let config = load(&[("PORT", "8080"), ("LISTEN_ADDR", "127.0.0.1:9000")]).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = load(&[("DATABASE_URL", "  "), ("PORT", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.listen_addr.port(), 3000);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        assert!(matches!(load(&[("PORT", "http")]), Err(AppError::Config(_))));
        assert!(load(&[("TICK_INTERVAL_SECS", "0")]).is_err());
        assert!(load(&[("FALLBACK_RATE", "-1")]).is_err());
        assert!(load(&[("RETENTION_DAYS", "1")]).is_err());
        assert!(load(&[("UTC_OFFSET_MINUTES", "5000")]).is_err());
    }

    #[test]
    fn test_retention_days_upper_bound() {
        let config = load(&[("RETENTION_DAYS", "3650")]).unwrap();
        assert_eq!(config.policy.max_age, ChronoDuration::days(MAX_RETENTION_DAYS));

        assert!(matches!(load(&[("RETENTION_DAYS", "3651")]), Err(AppError::Config(_))));
        assert!(matches!(
            load(&[("RETENTION_DAYS", "100000000")]),
            Err(AppError::Config(_))
        ));
        assert!(matches!(
            load(&[("RETENTION_DAYS", i64::MAX.to_string().as_str())]),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_rate_margin_and_timeout_validation() {
        assert!(matches!(load(&[("RATE_MARGIN", "NaN")]), Err(AppError::Config(_))));
        assert!(matches!(load(&[("RATE_MARGIN", "inf")]), Err(AppError::Config(_))));
        assert!(matches!(load(&[("HTTP_TIMEOUT_SECS", "0")]), Err(AppError::Config(_))));

        // A negative margin is a finite spread; the engine rejects rates it drives to zero.
        let config = load(&[("RATE_MARGIN", "-0.001"), ("HTTP_TIMEOUT_SECS", "1")]).unwrap();
        assert_eq!(config.rate_margin, -0.001);
        assert_eq!(config.http_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_utc_offset() {
        let config = load(&[("UTC_OFFSET_MINUTES", "180")]).unwrap();
        assert_eq!(config.policy.utc_offset.local_minus_utc(), 3 * 3600);
    }
}
