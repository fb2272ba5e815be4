//! Exchange-rate cache and quote API client
//!
//! The currency stage talks to both through ports so tests can substitute
//! counting stubs: [`RateCache`] is a generic expiring key-value store and
//! [`RateSource`] is the remote quote API. Rates are stored as their decimal
//! string rendering, never as binary floats.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

/// Cache key for a rate quoted against EUR.
pub fn cache_key(from_currency: &str) -> String {
    format!("exchange_rate_{from_currency}_EUR")
}

/// Expiring key-value store fronting the quote API.
///
/// Entries are created on a miss after a successful fetch and expire on
/// their own; nothing ever deletes one early. Concurrent writers racing on
/// the same key just overwrite each other, which is fine for a quoted rate.
#[async_trait]
pub trait RateCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<()>;
}

/// Remote quote API.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Fetch the EUR rate for one unit of `from_currency`.
    async fn fetch_rate(&self, from_currency: &str) -> Result<Decimal>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn new(value: String, ttl_secs: i64) -> Self {
        Self {
            value,
            expires_at: Utc::now() + Duration::seconds(ttl_secs),
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// In-process TTL cache.
#[derive(Default)]
pub struct MemoryRateCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryRateCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateCache for MemoryRateCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read();
        Ok(entries.get(key).and_then(|entry| {
            if entry.is_expired() {
                None
            } else {
                Some(entry.value.clone())
            }
        }))
    }

    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), CacheEntry::new(value, ttl_secs));
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    quotes: HashMap<String, Decimal>,
}

/// Quote API client.
pub struct HttpRateSource {
    http: Client,
    api_url: String,
    access_key: String,
}

impl HttpRateSource {
    pub fn new(api_url: &str, access_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            access_key: access_key.to_string(),
        })
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self, from_currency: &str) -> Result<Decimal> {
        let resp = self
            .http
            .get(&self.api_url)
            .query(&[("access_key", self.access_key.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(PipelineError::RateQuote(format!(
                "unexpected status code: {}",
                resp.status()
            )));
        }

        let body: QuoteResponse = resp.json().await?;
        let quote_key = format!("{from_currency}EUR");
        let rate = body.quotes.get(&quote_key).copied().ok_or_else(|| {
            PipelineError::RateQuote(format!("missing rate for {quote_key}"))
        })?;

        debug!(%from_currency, %rate, "fetched exchange rate");
        Ok(rate)
    }
}
