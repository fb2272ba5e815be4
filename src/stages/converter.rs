//! Cache-aside currency conversion stage

use crate::error::{PipelineError, Result};
use crate::events::Event;
use crate::pipeline::{Stage, StageResult};
use crate::rates::{cache_key, RateCache, RateSource};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Enriches events with an EUR-converted amount.
///
/// Rates come from the shared cache when present, otherwise from the quote
/// API (the fetched rate is cached with the configured TTL before use). Any
/// per-event failure leaves `amount_eur` unset and the event flows on.
pub struct CurrencyConverter {
    cache: Arc<dyn RateCache>,
    source: Arc<dyn RateSource>,
    cache_ttl_secs: i64,
}

impl CurrencyConverter {
    pub fn new(
        cache: Arc<dyn RateCache>,
        source: Arc<dyn RateSource>,
        cache_ttl_secs: i64,
    ) -> Self {
        Self {
            cache,
            source,
            cache_ttl_secs,
        }
    }

    async fn convert_to_eur(&self, amount: i64, currency: &str) -> Result<i64> {
        if currency == "EUR" {
            return Ok(amount);
        }

        let key = cache_key(currency);
        let rate = match self.cache.get(&key).await? {
            Some(raw) => Decimal::from_str(&raw).map_err(|err| {
                PipelineError::RateCache(format!("parse cached rate {raw:?}: {err}"))
            })?,
            None => {
                debug!(%currency, "rate cache miss, fetching quote");
                let rate = self.source.fetch_rate(currency).await?;
                // A failed store only costs a re-fetch on the next miss; the
                // conversion in hand still goes through.
                if let Err(err) = self
                    .cache
                    .set(&key, rate.to_string(), self.cache_ttl_secs)
                    .await
                {
                    warn!(%currency, %err, "failed to cache exchange rate");
                }
                rate
            }
        };

        apply_rate(amount, rate)
    }
}

/// Exact decimal multiply, truncated toward zero to stay in minor units.
fn apply_rate(amount: i64, rate: Decimal) -> Result<i64> {
    (Decimal::from(amount) * rate)
        .trunc()
        .to_i64()
        .ok_or_else(|| {
            PipelineError::RateQuote(format!("converted amount out of range: {amount} x {rate}"))
        })
}

#[async_trait]
impl Stage for CurrencyConverter {
    fn name(&self) -> &'static str {
        "currency"
    }

    async fn apply(&mut self, mut event: Event) -> StageResult {
        match self.convert_to_eur(event.amount, &event.currency).await {
            Ok(amount_eur) => {
                event.amount_eur = Some(amount_eur);
                StageResult::Passed(event)
            }
            Err(reason) => StageResult::Degraded { event, reason },
        }
    }
}
