//! Integration tests for the currency conversion stage

use super::*;
use crate::error::{PipelineError, Result};
use crate::events::{Event, EventType};
use crate::pipeline::{Stage, StageResult};
use crate::rates::{cache_key, MemoryRateCache, RateCache, RateSource};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Quote API stub that counts invocations.
struct CountingRateSource {
    rate: Option<Decimal>,
    calls: AtomicUsize,
}

impl CountingRateSource {
    fn returning(rate: Decimal) -> Self {
        Self {
            rate: Some(rate),
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            rate: None,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateSource for CountingRateSource {
    async fn fetch_rate(&self, _from_currency: &str) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rate
            .ok_or_else(|| PipelineError::RateQuote("stubbed fetch failure".to_string()))
    }
}

/// Cache stub that counts lookups and can refuse stores.
struct CountingRateCache {
    inner: MemoryRateCache,
    gets: AtomicUsize,
    fail_sets: bool,
}

impl CountingRateCache {
    fn new() -> Self {
        Self {
            inner: MemoryRateCache::new(),
            gets: AtomicUsize::new(0),
            fail_sets: false,
        }
    }

    fn with_failing_sets() -> Self {
        Self {
            fail_sets: true,
            ..Self::new()
        }
    }

    fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateCache for CountingRateCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl_secs: i64) -> Result<()> {
        if self.fail_sets {
            return Err(PipelineError::RateCache("stubbed store failure".to_string()));
        }
        self.inner.set(key, value, ttl_secs).await
    }
}

fn money_event(amount: i64, currency: &str) -> Event {
    Event {
        id: 1,
        player_id: 10,
        game_id: 100,
        event_type: EventType::Deposit,
        amount,
        currency: currency.to_string(),
        has_won: false,
        created_at: Utc::now(),
        amount_eur: None,
        description: None,
        player: None,
    }
}

async fn apply(stage: &mut CurrencyConverter, event: Event) -> Event {
    match stage.apply(event).await {
        StageResult::Passed(event) => event,
        StageResult::Degraded { event, .. } => event,
    }
}

#[tokio::test]
async fn test_eur_amounts_skip_cache_and_api() {
    let cache = Arc::new(CountingRateCache::new());
    let source = Arc::new(CountingRateSource::returning(dec!(0.92)));
    let mut stage = CurrencyConverter::new(cache.clone(), source.clone(), 300);

    let enriched = apply(&mut stage, money_event(1234, "EUR")).await;

    assert_eq!(enriched.amount_eur, Some(1234));
    assert_eq!(cache.gets(), 0);
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_cached_rate_avoids_the_api() {
    let cache = Arc::new(CountingRateCache::new());
    cache
        .set(&cache_key("USD"), "0.92".to_string(), 3600)
        .await
        .unwrap();
    let source = Arc::new(CountingRateSource::returning(dec!(0.5)));
    let mut stage = CurrencyConverter::new(cache.clone(), source.clone(), 300);

    let enriched = apply(&mut stage, money_event(1000, "USD")).await;

    assert_eq!(enriched.amount_eur, Some(920));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_cache_miss_fetches_and_populates() {
    let cache = Arc::new(CountingRateCache::new());
    let source = Arc::new(CountingRateSource::returning(dec!(0.9)));
    let mut stage = CurrencyConverter::new(cache.clone(), source.clone(), 300);

    let enriched = apply(&mut stage, money_event(1000, "USD")).await;

    assert_eq!(enriched.amount_eur, Some(900));
    assert_eq!(source.calls(), 1);
    assert_eq!(
        cache.get(&cache_key("USD")).await.unwrap().as_deref(),
        Some("0.9")
    );

    // The next event rides the populated cache.
    let enriched = apply(&mut stage, money_event(2000, "USD")).await;
    assert_eq!(enriched.amount_eur, Some(1800));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_conversion_is_deterministic() {
    let cache = Arc::new(CountingRateCache::new());
    cache
        .set(&cache_key("BTC"), "59123.4567".to_string(), 3600)
        .await
        .unwrap();
    let source = Arc::new(CountingRateSource::failing());
    let mut stage = CurrencyConverter::new(cache.clone(), source, 300);

    let first = apply(&mut stage, money_event(98765, "BTC")).await;
    let second = apply(&mut stage, money_event(98765, "BTC")).await;

    assert_eq!(first.amount_eur, second.amount_eur);
    assert!(first.amount_eur.is_some());
}

#[tokio::test]
async fn test_conversion_truncates_toward_zero() {
    let cache = Arc::new(CountingRateCache::new());
    cache
        .set(&cache_key("USD"), "0.92".to_string(), 3600)
        .await
        .unwrap();
    let source = Arc::new(CountingRateSource::failing());
    let mut stage = CurrencyConverter::new(cache, source, 300);

    // 105 * 0.92 = 96.6 -> 96, never rounded up.
    let enriched = apply(&mut stage, money_event(105, "USD")).await;
    assert_eq!(enriched.amount_eur, Some(96));
}

#[tokio::test]
async fn test_unparseable_cached_rate_degrades_the_event() {
    let cache = Arc::new(CountingRateCache::new());
    cache
        .set(&cache_key("USD"), "not-a-rate".to_string(), 3600)
        .await
        .unwrap();
    let source = Arc::new(CountingRateSource::returning(dec!(0.9)));
    let mut stage = CurrencyConverter::new(cache, source.clone(), 300);

    let result = stage.apply(money_event(1000, "USD")).await;

    match result {
        StageResult::Degraded { event, .. } => assert_eq!(event.amount_eur, None),
        StageResult::Passed(_) => panic!("corrupt cache entry must degrade the event"),
    }
    // A corrupt entry is not treated as a miss; no fetch happens.
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_fetch_failure_degrades_the_event() {
    let cache = Arc::new(CountingRateCache::new());
    let source = Arc::new(CountingRateSource::failing());
    let mut stage = CurrencyConverter::new(cache, source, 300);

    let result = stage.apply(money_event(1000, "USD")).await;

    match result {
        StageResult::Degraded { event, .. } => assert_eq!(event.amount_eur, None),
        StageResult::Passed(_) => panic!("fetch failure must degrade the event"),
    }
}

#[tokio::test]
async fn test_cache_store_failure_does_not_block_conversion() {
    let cache = Arc::new(CountingRateCache::with_failing_sets());
    let source = Arc::new(CountingRateSource::returning(dec!(0.9)));
    let mut stage = CurrencyConverter::new(cache, source.clone(), 300);

    let enriched = apply(&mut stage, money_event(1000, "USD")).await;
    assert_eq!(enriched.amount_eur, Some(900));

    // The store failed, so the next miss simply re-fetches.
    let enriched = apply(&mut stage, money_event(1000, "USD")).await;
    assert_eq!(enriched.amount_eur, Some(900));
    assert_eq!(source.calls(), 2);
}
