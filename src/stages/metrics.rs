//! Sliding-window metrics aggregation stage

use crate::events::{Event, EventType};
use crate::pipeline::{Stage, StageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Trailing interval over which the rate metrics are computed.
const WINDOW_SECS: i64 = 60;

/// A leaderboard slot: the player holding the greatest counter value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerMetric {
    pub id: i64,
    pub count: i64,
}

/// Deposit leaderboard slot with the total rendered in whole EUR.
#[derive(Debug, Clone, Serialize)]
pub struct DepositMetric {
    pub id: i64,
    pub count: i64,
    pub amount_eur: Decimal,
}

/// Consistent read of all published metrics at one instant.
///
/// Monetary values are converted from minor units to two-decimal EUR here,
/// at the serialization boundary, never inside the counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub events_total: u64,
    pub events_per_minute: Decimal,
    pub events_per_second_moving_average: Decimal,
    pub top_player_bets: PlayerMetric,
    pub top_player_wins: PlayerMetric,
    pub top_player_deposits: DepositMetric,
}

#[derive(Default)]
struct MetricsState {
    events_total: u64,
    /// Second-resolution timestamps inside the trailing window, kept sorted
    /// at all times so eviction is a binary search plus a prefix drain.
    window: Vec<i64>,
    events_per_minute: Decimal,
    events_per_second_avg: Decimal,
    player_bets: HashMap<i64, i64>,
    player_wins: HashMap<i64, i64>,
    player_deposits: HashMap<i64, i64>,
    player_game_starts: HashMap<i64, i64>,
    player_game_stops: HashMap<i64, i64>,
    top_bets: PlayerMetric,
    top_wins: PlayerMetric,
    top_deposits: PlayerMetric,
}

/// Live throughput estimates and per-player leaderboards.
///
/// Single writer (the ingestion stage), many readers (the snapshot
/// endpoint); the whole state sits behind one read/write lock so a snapshot
/// can never observe a half-applied update.
#[derive(Default)]
pub struct MetricsAggregator {
    state: RwLock<MetricsState>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: &Event) {
        self.record_at(event, Utc::now());
    }

    fn record_at(&self, event: &Event, now: DateTime<Utc>) {
        let mut state = self.state.write();

        state.events_total += 1;

        // Arrival may be slightly out of order; sorted insertion keeps the
        // window usable for binary-search eviction regardless.
        let ts = event.created_at.timestamp();
        let insert_at = state.window.partition_point(|&t| t <= ts);
        state.window.insert(insert_at, ts);

        let horizon = now.timestamp() - WINDOW_SECS;
        let stale = state.window.partition_point(|&t| t < horizon);
        state.window.drain(..stale);

        match &event.event_type {
            EventType::Bet => {
                *state.player_bets.entry(event.player_id).or_insert(0) += 1;
                if event.has_won {
                    *state.player_wins.entry(event.player_id).or_insert(0) += 1;
                }
            }
            EventType::Deposit => {
                *state.player_deposits.entry(event.player_id).or_insert(0) +=
                    event.amount_eur.unwrap_or(0);
            }
            EventType::GameStart => {
                *state.player_game_starts.entry(event.player_id).or_insert(0) += 1;
            }
            EventType::GameStop => {
                *state.player_game_stops.entry(event.player_id).or_insert(0) += 1;
            }
            EventType::Other(_) => {}
        }

        let samples = state.window.len() as i64;
        if samples > 0 {
            // Rate normalized against the populated span (one second per
            // retained sample), not a fixed 60 s denominator. An empty
            // window keeps the previous value instead of dividing by zero.
            let minutes_covered = Decimal::from(samples) / dec!(60);
            state.events_per_minute = Decimal::from(samples) / minutes_covered;

            let elapsed = now.timestamp() - state.window[0];
            if elapsed > 0 {
                state.events_per_second_avg = Decimal::from(samples) / Decimal::from(elapsed);
            }
        }

        state.top_bets = top_of(&state.player_bets);
        state.top_wins = top_of(&state.player_wins);
        state.top_deposits = top_of(&state.player_deposits);
    }

    /// Consistent read of all published fields.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.read();
        MetricsSnapshot {
            events_total: state.events_total,
            events_per_minute: state.events_per_minute,
            events_per_second_moving_average: state.events_per_second_avg,
            top_player_bets: state.top_bets.clone(),
            top_player_wins: state.top_wins.clone(),
            top_player_deposits: DepositMetric {
                id: state.top_deposits.id,
                count: state.top_deposits.count,
                amount_eur: Decimal::from(state.top_deposits.count) / dec!(100),
            },
        }
    }

    #[cfg(test)]
    fn window_len(&self) -> usize {
        self.state.read().window.len()
    }
}

/// Player with the strictly-greatest counter; ties resolve to the lowest
/// player id, an empty map yields player 0 with count 0.
fn top_of(counters: &HashMap<i64, i64>) -> PlayerMetric {
    let mut top = PlayerMetric::default();
    for (&id, &count) in counters {
        if count > top.count || (count == top.count && count > 0 && id < top.id) {
            top = PlayerMetric { id, count };
        }
    }
    top
}

/// Pass-through stage feeding the aggregator.
pub struct MetricsStage {
    aggregator: Arc<MetricsAggregator>,
}

impl MetricsStage {
    pub fn new(aggregator: Arc<MetricsAggregator>) -> Self {
        Self { aggregator }
    }
}

#[async_trait]
impl Stage for MetricsStage {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn apply(&mut self, event: Event) -> StageResult {
        self.aggregator.record(&event);
        StageResult::Passed(event)
    }
}
