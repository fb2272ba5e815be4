//! Random event generator for load-testing and demonstration
//!
//! Runs against a hard deadline rather than an interrupt: it emits events at
//! random sub-100ms intervals until time is up, then closes its channel.

use crate::events::{catalog, Event};
use crate::pipeline;
use chrono::Utc;
use rand::Rng;
use std::time::Duration;
use tokio::sync::mpsc;

/// Spawn the generator; the returned channel closes when the deadline hits.
pub fn generate_events(deadline: Duration, capacity: usize) -> mpsc::Receiver<Event> {
    let (tx, rx) = pipeline::channel(capacity);

    tokio::spawn(async move {
        let started = tokio::time::Instant::now();
        let mut next_id: i64 = 0;

        while started.elapsed() < deadline {
            next_id += 1;
            if tx.send(random_event(next_id)).await.is_err() {
                break;
            }

            let pause = rand::rng().random_range(0..100);
            tokio::time::sleep(Duration::from_millis(pause)).await;
        }
    });

    rx
}

fn random_event(id: i64) -> Event {
    let mut rng = rand::rng();
    let (amount, currency) = random_amount_currency(&mut rng);

    Event {
        id,
        player_id: 10 + rng.random_range(0..10),
        game_id: 100 + rng.random_range(0..10),
        event_type: catalog::EVENT_TYPES[rng.random_range(0..catalog::EVENT_TYPES.len())].clone(),
        amount,
        currency: currency.to_string(),
        has_won: rng.random_range(0..100) < 5,
        created_at: Utc::now(),
        amount_eur: None,
        description: None,
        player: None,
    }
}

fn random_amount_currency(rng: &mut impl Rng) -> (i64, &'static str) {
    let currency = catalog::CURRENCIES[rng.random_range(0..catalog::CURRENCIES.len())];

    // BTC amounts are quoted in satoshi-scale minor units, so a wider range.
    let amount = match currency {
        "BTC" => rng.random_range(0..100_000),
        _ => rng.random_range(0..2_000),
    };

    (amount, currency)
}
