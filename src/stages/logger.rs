//! Terminal logging sink for the materialization pipeline

use crate::events::Event;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Drain a channel, logging each event as its JSON wire form. Runs until
/// the channel closes.
pub async fn log_events(mut input: mpsc::Receiver<Event>) {
    while let Some(event) = input.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "casino_pipeline::events", "{json}"),
            Err(err) => warn!(event_id = event.id, %err, "failed to serialize event"),
        }
    }
}
