//! Staged pipeline runtime
//!
//! Every service runs the same topology: a consumer adapter feeding a
//! bounded channel, exactly one [`Stage`] transforming events one at a time,
//! and a publisher adapter draining the stage's output channel. Back-pressure
//! is implicit: a full channel blocks the sender, and nothing is ever dropped
//! by the runtime itself.


use crate::error::PipelineError;
use crate::events::Event;
use crate::shutdown::Shutdown;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Default bound on stage hand-off channels. An open tuning parameter, not a
/// behavioral contract; the only requirement is that it is finite.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Outcome of applying a stage to one event.
///
/// Enrichment failure degrades data quality but never loses the event: a
/// `Degraded` result still carries the event, partially enriched, for the
/// runtime to forward.
#[derive(Debug)]
pub enum StageResult {
    Passed(Event),
    Degraded {
        event: Event,
        reason: PipelineError,
    },
}

/// One pipeline unit transforming events between two channels.
#[async_trait]
pub trait Stage: Send {
    fn name(&self) -> &'static str;

    async fn apply(&mut self, event: Event) -> StageResult;
}

/// Bounded hand-off channel between a stage and its neighbors.
pub fn channel(capacity: usize) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
    mpsc::channel(capacity)
}

/// Drive a stage until its input closes or the shutdown signal fires.
///
/// Events are processed strictly in arrival order; a transformation failure
/// is logged and the event forwarded anyway. Sending into a full output
/// channel blocks the loop, which is what propagates back-pressure upstream.
pub async fn run_stage<S: Stage>(
    mut stage: S,
    mut input: mpsc::Receiver<Event>,
    output: mpsc::Sender<Event>,
    mut shutdown: Shutdown,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.triggered() => {
                info!(stage = stage.name(), "shutdown signal observed, stopping");
                break;
            }
            received = input.recv() => match received {
                Some(event) => event,
                None => {
                    info!(stage = stage.name(), "input channel closed, stopping");
                    break;
                }
            },
        };

        let outgoing = match stage.apply(event).await {
            StageResult::Passed(event) => event,
            StageResult::Degraded { event, reason } => {
                warn!(
                    stage = stage.name(),
                    event_id = event.id,
                    %reason,
                    "enrichment failed, forwarding event as-is"
                );
                event
            }
        };

        if output.send(outgoing).await.is_err() {
            warn!(stage = stage.name(), "output channel closed, stopping");
            break;
        }
    }
}
