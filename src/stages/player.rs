//! Player-profile enrichment stage

use crate::error::PipelineError;
use crate::events::Event;
use crate::pipeline::{Stage, StageResult};
use crate::storage::PlayerStore;
use async_trait::async_trait;

/// Attaches the player's profile from the catalog database.
///
/// An unknown player or a failed query degrades the event; it is forwarded
/// without a profile either way.
pub struct PlayerStage {
    store: PlayerStore,
}

impl PlayerStage {
    pub fn new(store: PlayerStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for PlayerStage {
    fn name(&self) -> &'static str {
        "player"
    }

    async fn apply(&mut self, mut event: Event) -> StageResult {
        match self.store.find_player(event.player_id).await {
            Ok(Some(profile)) => {
                event.player = Some(profile);
                StageResult::Passed(event)
            }
            Ok(None) => {
                let reason = PipelineError::PlayerNotFound(event.player_id);
                StageResult::Degraded { event, reason }
            }
            Err(reason) => StageResult::Degraded { event, reason },
        }
    }
}
