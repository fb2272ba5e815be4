//! Human-readable description stage

use crate::events::{catalog, Event, EventType};
use crate::pipeline::{Stage, StageResult};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const UNKNOWN_GAME: &str = "Unknown Game";

/// Attaches a templated sentence describing the event.
pub struct DescriptionStage;

impl DescriptionStage {
    pub fn new() -> Self {
        Self
    }

    fn describe(&self, event: &Event) -> String {
        let game_title = catalog::game_title(event.game_id).unwrap_or(UNKNOWN_GAME);
        let created_at = format_created_at(&event.created_at);
        let amount = minor_units(event.amount);
        let amount_eur = minor_units(event.amount_eur.unwrap_or(0));

        match &event.event_type {
            EventType::GameStart => format!(
                "Player #{} started playing a game \"{}\" on {}.",
                event.player_id, game_title, created_at
            ),
            EventType::Bet => {
                let email = event
                    .player
                    .as_ref()
                    .map(|p| p.email.as_str())
                    .unwrap_or("");
                let mut description = format!(
                    "Player #{} ({}) placed a bet of {:.2} {} ({:.2} EUR) on a game \"{}\" on {}.",
                    event.player_id, email, amount, event.currency, amount_eur, game_title,
                    created_at
                );
                if event.has_won {
                    description.push_str(" The bet was won.");
                } else {
                    description.push_str(" The bet was lost.");
                }
                description
            }
            EventType::Deposit => format!(
                "Player #{} made a deposit of {:.2} {} on {}.",
                event.player_id, amount, event.currency, created_at
            ),
            EventType::GameStop => format!(
                "Player #{} stopped playing a game \"{}\" on {}.",
                event.player_id, game_title, created_at
            ),
            EventType::Other(raw) => format!(
                "Event ID #{} of type {} occurred on {}.",
                event.id, raw, created_at
            ),
        }
    }
}

impl Default for DescriptionStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for DescriptionStage {
    fn name(&self) -> &'static str {
        "description"
    }

    async fn apply(&mut self, mut event: Event) -> StageResult {
        event.description = Some(self.describe(&event));
        StageResult::Passed(event)
    }
}

fn minor_units(amount: i64) -> Decimal {
    Decimal::from(amount) / dec!(100)
}

/// Renders e.g. `April 7th, 2024 at 13:05 UTC`.
fn format_created_at(created_at: &DateTime<Utc>) -> String {
    let day = created_at.day();
    format!(
        "{} {}{}, {} at {} UTC",
        created_at.format("%B"),
        day,
        ordinal_suffix(day),
        created_at.format("%Y"),
        created_at.format("%H:%M"),
    )
}

fn ordinal_suffix(day: u32) -> &'static str {
    match day {
        11 | 12 | 13 => "th",
        day if day % 10 == 1 => "st",
        day if day % 10 == 2 => "nd",
        day if day % 10 == 3 => "rd",
        _ => "th",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlayerProfile;
    use chrono::TimeZone;

    fn base_event(event_type: EventType) -> Event {
        Event {
            id: 42,
            player_id: 17,
            game_id: 103,
            event_type,
            amount: 1250,
            currency: "USD".to_string(),
            has_won: false,
            created_at: Utc.with_ymd_and_hms(2024, 4, 7, 13, 5, 0).unwrap(),
            amount_eur: Some(1150),
            description: None,
            player: Some(PlayerProfile {
                email: "jane@example.com".to_string(),
                last_signed_in_at: Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap(),
            }),
        }
    }

    #[test]
    fn test_bet_description() {
        let stage = DescriptionStage::new();
        let mut event = base_event(EventType::Bet);
        event.has_won = true;

        assert_eq!(
            stage.describe(&event),
            "Player #17 (jane@example.com) placed a bet of 12.50 USD (11.50 EUR) \
             on a game \"Roulette Royale\" on April 7th, 2024 at 13:05 UTC. The bet was won."
        );
    }

    #[test]
    fn test_lost_bet_description() {
        let stage = DescriptionStage::new();
        let description = stage.describe(&base_event(EventType::Bet));
        assert!(description.ends_with("The bet was lost."));
    }

    #[test]
    fn test_deposit_description() {
        let stage = DescriptionStage::new();
        assert_eq!(
            stage.describe(&base_event(EventType::Deposit)),
            "Player #17 made a deposit of 12.50 USD on April 7th, 2024 at 13:05 UTC."
        );
    }

    #[test]
    fn test_game_start_description() {
        let stage = DescriptionStage::new();
        assert_eq!(
            stage.describe(&base_event(EventType::GameStart)),
            "Player #17 started playing a game \"Roulette Royale\" on April 7th, 2024 at 13:05 UTC."
        );
    }

    #[test]
    fn test_unknown_game_falls_back() {
        let stage = DescriptionStage::new();
        let mut event = base_event(EventType::GameStop);
        event.game_id = 999;
        assert_eq!(
            stage.describe(&event),
            "Player #17 stopped playing a game \"Unknown Game\" on April 7th, 2024 at 13:05 UTC."
        );
    }

    #[test]
    fn test_unrecognized_type_gets_generic_description() {
        let stage = DescriptionStage::new();
        let event = base_event(EventType::Other("jackpot_spin".to_string()));
        assert_eq!(
            stage.describe(&event),
            "Event ID #42 of type jackpot_spin occurred on April 7th, 2024 at 13:05 UTC."
        );
    }

    #[test]
    fn test_bet_without_player_profile_keeps_flowing() {
        let stage = DescriptionStage::new();
        let mut event = base_event(EventType::Bet);
        event.player = None;
        assert!(stage.describe(&event).starts_with("Player #17 () placed a bet"));
    }

    #[test]
    fn test_ordinal_suffixes() {
        assert_eq!(ordinal_suffix(1), "st");
        assert_eq!(ordinal_suffix(2), "nd");
        assert_eq!(ordinal_suffix(3), "rd");
        assert_eq!(ordinal_suffix(4), "th");
        assert_eq!(ordinal_suffix(11), "th");
        assert_eq!(ordinal_suffix(12), "th");
        assert_eq!(ordinal_suffix(13), "th");
        assert_eq!(ordinal_suffix(21), "st");
        assert_eq!(ordinal_suffix(22), "nd");
        assert_eq!(ordinal_suffix(23), "rd");
        assert_eq!(ordinal_suffix(31), "st");
    }
}
