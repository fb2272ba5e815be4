//! Core event model shared by every pipeline stage
//!
//! An [`Event`] is generated once and then enriched as it travels through the
//! services: the currency stage fills `amount_eur`, the description stage
//! fills `description`, the player stage fills `player`. Stages only ever
//! append their own field; everything consumed upstream is republished as-is.

pub mod catalog;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Gambling-activity event type.
///
/// The generator only produces the four known variants; anything else read
/// off the broker is carried through verbatim as [`EventType::Other`] so a
/// republished event is byte-for-byte what was consumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    GameStart,
    Bet,
    Deposit,
    GameStop,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::GameStart => "game_start",
            EventType::Bet => "bet",
            EventType::Deposit => "deposit",
            EventType::GameStop => "game_stop",
            EventType::Other(raw) => raw,
        }
    }
}

impl From<&str> for EventType {
    fn from(raw: &str) -> Self {
        match raw {
            "game_start" => EventType::GameStart,
            "bet" => EventType::Bet,
            "deposit" => EventType::Deposit,
            "game_stop" => EventType::GameStop,
            other => EventType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EventType::from(raw.as_str()))
    }
}

/// Player profile attached by the player-enrichment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub email: String,
    pub last_signed_in_at: DateTime<Utc>,
}

/// The unit of work flowing through every stage.
///
/// Monetary amounts are integer minor units (cents); `amount_eur` stays
/// absent until the currency stage has converted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Stream-unique id, monotonic within a single generator instance.
    pub id: i64,
    pub player_id: i64,
    pub game_id: i64,
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Minor units of `currency`, always non-negative.
    pub amount: i64,
    pub currency: String,
    /// Only meaningful for `bet` events.
    #[serde(default)]
    pub has_won: bool,
    pub created_at: DateTime<Utc>,
    /// Minor EUR units, set by the currency stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount_eur: Option<i64>,
    /// Set by the description stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set by the player stage; `None` means the player was not found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerProfile>,
}
