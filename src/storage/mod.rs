//! Player catalog lookups

use crate::error::Result;
use crate::events::PlayerProfile;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Read-only access to the players table.
pub struct PlayerStore {
    pool: PgPool,
}

impl PlayerStore {
    /// Connect to the catalog database. Failure here is fatal: the player
    /// service must not start without its lookup source.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Fetch a player's profile, `None` when the id is unknown.
    pub async fn find_player(&self, player_id: i64) -> Result<Option<PlayerProfile>> {
        let row = sqlx::query_as::<_, PlayerRow>(
            "SELECT email, last_signed_in_at FROM players WHERE id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PlayerProfile::from))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    email: String,
    last_signed_in_at: chrono::DateTime<chrono::Utc>,
}

impl From<PlayerRow> for PlayerProfile {
    fn from(row: PlayerRow) -> Self {
        PlayerProfile {
            email: row.email,
            last_signed_in_at: row.last_signed_in_at,
        }
    }
}
