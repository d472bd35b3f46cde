use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MATCH_COLUMNS: &str =
    "id, player_x, player_o, board, next_turn, status, winner, created_at, updated_at";

/// Row as stored: `board` is nine chars of `X`, `O` or `-`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LiveMatch {
    #[schema(example = 3)]
    pub id: u64,
    #[schema(example = 12)]
    pub player_x: u64,
    #[schema(example = 15)]
    pub player_o: Option<u64>,
    #[schema(example = "X-O-X----")]
    pub board: String,
    #[schema(example = "O")]
    pub next_turn: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(example = "X")]
    pub winner: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}
