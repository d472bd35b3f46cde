use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const MESSAGE_COLUMNS: &str =
    "id, sender_id, recipient_id, subject, body, is_read, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Message {
    #[schema(example = 88)]
    pub id: u64,
    #[schema(example = 2)]
    pub sender_id: u64,
    #[schema(example = 12)]
    pub recipient_id: u64,
    #[schema(example = "Shift swap")]
    pub subject: Option<String>,
    #[schema(example = "Please confirm Thursday's evening shift.")]
    pub body: String,
    pub is_read: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
