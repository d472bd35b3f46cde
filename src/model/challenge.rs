use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

#[derive(Debug, sqlx::FromRow)]
pub struct DailyChallenge {
    pub id: u64,
    pub challenge_date: NaiveDate,
    pub question: String,
    pub options: Json<Vec<String>>,
    pub correct_index: u8,
    pub time_limit_seconds: i32,
    pub points: i32,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct TrainingLog {
    #[schema(example = 40)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = 6)]
    pub challenge_id: u64,
    #[schema(value_type = String, format = "date-time")]
    pub started_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub answered_at: Option<DateTime<Utc>>,
    pub selected_index: Option<u8>,
    #[schema(example = "pending")]
    pub outcome: String,
    #[schema(example = 0)]
    pub points_awarded: i32,
}
