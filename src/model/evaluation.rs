use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const EVALUATION_COLUMNS: &str = "id, employee_id, evaluator_id, period, attendance_score, \
     performance_score, behavior_score, teamwork_score, appearance_score, total, grade, notes, created_at";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Evaluation {
    #[schema(example = 4)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = 2)]
    pub evaluator_id: u64,
    #[schema(example = "2026-03")]
    pub period: String,
    #[schema(example = 18)]
    pub attendance_score: u8,
    #[schema(example = 17)]
    pub performance_score: u8,
    #[schema(example = 19)]
    pub behavior_score: u8,
    #[schema(example = 16)]
    pub teamwork_score: u8,
    #[schema(example = 20)]
    pub appearance_score: u8,
    #[schema(example = 90)]
    pub total: u8,
    #[schema(example = "excellent")]
    pub grade: String,
    pub notes: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
