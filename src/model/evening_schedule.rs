use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const SCHEDULE_COLUMNS: &str = "id, employee_id, shift_date, shift_start, shift_end, notes";

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct EveningSchedule {
    #[schema(example = 9)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = "2026-03-05", value_type = String, format = "date")]
    pub shift_date: NaiveDate,
    #[schema(example = "16:00:00", value_type = String)]
    pub shift_start: NaiveTime,
    #[schema(example = "22:00:00", value_type = String)]
    pub shift_end: NaiveTime,
    pub notes: Option<String>,
}
