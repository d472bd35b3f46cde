use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, days, reason, \
     substitute_name, status, reviewed_by, reviewed_at, created_at";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = "annual")]
    pub leave_type: String,
    #[schema(example = "2026-04-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-04-07", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    #[schema(example = 3)]
    pub days: i32,
    #[schema(example = "Family matter")]
    pub reason: String,
    pub substitute_name: Option<String>,
    #[schema(example = "pending")]
    pub status: String,
    pub reviewed_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[schema(example = "2026-04-01T09:30:00Z", value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}
