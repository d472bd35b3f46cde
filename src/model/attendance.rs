use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Attendance {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 12)]
    pub employee_id: u64,
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(example = "08:07:00", value_type = Option<String>)]
    pub check_in: Option<NaiveTime>,
    #[schema(example = "14:02:00", value_type = Option<String>)]
    pub check_out: Option<NaiveTime>,
    #[schema(example = "on_time")]
    pub check_in_status: Option<String>,
    #[schema(example = "complete")]
    pub check_out_status: Option<String>,
    pub late_minutes: i32,
    pub early_leave_minutes: i32,
    pub worked_minutes: i32,
    pub notes: Option<String>,
}

pub const ATTENDANCE_COLUMNS: &str = "id, employee_id, date, check_in, check_out, check_in_status, \
     check_out_status, late_minutes, early_leave_minutes, worked_minutes, notes";
