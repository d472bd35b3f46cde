//! Check-in/check-out classification against the shift in force for a day.

use crate::model::attendance::Attendance;
use chrono::{NaiveTime, Timelike};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use strum::Display as StrumDisplay;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSettings {
    #[schema(value_type = String, example = "08:00:00")]
    pub work_start: NaiveTime,
    #[schema(value_type = String, example = "14:00:00")]
    pub work_end: NaiveTime,
    pub late_grace_minutes: i64,
    pub checkin_open_before_minutes: i64,
}

impl AttendanceSettings {
    pub fn day_shift(&self) -> Shift {
        Shift {
            start: self.work_start,
            end: self.work_end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shift {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum CheckInStatus {
    OnTime,
    Late,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum CheckOutStatus {
    EarlyLeave,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckIn {
    pub status: CheckInStatus,
    pub late_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOut {
    pub status: CheckOutStatus,
    pub early_leave_minutes: i64,
    pub worked_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum WindowError {
    #[display(fmt = "outside check-in window: opens at {}", opens_at)]
    TooEarly { opens_at: NaiveTime },
    #[display(fmt = "outside check-in window: shift ended at {}", ended_at)]
    ShiftOver { ended_at: NaiveTime },
    #[display(fmt = "check-out cannot be before check-in")]
    BeforeCheckIn,
}

fn minutes(t: NaiveTime) -> i64 {
    (t.num_seconds_from_midnight() / 60) as i64
}

pub fn classify_check_in(
    at: NaiveTime,
    shift: Shift,
    settings: &AttendanceSettings,
) -> Result<CheckIn, WindowError> {
    let now = minutes(at);
    let start = minutes(shift.start);
    let end = minutes(shift.end);

    if now < start - settings.checkin_open_before_minutes {
        let opens_at = shift.start
            - chrono::Duration::minutes(settings.checkin_open_before_minutes.min(start));
        return Err(WindowError::TooEarly { opens_at });
    }
    if now > end {
        return Err(WindowError::ShiftOver { ended_at: shift.end });
    }

    if now <= start + settings.late_grace_minutes {
        Ok(CheckIn {
            status: CheckInStatus::OnTime,
            late_minutes: 0,
        })
    } else {
        Ok(CheckIn {
            status: CheckInStatus::Late,
            late_minutes: now - start,
        })
    }
}

pub fn classify_check_out(
    check_in: NaiveTime,
    at: NaiveTime,
    shift: Shift,
) -> Result<CheckOut, WindowError> {
    let now = minutes(at);
    let came = minutes(check_in);
    let end = minutes(shift.end);

    if now < came {
        return Err(WindowError::BeforeCheckIn);
    }

    let (status, early_leave_minutes) = if now < end {
        (CheckOutStatus::EarlyLeave, end - now)
    } else {
        (CheckOutStatus::Complete, 0)
    };

    Ok(CheckOut {
        status,
        early_leave_minutes,
        worked_minutes: now - came,
    })
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimesheetSummary {
    pub days_present: u32,
    pub late_days: u32,
    pub total_late_minutes: i64,
    pub early_leaves: u32,
    pub missing_check_outs: u32,
    pub worked_minutes: i64,
}

pub fn summarize(records: &[Attendance]) -> TimesheetSummary {
    let late = CheckInStatus::Late.to_string();
    let early = CheckOutStatus::EarlyLeave.to_string();

    records
        .iter()
        .filter(|r| r.check_in.is_some())
        .fold(TimesheetSummary::default(), |mut s, r| {
            s.days_present += 1;
            if r.check_in_status.as_deref() == Some(late.as_str()) {
                s.late_days += 1;
            }
            s.total_late_minutes += r.late_minutes as i64;
            if r.check_out_status.as_deref() == Some(early.as_str()) {
                s.early_leaves += 1;
            }
            if r.check_out.is_none() {
                s.missing_check_outs += 1;
            }
            s.worked_minutes += r.worked_minutes as i64;
            s
        })
}
