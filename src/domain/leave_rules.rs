//! Leave request validation and balance deduction.

use crate::error::{ApiError, FieldError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Arabic labels from the paper forms are accepted as aliases on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    #[serde(alias = "اعتيادية")]
    #[strum(to_string = "annual", serialize = "اعتيادية")]
    Annual,
    #[serde(alias = "عارضة")]
    #[strum(to_string = "casual", serialize = "عارضة")]
    Casual,
    #[serde(alias = "مرضية")]
    #[strum(to_string = "sick", serialize = "مرضية")]
    Sick,
    #[serde(alias = "بدون أجر")]
    #[strum(to_string = "unpaid", serialize = "بدون أجر")]
    Unpaid,
}

impl LeaveType {
    pub fn arabic_label(self) -> &'static str {
        match self {
            LeaveType::Annual => "اعتيادية",
            LeaveType::Casual => "عارضة",
            LeaveType::Sick => "مرضية",
            LeaveType::Unpaid => "بدون أجر",
        }
    }

    /// Which employee balance column an approval draws from, if any.
    pub fn balance_column(self) -> Option<&'static str> {
        match self {
            LeaveType::Annual => Some("annual_balance"),
            LeaveType::Casual => Some("casual_balance"),
            LeaveType::Sick | LeaveType::Unpaid => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

/// Leave request as submitted from the form; every field may be missing.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "annual")]
    pub leave_type: Option<LeaveType>,
    #[schema(example = "2026-04-05", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-04-07", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = "Family matter")]
    pub reason: Option<String>,
    #[schema(example = "Huda Samir")]
    pub substitute_name: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ValidLeave {
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub reason: String,
    pub substitute_name: Option<String>,
}

/// Inclusive calendar-day count: a one-day leave has start == end.
pub fn inclusive_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days() + 1
}

impl CreateLeave {
    pub fn validate(&self) -> Result<ValidLeave, ApiError> {
        let mut errors = Vec::new();

        if self.leave_type.is_none() {
            errors.push(FieldError::missing("leave_type"));
        }
        if self.start_date.is_none() {
            errors.push(FieldError::missing("start_date"));
        }
        if self.end_date.is_none() {
            errors.push(FieldError::missing("end_date"));
        }
        let reason = self.reason.as_deref().map(str::trim).unwrap_or_default();
        if reason.is_empty() {
            errors.push(FieldError::missing("reason"));
        }

        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if start > end {
                errors.push(FieldError::invalid(
                    "end_date",
                    "end_date cannot be before start_date",
                ));
            }
        }

        if !errors.is_empty() {
            return Err(ApiError::Validation(errors));
        }

        // all present, checked above
        let (Some(leave_type), Some(start_date), Some(end_date)) =
            (self.leave_type, self.start_date, self.end_date)
        else {
            return Err(ApiError::Internal);
        };

        Ok(ValidLeave {
            leave_type,
            start_date,
            end_date,
            days: inclusive_days(start_date, end_date),
            reason: reason.to_string(),
            substitute_name: self
                .substitute_name
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct InsufficientBalance {
    pub available: i64,
    pub requested: i64,
}

/// Remaining balance after taking `days`, refusing to go below zero.
pub fn deduct(balance: i64, days: i64) -> Result<i64, InsufficientBalance> {
    if days > balance {
        Err(InsufficientBalance {
            available: balance,
            requested: days,
        })
    } else {
        Ok(balance - days)
    }
}
