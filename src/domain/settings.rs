//! Typed view over the `general_settings` key/value rows.

use crate::domain::attendance_window::AttendanceSettings;
use chrono::NaiveTime;

pub const WORK_START: &str = "work_start";
pub const WORK_END: &str = "work_end";
pub const LATE_GRACE_MINUTES: &str = "late_grace_minutes";
pub const CHECKIN_OPEN_BEFORE_MINUTES: &str = "checkin_open_before_minutes";
pub const CENTER_NAME: &str = "center_name";

pub const KNOWN_KEYS: &[&str] = &[
    WORK_START,
    WORK_END,
    LATE_GRACE_MINUTES,
    CHECKIN_OPEN_BEFORE_MINUTES,
    CENTER_NAME,
];

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

fn parse_minutes(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().filter(|m| (0..=720).contains(m))
}

/// Check a single value before it is stored.
pub fn validate(key: &str, value: &str) -> Result<(), String> {
    let value = value.trim();
    let ok = match key {
        WORK_START | WORK_END => parse_time(value).is_some(),
        LATE_GRACE_MINUTES | CHECKIN_OPEN_BEFORE_MINUTES => parse_minutes(value).is_some(),
        CENTER_NAME => !value.is_empty() && value.chars().count() <= 200,
        _ => return Err(format!("Unknown setting '{key}'")),
    };

    if ok {
        Ok(())
    } else {
        Err(format!("Invalid value for '{key}'"))
    }
}

/// Overlay stored rows on the configured defaults. Unparsable rows are ignored.
pub fn attendance_from_rows(
    defaults: &AttendanceSettings,
    rows: &[(String, String)],
) -> AttendanceSettings {
    let mut s = defaults.clone();
    for (key, value) in rows {
        let value = value.trim();
        match key.as_str() {
            WORK_START => s.work_start = parse_time(value).unwrap_or(s.work_start),
            WORK_END => s.work_end = parse_time(value).unwrap_or(s.work_end),
            LATE_GRACE_MINUTES => {
                s.late_grace_minutes = parse_minutes(value).unwrap_or(s.late_grace_minutes)
            }
            CHECKIN_OPEN_BEFORE_MINUTES => {
                s.checkin_open_before_minutes =
                    parse_minutes(value).unwrap_or(s.checkin_open_before_minutes)
            }
            _ => {}
        }
    }
    // an inverted window falls back to the configured day shift
    if s.work_end <= s.work_start {
        s.work_start = defaults.work_start;
        s.work_end = defaults.work_end;
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> AttendanceSettings {
        AttendanceSettings {
            work_start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(14, 0, 0).unwrap(),
            late_grace_minutes: 15,
            checkin_open_before_minutes: 60,
        }
    }

    #[test]
    fn rows_override_defaults() {
        let rows = vec![
            (WORK_START.to_string(), "09:00".to_string()),
            (LATE_GRACE_MINUTES.to_string(), "10".to_string()),
            (CENTER_NAME.to_string(), "Al Salam".to_string()),
        ];
        let s = attendance_from_rows(&defaults(), &rows);
        assert_eq!(s.work_start, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(s.late_grace_minutes, 10);
        assert_eq!(s.checkin_open_before_minutes, 60);
    }

    #[test]
    fn inverted_window_is_ignored() {
        let rows = vec![(WORK_START.to_string(), "15:00".to_string())];
        assert_eq!(attendance_from_rows(&defaults(), &rows), defaults());
    }

    #[test]
    fn validation_by_key() {
        assert!(validate(WORK_END, "16:30").is_ok());
        assert!(validate(WORK_END, "25:00").is_err());
        assert!(validate(LATE_GRACE_MINUTES, "-5").is_err());
        assert!(validate(CENTER_NAME, "  ").is_err());
        assert!(validate("theme", "dark").is_err());
    }
}
