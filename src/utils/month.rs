use chrono::{Datelike, NaiveDate};

/// `YYYY-MM` → first day of that month and first day of the following one.
pub fn month_range(month: &str) -> Option<(NaiveDate, NaiveDate)> {
    if month.len() != 7 {
        return None;
    }
    let first = NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").ok()?;
    let next = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)?
    };
    Some((first, next))
}

pub fn current_month(today: NaiveDate) -> String {
    today.format("%Y-%m").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn december_rolls_into_next_year() {
        let (a, b) = month_range("2025-12").unwrap();
        assert_eq!(a, NaiveDate::from_ymd_opt(2025, 12, 1).unwrap());
        assert_eq!(b, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
    }

    #[test]
    fn rejects_malformed() {
        assert!(month_range("2025-13").is_none());
        assert!(month_range("2025-1").is_none());
        assert!(month_range("").is_none());
    }
}
