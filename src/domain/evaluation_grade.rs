use crate::error::{ApiError, FieldError};
use serde::Serialize;
use strum::Display;

pub const MAX_CRITERION_SCORE: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Grade {
    Excellent,
    VeryGood,
    Good,
    Acceptable,
    Weak,
}

impl Grade {
    pub fn from_total(total: u8) -> Self {
        match total {
            90.. => Grade::Excellent,
            80..=89 => Grade::VeryGood,
            65..=79 => Grade::Good,
            50..=64 => Grade::Acceptable,
            _ => Grade::Weak,
        }
    }

    pub fn arabic_label(self) -> &'static str {
        match self {
            Grade::Excellent => "ممتاز",
            Grade::VeryGood => "جيد جداً",
            Grade::Good => "جيد",
            Grade::Acceptable => "مقبول",
            Grade::Weak => "ضعيف",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scores {
    pub attendance: u8,
    pub performance: u8,
    pub behavior: u8,
    pub teamwork: u8,
    pub appearance: u8,
}

impl Scores {
    pub fn validate(&self) -> Result<(), ApiError> {
        let named = [
            ("attendance", self.attendance),
            ("performance", self.performance),
            ("behavior", self.behavior),
            ("teamwork", self.teamwork),
            ("appearance", self.appearance),
        ];
        let errors: Vec<FieldError> = named
            .iter()
            .filter(|(_, v)| *v > MAX_CRITERION_SCORE)
            .map(|(name, _)| FieldError::invalid(*name, "score must be between 0 and 20"))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(errors))
        }
    }

    pub fn total(&self) -> u8 {
        self.attendance + self.performance + self.behavior + self.teamwork + self.appearance
    }
}

/// `YYYY-MM` evaluation period.
pub fn valid_period(period: &str) -> bool {
    crate::utils::month::month_range(period).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_boundaries() {
        assert_eq!(Grade::from_total(100), Grade::Excellent);
        assert_eq!(Grade::from_total(90), Grade::Excellent);
        assert_eq!(Grade::from_total(89), Grade::VeryGood);
        assert_eq!(Grade::from_total(65), Grade::Good);
        assert_eq!(Grade::from_total(64), Grade::Acceptable);
        assert_eq!(Grade::from_total(49), Grade::Weak);
        assert_eq!(Grade::VeryGood.to_string(), "very_good");
    }

    #[test]
    fn scores_over_twenty_are_rejected() {
        let s = Scores {
            attendance: 20,
            performance: 21,
            behavior: 10,
            teamwork: 10,
            appearance: 30,
        };
        match s.validate().unwrap_err() {
            ApiError::Validation(f) => {
                let names: Vec<_> = f.iter().map(|e| e.field).collect();
                assert_eq!(names, vec!["performance", "appearance"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn total_of_full_marks_is_one_hundred() {
        let s = Scores {
            attendance: 20,
            performance: 20,
            behavior: 20,
            teamwork: 20,
            appearance: 20,
        };
        assert!(s.validate().is_ok());
        assert_eq!(s.total(), 100);
    }

    #[test]
    fn period_format() {
        assert!(valid_period("2026-03"));
        assert!(!valid_period("2026-13"));
        assert!(!valid_period("2026-3"));
        assert!(!valid_period("March"));
    }
}
