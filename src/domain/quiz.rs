//! Daily challenge grading.

use crate::error::{ApiError, FieldError};
use chrono::{DateTime, Duration, Utc};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum QuizOutcome {
    Pending,
    Win,
    Loss,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Graded {
    pub outcome: QuizOutcome,
    pub points: i32,
    pub late: bool,
}

pub fn deadline(started_at: DateTime<Utc>, time_limit_seconds: i32) -> DateTime<Utc> {
    started_at + Duration::seconds(time_limit_seconds as i64)
}

/// An answer after the deadline is a loss no matter what was chosen.
pub fn grade(
    started_at: DateTime<Utc>,
    answered_at: DateTime<Utc>,
    time_limit_seconds: i32,
    selected_index: u8,
    correct_index: u8,
    points: i32,
) -> Graded {
    let late = answered_at > deadline(started_at, time_limit_seconds);

    if !late && selected_index == correct_index {
        Graded {
            outcome: QuizOutcome::Win,
            points,
            late,
        }
    } else {
        Graded {
            outcome: QuizOutcome::Loss,
            points: 0,
            late,
        }
    }
}

pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 6;

pub fn validate_challenge(
    question: &str,
    options: &[String],
    correct_index: u8,
    time_limit_seconds: i32,
    points: i32,
) -> Result<(), ApiError> {
    let mut errors = Vec::new();

    if question.trim().is_empty() {
        errors.push(FieldError::missing("question"));
    }
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&options.len())
        || options.iter().any(|o| o.trim().is_empty())
    {
        errors.push(FieldError::invalid(
            "options",
            "between 2 and 6 non-empty options are required",
        ));
    } else if correct_index as usize >= options.len() {
        errors.push(FieldError::invalid("correct_index", "must point at one of the options"));
    }
    if !(5..=600).contains(&time_limit_seconds) {
        errors.push(FieldError::invalid(
            "time_limit_seconds",
            "must be between 5 and 600 seconds",
        ));
    }
    if points < 0 {
        errors.push(FieldError::invalid("points", "cannot be negative"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::Validation(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_770_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn correct_in_time_wins_points() {
        let g = grade(at(0), at(12), 30, 2, 2, 10);
        assert_eq!(g.outcome, QuizOutcome::Win);
        assert_eq!(g.points, 10);
        assert!(!g.late);
    }

    #[test]
    fn answering_exactly_at_deadline_still_counts() {
        assert_eq!(grade(at(0), at(30), 30, 1, 1, 10).outcome, QuizOutcome::Win);
    }

    #[test]
    fn late_answer_is_always_a_loss() {
        for selected in 0..4u8 {
            let g = grade(at(0), at(31), 30, selected, 1, 10);
            assert_eq!(g.outcome, QuizOutcome::Loss);
            assert_eq!(g.points, 0);
            assert!(g.late);
        }
    }

    #[test]
    fn wrong_answer_in_time_is_a_loss() {
        let g = grade(at(0), at(5), 30, 0, 1, 10);
        assert_eq!(g.outcome, QuizOutcome::Loss);
        assert!(!g.late);
    }

    #[test]
    fn challenge_validation() {
        let opts = |n: usize| (0..n).map(|i| format!("option {i}")).collect::<Vec<_>>();
        assert!(validate_challenge("Q?", &opts(4), 3, 30, 10).is_ok());
        assert!(validate_challenge("Q?", &opts(1), 0, 30, 10).is_err());
        assert!(validate_challenge("Q?", &opts(3), 3, 30, 10).is_err());
        assert!(validate_challenge("Q?", &opts(3), 0, 2, 10).is_err());
        assert!(validate_challenge(" ", &opts(3), 0, 30, 10).is_err());
    }
}
