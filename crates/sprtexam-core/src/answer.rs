//! Applying one answer to an attempt.
//!
//! [`apply_answer`] mutates an attempt in place; the engine runs it against a
//! private copy of the aggregate and commits the copy in one write, so a
//! half-applied answer is never visible.

use chrono::{DateTime, Utc};

use crate::attempt::{AnswerRecord, AttemptState};
use crate::error::SprtError;
use crate::model::{AnswerOption, Exam, Question, SprtConfig};
use crate::statistics::log_likelihood_delta;

/// Parse an RFC 3339 timestamp as submitted by a client (`Z` or an explicit
/// offset).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SprtError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(SprtError::Validation(
            "question_shown_at is required".into(),
        ));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SprtError::Validation(format!("invalid timestamp '{raw}': {e}")))
}

/// Timing of one answer relative to the question's allotted time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub shown_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
    /// Whole seconds between showing and answering.
    pub elapsed_secs: u32,
    pub allowed_secs: u32,
    pub violation: bool,
}

/// Compare the elapsed time against `allowed_secs`.
///
/// The violation check uses the exact duration; only the stored elapsed
/// value is truncated to whole seconds.
pub fn check_timing(
    shown_at: DateTime<Utc>,
    answered_at: DateTime<Utc>,
    allowed_secs: u32,
) -> Result<Timing, SprtError> {
    if answered_at < shown_at {
        return Err(SprtError::Validation(format!(
            "question shown at {shown_at} is after the answer time {answered_at}"
        )));
    }
    let elapsed = answered_at - shown_at;
    let violation = elapsed > chrono::Duration::seconds(i64::from(allowed_secs));
    let elapsed_secs = u32::try_from(elapsed.num_seconds()).unwrap_or(u32::MAX);

    Ok(Timing {
        shown_at,
        answered_at,
        elapsed_secs,
        allowed_secs,
        violation,
    })
}

/// What an applied answer changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAnswer {
    pub record: AnswerRecord,
    pub delta: f64,
}

/// Score the answer and fold it into the attempt: counters, statistic,
/// history, a new answer record, and the level-progress record of the
/// question's level.
///
/// A late answer counts as incorrect when the exam enforces time limits,
/// whatever option was chosen.
pub fn apply_answer(
    attempt: &mut AttemptState,
    exam: &Exam,
    config: &SprtConfig,
    question: &Question,
    option: &AnswerOption,
    timing: &Timing,
) -> AppliedAnswer {
    let is_correct = if exam.enforce_time_limits && timing.violation {
        false
    } else {
        option.is_correct
    };

    attempt.total_questions += 1;
    if is_correct {
        attempt.correct_answers += 1;
    } else {
        attempt.incorrect_answers += 1;
    }

    let delta = log_likelihood_delta(config, is_correct);
    attempt.s_index += delta;
    attempt.s_history.push(attempt.s_index);

    let record = AnswerRecord {
        question_number: attempt.total_questions,
        question_id: question.id,
        option_id: option.id,
        level_id: question.level_id,
        is_correct,
        question_shown_at: timing.shown_at,
        answered_at: timing.answered_at,
        time_taken_secs: timing.elapsed_secs,
        allowed_time_secs: timing.allowed_secs,
        time_violation: timing.violation,
        s_index_after: attempt.s_index,
    };
    attempt.answers.push(record.clone());

    attempt
        .progress_entry(question.level_id, timing.answered_at)
        .record(is_correct, delta);
    attempt.last_activity_at = timing.answered_at;

    tracing::debug!(
        attempt_id = %attempt.id,
        question_number = record.question_number,
        is_correct,
        delta,
        s_index = attempt.s_index,
        "answer applied"
    );

    AppliedAnswer { record, delta }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn exam(enforce_time_limits: bool) -> Exam {
        Exam {
            id: "exam".into(),
            title: "Exam".into(),
            description: String::new(),
            max_questions: 20,
            max_attempts: 1,
            enforce_time_limits,
            enable_difficulty_progression: false,
            question_banks: vec![1],
            sprt_config: Some(SprtConfig::default()),
            starts_at: None,
            ends_at: None,
            is_active: true,
            deleted_at: None,
        }
    }

    fn option(id: u64, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id,
            text: format!("option {id}"),
            is_correct,
            feedback: String::new(),
            is_active: true,
            deleted_at: None,
        }
    }

    fn question() -> Question {
        Question {
            id: 7,
            bank_id: 1,
            level_id: 2,
            topic: "ownership".into(),
            statement: "Who drops the value?".into(),
            time_secs: 30,
            options: vec![option(70, true), option(71, false)],
            is_active: true,
            deleted_at: None,
        }
    }

    fn on_time(now: DateTime<Utc>) -> Timing {
        check_timing(now - Duration::seconds(10), now, 30).unwrap()
    }

    #[test]
    fn parses_zulu_and_offset_timestamps() {
        let z = parse_timestamp("2026-03-01T10:00:00Z").unwrap();
        let offset = parse_timestamp("2026-03-01T11:00:00+01:00").unwrap();
        assert_eq!(z, offset);
    }

    #[test]
    fn rejects_malformed_timestamps() {
        for raw in ["", "   ", "yesterday", "2026-03-01 10:00"] {
            let err = parse_timestamp(raw).unwrap_err();
            assert!(matches!(err, SprtError::Validation(_)), "{raw}: {err}");
        }
    }

    #[test]
    fn violation_uses_exact_duration() {
        let now = Utc::now();
        let exact = check_timing(now - Duration::seconds(30), now, 30).unwrap();
        assert!(!exact.violation);
        assert_eq!(exact.elapsed_secs, 30);

        let late = check_timing(now - Duration::milliseconds(30_400), now, 30).unwrap();
        assert!(late.violation);
        assert_eq!(late.elapsed_secs, 30);
    }

    #[test]
    fn shown_after_answer_is_rejected() {
        let now = Utc::now();
        let err = check_timing(now + Duration::seconds(1), now, 30).unwrap_err();
        assert!(matches!(err, SprtError::Validation(_)));
    }

    #[test]
    fn correct_answer_updates_everything() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(2), now);
        let q = question();

        let applied = apply_answer(
            &mut attempt,
            &exam(true),
            &SprtConfig::default(),
            &q,
            &q.options[0],
            &on_time(now),
        );

        assert!(applied.record.is_correct);
        assert!(applied.delta < 0.0);
        assert_eq!(applied.record.question_number, 1);
        assert_eq!(applied.record.level_id, 2);
        assert_eq!(applied.record.time_taken_secs, 10);
        assert_eq!(attempt.total_questions, 1);
        assert_eq!(attempt.correct_answers, 1);
        assert_eq!(attempt.incorrect_answers, 0);
        assert_eq!(attempt.s_history.as_slice(), &[attempt.s_index]);
        assert_eq!(attempt.answers.len(), 1);
        assert_eq!(attempt.last_activity_at, now);

        let progress = attempt.progress_for(2).unwrap();
        assert_eq!(progress.questions_answered, 1);
        assert_eq!(progress.correct_count, 1);
        assert!((progress.s_index - applied.delta).abs() < 1e-12);
    }

    #[test]
    fn late_answer_is_forced_incorrect_when_enforced() {
        let now = Utc::now();
        let late = check_timing(now - Duration::seconds(45), now, 30).unwrap();
        let q = question();

        let mut enforced = AttemptState::new("exam", "ana", 1, Some(2), now);
        let applied = apply_answer(
            &mut enforced,
            &exam(true),
            &SprtConfig::default(),
            &q,
            &q.options[0],
            &late,
        );
        assert!(!applied.record.is_correct);
        assert!(applied.record.time_violation);
        assert!(enforced.s_index > 0.0);

        let mut lenient = AttemptState::new("exam", "ana", 1, Some(2), now);
        let applied = apply_answer(
            &mut lenient,
            &exam(false),
            &SprtConfig::default(),
            &q,
            &q.options[0],
            &late,
        );
        assert!(applied.record.is_correct);
        assert!(applied.record.time_violation);
    }

    #[test]
    fn all_correct_run_decreases_every_step() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(2), now);
        let q = question();
        for _ in 0..5 {
            apply_answer(
                &mut attempt,
                &exam(true),
                &SprtConfig::default(),
                &q,
                &q.options[0],
                &on_time(now),
            );
        }
        let history = attempt.s_history.as_slice();
        assert!(history.windows(2).all(|w| w[1] < w[0]));
        let numbers: Vec<_> = attempt.answers.iter().map(|a| a.question_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(attempt.level_progress.len(), 1);
    }
}
