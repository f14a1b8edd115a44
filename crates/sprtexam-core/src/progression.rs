//! Difficulty-level progression.
//!
//! Levels are walked forward one at a time in `id` order; an attempt never
//! moves back and never skips a level.

use chrono::{DateTime, Utc};

use crate::attempt::{AttemptState, LevelProgressRecord};
use crate::model::{DifficultyLevel, LevelId, SprtConfig};

/// Enough answers at the level, and a high enough share of them correct.
pub fn should_advance(progress: &LevelProgressRecord, config: &SprtConfig) -> bool {
    if progress.questions_answered < config.min_questions_per_level {
        return false;
    }
    let ratio = progress.correct_count as f64 / progress.questions_answered as f64;
    ratio >= config.success_threshold_to_advance
}

/// The level following `current` in `levels` (ascending by id, tombstoned
/// levels already removed). `None` at the last level or if `current` is
/// unknown.
pub fn next_level(levels: &[DifficultyLevel], current: LevelId) -> Option<LevelId> {
    let idx = levels.iter().position(|l| l.id == current)?;
    levels.get(idx + 1).map(|l| l.id)
}

/// Advance the attempt past its current level if the level's record is
/// eligible and a next level exists. Marks the record completed and advanced
/// and returns the new level; otherwise leaves the attempt untouched.
pub fn try_advance(
    attempt: &mut AttemptState,
    levels: &[DifficultyLevel],
    config: &SprtConfig,
    now: DateTime<Utc>,
) -> Option<LevelId> {
    let current = attempt.current_level?;
    let eligible = attempt
        .progress_for(current)
        .is_some_and(|p| should_advance(p, config));
    if !eligible {
        return None;
    }
    let next = next_level(levels, current)?;

    if let Some(progress) = attempt.progress_for_mut(current) {
        progress.is_completed = true;
        progress.advanced = true;
        progress.completed_at = Some(now);
    }
    attempt.current_level = Some(next);
    tracing::info!(
        attempt_id = %attempt.id,
        from = current,
        to = next,
        "advanced difficulty level"
    );
    Some(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels() -> Vec<DifficultyLevel> {
        [(1, "basic"), (2, "intermediate"), (5, "advanced")]
            .into_iter()
            .map(|(id, name)| DifficultyLevel {
                id,
                name: name.into(),
                description: String::new(),
                deleted_at: None,
            })
            .collect()
    }

    fn config() -> SprtConfig {
        SprtConfig {
            min_questions_per_level: 3,
            success_threshold_to_advance: 0.70,
            ..Default::default()
        }
    }

    fn record(answered: u32, correct: u32) -> LevelProgressRecord {
        let mut progress = LevelProgressRecord::new(1, Utc::now());
        for i in 0..answered {
            progress.record(i < correct, 0.0);
        }
        progress
    }

    #[test]
    fn two_of_three_does_not_advance() {
        assert!(!should_advance(&record(3, 2), &config()));
    }

    #[test]
    fn three_of_three_advances() {
        assert!(should_advance(&record(3, 3), &config()));
    }

    #[test]
    fn minimum_question_count_is_required() {
        assert!(!should_advance(&record(2, 2), &config()));
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(should_advance(&record(10, 7), &config()));
        assert!(!should_advance(&record(10, 6), &config()));
    }

    #[test]
    fn next_level_follows_order() {
        let levels = levels();
        assert_eq!(next_level(&levels, 1), Some(2));
        assert_eq!(next_level(&levels, 2), Some(5));
        assert_eq!(next_level(&levels, 5), None);
        assert_eq!(next_level(&levels, 3), None);
    }

    #[test]
    fn try_advance_marks_record_and_moves_pointer() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), now);
        for _ in 0..3 {
            attempt.progress_entry(1, now).record(true, -0.4);
        }

        assert_eq!(try_advance(&mut attempt, &levels(), &config(), now), Some(2));
        assert_eq!(attempt.current_level, Some(2));
        let progress = attempt.progress_for(1).unwrap();
        assert!(progress.is_completed);
        assert!(progress.advanced);
        assert_eq!(progress.completed_at, Some(now));
    }

    #[test]
    fn try_advance_is_noop_when_ineligible() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), now);
        attempt.progress_entry(1, now).record(true, -0.4);
        attempt.progress_entry(1, now).record(false, 0.4);
        attempt.progress_entry(1, now).record(true, -0.4);

        assert_eq!(try_advance(&mut attempt, &levels(), &config(), now), None);
        assert_eq!(attempt.current_level, Some(1));
        assert!(!attempt.progress_for(1).unwrap().advanced);
    }

    #[test]
    fn try_advance_stays_on_last_level() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(5), now);
        for _ in 0..3 {
            attempt.progress_entry(5, now).record(true, -0.4);
        }

        assert_eq!(try_advance(&mut attempt, &levels(), &config(), now), None);
        assert_eq!(attempt.current_level, Some(5));
        assert!(!attempt.progress_for(5).unwrap().is_completed);
    }

    #[test]
    fn try_advance_without_record_is_noop() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), now);
        assert_eq!(try_advance(&mut attempt, &levels(), &config(), now), None);
    }
}
