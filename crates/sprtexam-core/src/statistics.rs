//! Log-likelihood increments, accuracy, and post-session analysis.
//!
//! The per-answer increment is the log ratio of the answer's likelihood under
//! the incompetence hypothesis (`p1`) to its likelihood under the competence
//! hypothesis (`p0`): correct answers push the statistic down, incorrect ones
//! push it up.

use std::collections::HashMap;

use crate::attempt::{ConsistencyFeedback, LevelAnalysis, LevelProgressRecord, LevelSnapshot};
use crate::model::{DifficultyLevel, SprtConfig};

/// Increment applied to the statistic for one answer.
///
/// With `p0' = p0/100`, `p1' = p1/100`:
/// - correct: `ln(p1' / p0')`
/// - incorrect: `ln((1 - p1') / (1 - p0'))`
pub fn log_likelihood_delta(config: &SprtConfig, is_correct: bool) -> f64 {
    let p0 = config.p0 / 100.0;
    let p1 = config.p1 / 100.0;
    if is_correct {
        (p1 / p0).ln()
    } else {
        ((1.0 - p1) / (1.0 - p0)).ln()
    }
}

/// `correct / total` as a percentage, 0 when `total` is 0.
pub fn accuracy_percent(correct: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

/// Round half away from zero to `digits` decimals.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Classify the trend of a chronological statistic history.
///
/// Counts step-to-step decreases and increases; with
/// `threshold = len / 2` (floor), decreases reaching the threshold are
/// `Positive`, otherwise increases reaching it are `Negative`, otherwise
/// `Inconsistent`. Fewer than three entries is `InsufficientData`.
pub fn classify_consistency(history: &[f64]) -> ConsistencyFeedback {
    if history.len() < 3 {
        return ConsistencyFeedback::InsufficientData;
    }

    let (mut decreasing, mut increasing) = (0usize, 0usize);
    for pair in history.windows(2) {
        if pair[1] < pair[0] {
            decreasing += 1;
        } else if pair[1] > pair[0] {
            increasing += 1;
        }
    }

    let threshold = history.len() / 2;
    if decreasing >= threshold {
        ConsistencyFeedback::Positive
    } else if increasing >= threshold {
        ConsistencyFeedback::Negative
    } else {
        ConsistencyFeedback::Inconsistent
    }
}

/// One snapshot per progress record, keyed by level name.
///
/// Levels missing from `levels` (for instance tombstoned after the attempt
/// started) are keyed as `level-<id>`.
pub fn analyze_levels(
    progress: &[LevelProgressRecord],
    levels: &[DifficultyLevel],
) -> LevelAnalysis {
    let names: HashMap<_, _> = levels.iter().map(|l| (l.id, l.name.as_str())).collect();

    let mut analysis = LevelAnalysis::default();
    for record in progress {
        let name = names
            .get(&record.level_id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("level-{}", record.level_id));
        analysis.levels.insert(
            name,
            LevelSnapshot {
                level_id: record.level_id,
                questions_answered: record.questions_answered,
                correct: record.correct_count,
                incorrect: record.incorrect_count,
                accuracy: record.accuracy(),
                s_index: record.s_index,
                completed: record.is_completed,
                advanced: record.advanced,
            },
        );
    }
    analysis
}
