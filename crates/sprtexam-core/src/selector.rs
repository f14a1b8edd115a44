//! Next-question selection.
//!
//! Draws uniformly from the unseen, selectable questions at the attempt's
//! current level. When a level is exhausted the attempt may advance to the
//! next one; the retry loop runs at most once per remaining level.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::attempt::AttemptState;
use crate::decision::FinalizeReason;
use crate::model::{DifficultyLevel, Exam, Question, SprtConfig};
use crate::progression;
use crate::traits::QuestionStore;

/// Source of randomness for the question draw.
pub trait QuestionPicker: Send + Sync {
    /// Index of the chosen candidate in `0..candidates`, or `None` when there
    /// are no candidates.
    fn pick(&self, candidates: usize) -> Option<usize>;
}

/// Uniform draw backed by a [`StdRng`].
pub struct RandomPicker {
    rng: Mutex<StdRng>,
}

impl RandomPicker {
    pub fn from_entropy() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible sequence of draws for a given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomPicker {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl QuestionPicker for RandomPicker {
    fn pick(&self, candidates: usize) -> Option<usize> {
        if candidates == 0 {
            return None;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Some(rng.gen_range(0..candidates))
    }
}

/// Outcome of one selection call.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Present this question next.
    Question(Question),
    /// The session must end for this reason.
    Concluded(FinalizeReason),
}

/// Choose the next question for an in-progress attempt.
///
/// May move `attempt.current_level` (initialisation or advancement); the
/// caller persists those changes and finalizes on `Concluded`.
pub async fn select_next(
    attempt: &mut AttemptState,
    exam: &Exam,
    config: &SprtConfig,
    levels: &[DifficultyLevel],
    store: &dyn QuestionStore,
    picker: &dyn QuestionPicker,
    now: DateTime<Utc>,
) -> anyhow::Result<Selection> {
    if attempt.total_questions >= exam.max_questions {
        return Ok(Selection::Concluded(FinalizeReason::MaxQuestionsReached));
    }

    if attempt.current_level.is_none() {
        attempt.current_level = levels.first().map(|l| l.id);
    }
    let Some(mut level) = attempt.current_level else {
        tracing::warn!(attempt_id = %attempt.id, "no difficulty levels defined");
        return Ok(Selection::Concluded(FinalizeReason::NoMoreQuestions));
    };

    let answered = attempt.answered_question_ids();
    let remaining_levels = levels.iter().filter(|l| l.id >= level).count().max(1);

    for _ in 0..remaining_levels {
        let mut candidates: Vec<Question> = store
            .active_questions(&exam.question_banks, level, &answered)
            .await?
            .into_iter()
            .filter(|q| q.is_selectable() && !answered.contains(&q.id))
            .collect();
        // Stable order so a seeded picker reproduces the same draws.
        candidates.sort_by_key(|q| q.id);

        if let Some(idx) = picker.pick(candidates.len()) {
            tracing::debug!(
                attempt_id = %attempt.id,
                level,
                candidates = candidates.len(),
                "selected question"
            );
            return Ok(Selection::Question(candidates.swap_remove(idx)));
        }

        match progression::try_advance(attempt, levels, config, now) {
            Some(next) => level = next,
            None => break,
        }
    }

    Ok(Selection::Concluded(FinalizeReason::NoMoreQuestions))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;

    use super::*;
    use crate::model::{AnswerOption, BankId, LevelId, QuestionId};

    struct VecStore(Vec<Question>);

    #[async_trait]
    impl QuestionStore for VecStore {
        async fn question(&self, id: QuestionId) -> anyhow::Result<Option<Question>> {
            Ok(self.0.iter().find(|q| q.id == id).cloned())
        }

        async fn active_questions(
            &self,
            banks: &[BankId],
            level: LevelId,
            exclude: &HashSet<QuestionId>,
        ) -> anyhow::Result<Vec<Question>> {
            Ok(self
                .0
                .iter()
                .filter(|q| banks.contains(&q.bank_id) && q.level_id == level)
                .filter(|q| q.is_selectable() && !exclude.contains(&q.id))
                .cloned()
                .collect())
        }
    }

    /// Always takes the first candidate.
    struct FirstPicker;

    impl QuestionPicker for FirstPicker {
        fn pick(&self, candidates: usize) -> Option<usize> {
            (candidates > 0).then_some(0)
        }
    }

    fn question(id: QuestionId, level_id: LevelId, is_active: bool) -> Question {
        Question {
            id,
            bank_id: 1,
            level_id,
            topic: String::new(),
            statement: format!("q{id}"),
            time_secs: 30,
            options: vec![AnswerOption {
                id: id * 10,
                text: "a".into(),
                is_correct: true,
                feedback: String::new(),
                is_active: true,
                deleted_at: None,
            }],
            is_active,
            deleted_at: None,
        }
    }

    fn levels() -> Vec<DifficultyLevel> {
        [(1, "basic"), (2, "advanced")]
            .into_iter()
            .map(|(id, name)| DifficultyLevel {
                id,
                name: name.into(),
                description: String::new(),
                deleted_at: None,
            })
            .collect()
    }

    fn exam(max_questions: u32) -> Exam {
        Exam {
            id: "exam".into(),
            title: "Exam".into(),
            description: String::new(),
            max_questions,
            max_attempts: 1,
            enforce_time_limits: true,
            enable_difficulty_progression: true,
            question_banks: vec![1],
            sprt_config: Some(SprtConfig::default()),
            starts_at: None,
            ends_at: None,
            is_active: true,
            deleted_at: None,
        }
    }

    fn answered(attempt: &mut AttemptState, question_id: QuestionId, level: LevelId, correct: bool) {
        let now = attempt.started_at;
        attempt.total_questions += 1;
        attempt.answers.push(crate::attempt::AnswerRecord {
            question_number: attempt.total_questions,
            question_id,
            option_id: question_id * 10,
            level_id: level,
            is_correct: correct,
            question_shown_at: now,
            answered_at: now,
            time_taken_secs: 1,
            allowed_time_secs: 30,
            time_violation: false,
            s_index_after: 0.0,
        });
        attempt.progress_entry(level, now).record(correct, 0.0);
    }

    #[tokio::test]
    async fn initialises_level_and_skips_inactive_and_answered() {
        let store = VecStore(vec![question(1, 1, false), question(2, 1, true), question(3, 1, true)]);
        let mut attempt = AttemptState::new("exam", "ana", 1, None, Utc::now());
        answered(&mut attempt, 2, 1, true);

        let selection = select_next(
            &mut attempt,
            &exam(10),
            &SprtConfig::default(),
            &levels(),
            &store,
            &FirstPicker,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(attempt.current_level, Some(1));
        match selection {
            Selection::Question(q) => assert_eq!(q.id, 3),
            other => panic!("expected a question, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn ceiling_concludes_before_drawing() {
        let store = VecStore(vec![question(1, 1, true)]);
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), Utc::now());
        answered(&mut attempt, 9, 1, true);

        let selection = select_next(
            &mut attempt,
            &exam(1),
            &SprtConfig::default(),
            &levels(),
            &store,
            &FirstPicker,
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(selection, Selection::Concluded(FinalizeReason::MaxQuestionsReached));
    }

    #[tokio::test]
    async fn exhausted_level_advances_when_eligible() {
        let store = VecStore(vec![
            question(1, 1, true),
            question(2, 1, true),
            question(3, 1, true),
            question(4, 2, true),
        ]);
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), Utc::now());
        for id in 1..=3 {
            answered(&mut attempt, id, 1, true);
        }

        let selection = select_next(
            &mut attempt,
            &exam(10),
            &SprtConfig::default(),
            &levels(),
            &store,
            &FirstPicker,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(attempt.current_level, Some(2));
        assert!(attempt.progress_for(1).unwrap().advanced);
        assert!(matches!(selection, Selection::Question(q) if q.id == 4));
    }

    #[tokio::test]
    async fn exhausted_level_concludes_when_not_eligible() {
        let store = VecStore(vec![
            question(1, 1, true),
            question(2, 1, true),
            question(3, 1, true),
            question(4, 2, true),
        ]);
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), Utc::now());
        answered(&mut attempt, 1, 1, true);
        answered(&mut attempt, 2, 1, false);
        answered(&mut attempt, 3, 1, true);

        let selection = select_next(
            &mut attempt,
            &exam(10),
            &SprtConfig::default(),
            &levels(),
            &store,
            &FirstPicker,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(selection, Selection::Concluded(FinalizeReason::NoMoreQuestions));
        assert_eq!(attempt.current_level, Some(1));
    }

    #[tokio::test]
    async fn empty_final_level_concludes_after_advancing() {
        let store = VecStore(vec![question(1, 1, true), question(2, 1, true), question(3, 1, true)]);
        let mut attempt = AttemptState::new("exam", "ana", 1, Some(1), Utc::now());
        for id in 1..=3 {
            answered(&mut attempt, id, 1, true);
        }

        let selection = select_next(
            &mut attempt,
            &exam(10),
            &SprtConfig::default(),
            &levels(),
            &store,
            &FirstPicker,
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(selection, Selection::Concluded(FinalizeReason::NoMoreQuestions));
        assert_eq!(attempt.current_level, Some(2));
    }

    #[test]
    fn empty_candidates_pick_nothing() {
        let picker = RandomPicker::seeded(7);
        assert_eq!(picker.pick(0), None);
    }

    #[test]
    fn picks_stay_in_range() {
        let picker = RandomPicker::from_entropy();
        for n in 1..50 {
            let idx = picker.pick(n).unwrap();
            assert!(idx < n);
        }
    }

    #[test]
    fn seeded_pickers_repeat() {
        let a = RandomPicker::seeded(42);
        let b = RandomPicker::seeded(42);
        let draws_a: Vec<_> = (0..20).map(|_| a.pick(10)).collect();
        let draws_b: Vec<_> = (0..20).map(|_| b.pick(10)).collect();
        assert_eq!(draws_a, draws_b);
    }
}
