//! Per-answer results and end-of-session summaries, with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answer::AppliedAnswer;
use crate::attempt::{
    AnswerRecord, AttemptState, AttemptStatus, ConsistencyFeedback, LevelAnalysis,
    LevelProgressRecord, SIndexHistory,
};
use crate::boundary::Boundaries;
use crate::decision::Verdict;
use crate::model::{
    AnswerOption, DifficultyLevel, Exam, LevelId, OptionId, Question, QuestionId, SprtConfig,
};
use crate::statistics::{analyze_levels, classify_consistency, round_to};

/// Decimal places used when the statistic is shown to a person.
pub const S_INDEX_DIGITS: u32 = 4;
/// Decimal places used for accuracy percentages.
pub const ACCURACY_DIGITS: u32 = 2;

/// Explanation attached to one answer option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionFeedback {
    pub option_id: OptionId,
    pub text: String,
    pub feedback: String,
}

impl From<&AnswerOption> for OptionFeedback {
    fn from(option: &AnswerOption) -> Self {
        Self {
            option_id: option.id,
            text: option.text.clone(),
            feedback: option.feedback.clone(),
        }
    }
}

/// Result returned to the host after each answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub attempt_id: Uuid,
    pub question_number: u32,
    pub question_id: QuestionId,
    pub option_id: OptionId,
    pub is_correct: bool,
    pub time_violation: bool,
    pub time_taken_secs: u32,
    /// Feedback text of the chosen option.
    pub feedback: String,
    /// Feedback of the question's other selectable options.
    pub other_options: Vec<OptionFeedback>,
    /// Unrounded increment applied by this answer.
    pub delta: f64,
    /// Statistic after this answer, rounded for display.
    pub s_index: f64,
    pub verdict: Verdict,
    /// Persisted status after this answer; terminal when the verdict is.
    pub status: AttemptStatus,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Percentage, rounded for display.
    pub accuracy: f64,
    pub current_level: Option<LevelId>,
}

impl AnswerOutcome {
    pub fn new(
        attempt: &AttemptState,
        applied: &AppliedAnswer,
        question: &Question,
        option: &AnswerOption,
        verdict: Verdict,
    ) -> Self {
        Self {
            attempt_id: attempt.id,
            question_number: applied.record.question_number,
            question_id: question.id,
            option_id: option.id,
            is_correct: applied.record.is_correct,
            time_violation: applied.record.time_violation,
            time_taken_secs: applied.record.time_taken_secs,
            feedback: option.feedback.clone(),
            other_options: question
                .other_options(option.id)
                .map(OptionFeedback::from)
                .collect(),
            delta: applied.delta,
            s_index: round_to(attempt.s_index, S_INDEX_DIGITS),
            verdict,
            status: attempt.status,
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
            accuracy: round_to(attempt.accuracy(), ACCURACY_DIGITS),
            current_level: attempt.current_level,
        }
    }
}

/// One point of the statistic chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub question_number: u32,
    pub s_index: f64,
}

/// Time spent across the session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeAnalysis {
    /// Sum of per-answer elapsed seconds.
    pub total_secs: u64,
    /// Average elapsed seconds per answer, 0 without answers.
    pub avg_secs: f64,
    pub violations: u32,
}

impl TimeAnalysis {
    pub fn from_answers(answers: &[AnswerRecord]) -> Self {
        let total_secs: u64 = answers.iter().map(|a| u64::from(a.time_taken_secs)).sum();
        let violations = answers.iter().filter(|a| a.time_violation).count() as u32;
        let avg_secs = if answers.is_empty() {
            0.0
        } else {
            round_to(total_secs as f64 / answers.len() as f64, ACCURACY_DIGITS)
        };
        Self {
            total_secs,
            avg_secs,
            violations,
        }
    }
}

/// Everything a host needs to render or export a finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub attempt_id: Uuid,
    pub exam_id: String,
    pub exam_title: String,
    pub student_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    pub consistency: ConsistencyFeedback,
    pub level_analysis: LevelAnalysis,
    /// Decision thresholds, rounded for display.
    pub boundaries: Boundaries,
    pub sprt_config: SprtConfig,
    /// Final statistic, rounded for display.
    pub s_index: f64,
    pub s_history: SIndexHistory,
    pub chart: Vec<ChartPoint>,
    pub answers: Vec<AnswerRecord>,
    /// Progress records in level order.
    pub level_progress: Vec<LevelProgressRecord>,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    pub accuracy: f64,
    pub time: TimeAnalysis,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

impl SessionSummary {
    /// Assemble the summary of `attempt`, stamped `created_at = now`.
    ///
    /// Consistency and level analysis come from the values stored at
    /// finalization; an attempt that never went through finalization (for
    /// instance an abandoned one) has them derived on the spot.
    pub fn build(
        attempt: &AttemptState,
        exam: &Exam,
        config: &SprtConfig,
        levels: &[DifficultyLevel],
        now: DateTime<Utc>,
    ) -> Self {
        let consistency = attempt
            .consistency
            .unwrap_or_else(|| classify_consistency(attempt.s_history.as_slice()));
        let level_analysis = attempt
            .level_analysis
            .clone()
            .unwrap_or_else(|| analyze_levels(&attempt.level_progress, levels));

        let chart = attempt
            .answers
            .iter()
            .map(|a| ChartPoint {
                question_number: a.question_number,
                s_index: round_to(a.s_index_after, S_INDEX_DIGITS),
            })
            .collect();

        let mut level_progress = attempt.level_progress.clone();
        level_progress.sort_by_key(|p| {
            let rank = levels
                .iter()
                .position(|l| l.id == p.level_id)
                .unwrap_or(usize::MAX);
            (rank, p.level_id)
        });

        Self {
            id: Uuid::new_v4(),
            created_at: now,
            attempt_id: attempt.id,
            exam_id: exam.id.clone(),
            exam_title: exam.title.clone(),
            student_id: attempt.student_id.clone(),
            attempt_number: attempt.attempt_number,
            status: attempt.status,
            consistency,
            level_analysis,
            boundaries: config.boundaries().rounded(S_INDEX_DIGITS),
            sprt_config: *config,
            s_index: round_to(attempt.s_index, S_INDEX_DIGITS),
            s_history: attempt.s_history.clone(),
            chart,
            answers: attempt.answers.clone(),
            level_progress,
            total_questions: attempt.total_questions,
            correct_answers: attempt.correct_answers,
            incorrect_answers: attempt.incorrect_answers,
            accuracy: round_to(attempt.accuracy(), ACCURACY_DIGITS),
            time: TimeAnalysis::from_answers(&attempt.answers),
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            duration_secs: attempt.duration().map(|d| d.num_seconds()),
        }
    }

    /// Save the summary as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize summary")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write summary to {}", path.display()))?;
        Ok(())
    }

    /// Load a summary from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read summary from {}", path.display()))?;
        let summary: SessionSummary =
            serde_json::from_str(&content).context("failed to parse summary JSON")?;
        Ok(summary)
    }

    /// Format the summary as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## {} ({})\n\n", self.exam_title, self.exam_id));
        md.push_str(&format!(
            "**Student:** {} (attempt {})  \n**Status:** {}  \n**Consistency:** {}\n\n",
            self.student_id, self.attempt_number, self.status, self.consistency
        ));
        md.push_str(&format!(
            "**Answers:** {} ({} correct, {} incorrect, {:.2}%)  \n",
            self.total_questions, self.correct_answers, self.incorrect_answers, self.accuracy
        ));
        md.push_str(&format!(
            "**S-index:** {:.4} (limits {:.4} / {:.4})  \n",
            self.s_index, self.boundaries.lower, self.boundaries.upper
        ));
        md.push_str(&format!(
            "**Time:** {}s total, {:.2}s average, {} violations\n\n",
            self.time.total_secs, self.time.avg_secs, self.time.violations
        ));

        if !self.level_analysis.levels.is_empty() {
            md.push_str("### Levels\n\n");
            md.push_str("| Level | Answered | Correct | Accuracy | S-index | Advanced |\n");
            md.push_str("|-------|----------|---------|----------|---------|----------|\n");
            for (name, snap) in &self.level_analysis.levels {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.1}% | {:.4} | {} |\n",
                    name,
                    snap.questions_answered,
                    snap.correct,
                    snap.accuracy,
                    snap.s_index,
                    if snap.advanced { "yes" } else { "no" }
                ));
            }
            md.push('\n');
        }

        if !self.answers.is_empty() {
            md.push_str("### Answers\n\n");
            md.push_str("| # | Question | Correct | Time | S-index |\n");
            md.push_str("|---|----------|---------|------|---------|\n");
            for a in &self.answers {
                let late = if a.time_violation { " (late)" } else { "" };
                md.push_str(&format!(
                    "| {} | {} | {} | {}s / {}s{} | {:.4} |\n",
                    a.question_number,
                    a.question_id,
                    if a.is_correct { "yes" } else { "no" },
                    a.time_taken_secs,
                    a.allowed_time_secs,
                    late,
                    a.s_index_after
                ));
            }
        }

        md
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::answer::{apply_answer, check_timing};

    fn option(id: u64, is_correct: bool, is_active: bool) -> AnswerOption {
        AnswerOption {
            id,
            text: format!("option {id}"),
            is_correct,
            feedback: format!("feedback {id}"),
            is_active,
            deleted_at: None,
        }
    }

    fn question(id: u64, level_id: u64) -> Question {
        Question {
            id,
            bank_id: 1,
            level_id,
            topic: String::new(),
            statement: format!("q{id}"),
            time_secs: 20,
            options: vec![
                option(id * 10, true, true),
                option(id * 10 + 1, false, true),
                option(id * 10 + 2, false, false),
            ],
            is_active: true,
            deleted_at: None,
        }
    }

    fn exam() -> Exam {
        Exam {
            id: "rust-101".into(),
            title: "Rust 101".into(),
            description: String::new(),
            max_questions: 20,
            max_attempts: 2,
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

    /// Two answers at level 2 then one at level 1, one of them late.
    fn played() -> AttemptState {
        let now = Utc::now();
        let mut attempt = AttemptState::new("rust-101", "ana", 1, Some(1), now);
        let config = SprtConfig::default();
        for (qid, level, elapsed, pick) in [(1, 2, 5, 10), (2, 2, 25, 20), (3, 1, 9, 31)] {
            let q = question(qid, level);
            let timing = check_timing(now - Duration::seconds(elapsed), now, q.time_secs).unwrap();
            let chosen = q.options.iter().find(|o| o.id == pick).unwrap().clone();
            apply_answer(&mut attempt, &exam(), &config, &q, &chosen, &timing);
        }
        attempt
    }

    #[test]
    fn outcome_carries_other_active_feedback() {
        let now = Utc::now();
        let mut attempt = AttemptState::new("rust-101", "ana", 1, Some(1), now);
        let q = question(4, 1);
        let timing = check_timing(now - Duration::seconds(3), now, 20).unwrap();
        let applied = apply_answer(
            &mut attempt,
            &exam(),
            &SprtConfig::default(),
            &q,
            &q.options[0],
            &timing,
        );

        let outcome = AnswerOutcome::new(&attempt, &applied, &q, &q.options[0], Verdict::Continue);
        assert_eq!(outcome.feedback, "feedback 40");
        assert_eq!(outcome.other_options.len(), 1);
        assert_eq!(outcome.other_options[0].option_id, 41);
        assert_eq!(outcome.s_index, -0.4055);
        assert_eq!(outcome.accuracy, 100.0);
        assert_eq!(outcome.question_number, 1);
    }

    #[test]
    fn summary_orders_levels_and_counts_time() {
        let attempt = played();
        let built_at = attempt.started_at + Duration::hours(1);
        let summary =
            SessionSummary::build(&attempt, &exam(), &SprtConfig::default(), &levels(), built_at);

        assert_eq!(summary.created_at, built_at);
        let order: Vec<_> = summary.level_progress.iter().map(|p| p.level_id).collect();
        assert_eq!(order, vec![1, 2]);
        assert_eq!(summary.time.total_secs, 39);
        assert_eq!(summary.time.avg_secs, 13.0);
        assert_eq!(summary.time.violations, 1);
        assert_eq!(summary.boundaries.lower, -2.1972);
        assert_eq!(summary.boundaries.upper, 2.1972);
        assert_eq!(summary.chart.len(), 3);
        assert_eq!(summary.chart[0].s_index, -0.4055);
        assert_eq!(summary.accuracy, 33.33);
        assert_eq!(summary.duration_secs, None);
    }

    #[test]
    fn summary_derives_missing_analysis() {
        let mut attempt = played();
        attempt.status = AttemptStatus::Abandoned;
        let summary = SessionSummary::build(
            &attempt,
            &exam(),
            &SprtConfig::default(),
            &levels(),
            Utc::now(),
        );

        assert_eq!(summary.consistency, ConsistencyFeedback::Negative);
        assert!(summary.level_analysis.get("basic").is_some());
        assert!(summary.level_analysis.get("advanced").is_some());
    }

    #[test]
    fn json_roundtrip() {
        let attempt = played();
        let summary = SessionSummary::build(
            &attempt,
            &exam(),
            &SprtConfig::default(),
            &levels(),
            Utc::now(),
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("summary.json");

        summary.save_json(&path).unwrap();
        let loaded = SessionSummary::load_json(&path).unwrap();

        assert_eq!(loaded.attempt_id, summary.attempt_id);
        assert_eq!(loaded.answers.len(), 3);
        assert_eq!(loaded.s_history, summary.s_history);
    }

    #[test]
    fn markdown_output() {
        let attempt = played();
        let summary = SessionSummary::build(
            &attempt,
            &exam(),
            &SprtConfig::default(),
            &levels(),
            Utc::now(),
        );
        let md = summary.to_markdown();
        assert!(md.contains("Rust 101"));
        assert!(md.contains("### Levels"));
        assert!(md.contains("(late)"));
    }
}
