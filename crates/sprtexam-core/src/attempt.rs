//! Per-session state: the attempt aggregate, its answer log, and per-level
//! progress.
//!
//! An [`AttemptState`] owns its [`AnswerRecord`]s and
//! [`LevelProgressRecord`]s. Stores persist the aggregate as one unit, which
//! is what makes an answer submission all-or-nothing.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{LevelId, OptionId, QuestionId};
use crate::statistics::accuracy_percent;

/// Schema version of [`SIndexHistory`].
pub const HISTORY_SCHEMA_VERSION: u32 = 1;

/// Schema version of [`LevelAnalysis`].
pub const LEVEL_ANALYSIS_SCHEMA_VERSION: u32 = 1;

/// Lifecycle status of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Approved,
    Failed,
    Abandoned,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AttemptStatus::InProgress)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptStatus::InProgress => write!(f, "in_progress"),
            AttemptStatus::Approved => write!(f, "approved"),
            AttemptStatus::Failed => write!(f, "failed"),
            AttemptStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Post-hoc classification of the statistic's trend over a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConsistencyFeedback {
    /// Mostly decreasing: trending toward competence.
    Positive,
    /// Mostly increasing: trending toward incompetence.
    Negative,
    Inconsistent,
    /// Fewer than three answers.
    InsufficientData,
}

impl fmt::Display for ConsistencyFeedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyFeedback::Positive => write!(f, "positive"),
            ConsistencyFeedback::Negative => write!(f, "negative"),
            ConsistencyFeedback::Inconsistent => write!(f, "inconsistent"),
            ConsistencyFeedback::InsufficientData => write!(f, "insufficient-data"),
        }
    }
}

/// Append-only, chronological snapshots of the cumulative statistic, one per
/// answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SIndexHistory {
    pub schema_version: u32,
    pub values: Vec<f64>,
}

impl Default for SIndexHistory {
    fn default() -> Self {
        Self {
            schema_version: HISTORY_SCHEMA_VERSION,
            values: Vec::new(),
        }
    }
}

impl SIndexHistory {
    pub fn push(&mut self, value: f64) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}

/// Running tally for one (attempt, level) pair. Created on the first answer
/// at that level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgressRecord {
    pub level_id: LevelId,
    pub questions_answered: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    /// Sum of the statistic increments earned at this level only.
    pub s_index: f64,
    pub is_completed: bool,
    /// Set when the attempt moved past this level.
    pub advanced: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl LevelProgressRecord {
    pub fn new(level_id: LevelId, now: DateTime<Utc>) -> Self {
        Self {
            level_id,
            questions_answered: 0,
            correct_count: 0,
            incorrect_count: 0,
            s_index: 0.0,
            is_completed: false,
            advanced: false,
            started_at: now,
            completed_at: None,
        }
    }

    /// Percentage of correct answers at this level; 0 before any answer.
    pub fn accuracy(&self) -> f64 {
        accuracy_percent(self.correct_count, self.questions_answered)
    }

    pub fn record(&mut self, is_correct: bool, delta: f64) {
        self.questions_answered += 1;
        if is_correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.s_index += delta;
    }
}

/// One answered question. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// 1-based position in the attempt.
    pub question_number: u32,
    pub question_id: QuestionId,
    pub option_id: OptionId,
    pub level_id: LevelId,
    pub is_correct: bool,
    pub question_shown_at: DateTime<Utc>,
    pub answered_at: DateTime<Utc>,
    /// Whole seconds elapsed, truncated.
    pub time_taken_secs: u32,
    pub allowed_time_secs: u32,
    pub time_violation: bool,
    /// Cumulative statistic immediately after this answer.
    pub s_index_after: f64,
}

/// Snapshot of one level's performance, produced at finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub level_id: LevelId,
    pub questions_answered: u32,
    pub correct: u32,
    pub incorrect: u32,
    /// Percent, 0-100.
    pub accuracy: f64,
    pub s_index: f64,
    pub completed: bool,
    pub advanced: bool,
}

/// Level snapshots keyed by level name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAnalysis {
    pub schema_version: u32,
    pub levels: BTreeMap<String, LevelSnapshot>,
}

impl Default for LevelAnalysis {
    fn default() -> Self {
        Self {
            schema_version: LEVEL_ANALYSIS_SCHEMA_VERSION,
            levels: BTreeMap::new(),
        }
    }
}

impl LevelAnalysis {
    pub fn get(&self, level_name: &str) -> Option<&LevelSnapshot> {
        self.levels.get(level_name)
    }
}

/// The state of one test-taking session.
///
/// Mutated only by the answer processor and the decision evaluator while
/// `status` is `InProgress`; the one exception is the out-of-band abandon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptState {
    pub id: Uuid,
    pub exam_id: String,
    pub student_id: String,
    pub attempt_number: u32,
    pub status: AttemptStatus,
    /// Level the selector draws from. `None` until initialised.
    #[serde(default)]
    pub current_level: Option<LevelId>,
    pub total_questions: u32,
    pub correct_answers: u32,
    pub incorrect_answers: u32,
    /// Cumulative log-likelihood ratio.
    pub s_index: f64,
    #[serde(default)]
    pub s_history: SIndexHistory,
    #[serde(default)]
    pub consistency: Option<ConsistencyFeedback>,
    #[serde(default)]
    pub level_analysis: Option<LevelAnalysis>,
    pub session_token: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub answers: Vec<AnswerRecord>,
    #[serde(default)]
    pub level_progress: Vec<LevelProgressRecord>,
}

impl AttemptState {
    /// A fresh in-progress attempt with a new id and session token.
    pub fn new(
        exam_id: impl Into<String>,
        student_id: impl Into<String>,
        attempt_number: u32,
        initial_level: Option<LevelId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exam_id: exam_id.into(),
            student_id: student_id.into(),
            attempt_number,
            status: AttemptStatus::InProgress,
            current_level: initial_level,
            total_questions: 0,
            correct_answers: 0,
            incorrect_answers: 0,
            s_index: 0.0,
            s_history: SIndexHistory::default(),
            consistency: None,
            level_analysis: None,
            session_token: Uuid::new_v4().simple().to_string(),
            started_at: now,
            completed_at: None,
            last_activity_at: now,
            answers: Vec::new(),
            level_progress: Vec::new(),
        }
    }

    pub fn is_in_progress(&self) -> bool {
        self.status == AttemptStatus::InProgress
    }

    /// Percentage of correct answers; 0 before any answer.
    pub fn accuracy(&self) -> f64 {
        accuracy_percent(self.correct_answers, self.total_questions)
    }

    /// Wall time between start and completion, once completed.
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }

    pub fn answered_question_ids(&self) -> HashSet<QuestionId> {
        self.answers.iter().map(|a| a.question_id).collect()
    }

    pub fn progress_for(&self, level_id: LevelId) -> Option<&LevelProgressRecord> {
        self.level_progress.iter().find(|p| p.level_id == level_id)
    }

    pub fn progress_for_mut(&mut self, level_id: LevelId) -> Option<&mut LevelProgressRecord> {
        self.level_progress
            .iter_mut()
            .find(|p| p.level_id == level_id)
    }

    /// The progress record for `level_id`, created on first touch. At most
    /// one record exists per level.
    pub fn progress_entry(
        &mut self,
        level_id: LevelId,
        now: DateTime<Utc>,
    ) -> &mut LevelProgressRecord {
        let idx = match self
            .level_progress
            .iter()
            .position(|p| p.level_id == level_id)
        {
            Some(idx) => idx,
            None => {
                self.level_progress
                    .push(LevelProgressRecord::new(level_id, now));
                self.level_progress.len() - 1
            }
        };
        &mut self.level_progress[idx]
    }
}
