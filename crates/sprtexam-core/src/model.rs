//! Exam catalog reference data.
//!
//! Exams, difficulty levels, question banks, questions and answer options are
//! owned by external collaborators; the engine only reads them. Removal is a
//! tombstone (`deleted_at`), never a physical delete, and every lookup checks
//! it through [`SoftDelete`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::boundary::Boundaries;
use crate::error::ConfigError;

pub type LevelId = u64;
pub type BankId = u64;
pub type QuestionId = u64;
pub type OptionId = u64;

/// Reference data that can be tombstoned.
pub trait SoftDelete {
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn is_deleted(&self) -> bool {
        self.deleted_at().is_some()
    }
}

/// Hypothesis-test parameters for one exam.
///
/// `p0` and `p1` are percentages; `p0` is the competence hypothesis and must
/// exceed `p1`. Immutable for the lifetime of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SprtConfig {
    #[serde(default = "default_p0")]
    pub p0: f64,
    #[serde(default = "default_p1")]
    pub p1: f64,
    #[serde(default = "default_error_rate")]
    pub alpha: f64,
    #[serde(default = "default_error_rate")]
    pub beta: f64,
    #[serde(default = "default_min_questions")]
    pub min_questions_per_level: u32,
    #[serde(default = "default_success_threshold")]
    pub success_threshold_to_advance: f64,
}

fn default_p0() -> f64 {
    60.0
}
fn default_p1() -> f64 {
    40.0
}
fn default_error_rate() -> f64 {
    0.1
}
fn default_min_questions() -> u32 {
    3
}
fn default_success_threshold() -> f64 {
    0.70
}

impl Default for SprtConfig {
    fn default() -> Self {
        Self {
            p0: default_p0(),
            p1: default_p1(),
            alpha: default_error_rate(),
            beta: default_error_rate(),
            min_questions_per_level: default_min_questions(),
            success_threshold_to_advance: default_success_threshold(),
        }
    }
}

impl SprtConfig {
    /// Check every parameter invariant. Comparisons are written so that NaN
    /// fails them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("p0", self.p0), ("p1", self.p1)] {
            if !(value > 0.0 && value < 100.0) {
                return Err(ConfigError::ProbabilityOutOfRange { name, value });
            }
        }
        if self.p0 <= self.p1 {
            return Err(ConfigError::HypothesesOutOfOrder {
                p0: self.p0,
                p1: self.p1,
            });
        }
        for (name, value) in [("alpha", self.alpha), ("beta", self.beta)] {
            if !(value > 0.0 && value < 1.0) {
                return Err(ConfigError::ErrorRateOutOfRange { name, value });
            }
        }
        if self.alpha + self.beta >= 1.0 {
            return Err(ConfigError::ErrorRatesTooLarge {
                alpha: self.alpha,
                beta: self.beta,
            });
        }
        if !(self.success_threshold_to_advance > 0.0 && self.success_threshold_to_advance <= 1.0)
        {
            return Err(ConfigError::ThresholdOutOfRange(
                self.success_threshold_to_advance,
            ));
        }
        if self.min_questions_per_level < 1 {
            return Err(ConfigError::MinQuestionsTooLow);
        }
        Ok(())
    }

    /// Decision thresholds derived from `alpha` and `beta`.
    pub fn boundaries(&self) -> Boundaries {
        Boundaries::from_config(self)
    }
}

/// An exam as supplied by the exam catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Hard ceiling on answered questions per attempt.
    pub max_questions: u32,
    /// Attempts a single student may start.
    pub max_attempts: u32,
    /// Late answers are forced incorrect when set.
    pub enforce_time_limits: bool,
    /// Level progression is evaluated after each continuing answer when set.
    pub enable_difficulty_progression: bool,
    /// Banks whose questions this exam draws from.
    #[serde(default)]
    pub question_banks: Vec<BankId>,
    /// Attached test parameters; starting a session requires one.
    #[serde(default)]
    pub sprt_config: Option<SprtConfig>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Exam {
    /// Active, not deleted, and `now` inside the optional availability window.
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && !self.is_deleted()
            && self.starts_at.map_or(true, |start| start <= now)
            && self.ends_at.map_or(true, |end| now <= end)
    }
}

impl SoftDelete for Exam {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// One difficulty tier. Tiers are ordered by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DifficultyLevel {
    pub id: LevelId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDelete for DifficultyLevel {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// A named pool of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub id: BankId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SoftDelete for QuestionBank {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub bank_id: BankId,
    pub level_id: LevelId,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub statement: String,
    /// Seconds allowed to answer.
    pub time_secs: u32,
    #[serde(default)]
    pub options: Vec<AnswerOption>,
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Question {
    /// Active, not deleted.
    pub fn is_selectable(&self) -> bool {
        self.is_active && !self.is_deleted()
    }

    /// Find an option of this question that can still be chosen.
    pub fn option(&self, option_id: OptionId) -> Option<&AnswerOption> {
        self.options
            .iter()
            .find(|o| o.id == option_id && o.is_selectable())
    }

    /// Selectable options, excluding `option_id`.
    pub fn other_options(&self, option_id: OptionId) -> impl Iterator<Item = &AnswerOption> {
        self.options
            .iter()
            .filter(move |o| o.id != option_id && o.is_selectable())
    }
}

impl SoftDelete for Question {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}

/// One choice of a question, with its correctness flag and feedback text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: OptionId,
    #[serde(default)]
    pub text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: String,
    pub is_active: bool,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl AnswerOption {
    pub fn is_selectable(&self) -> bool {
        self.is_active && !self.is_deleted()
    }
}

impl SoftDelete for AnswerOption {
    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }
}
