//! Error types for the SPRT engine.
//!
//! `ConfigError` covers invalid hypothesis-test parameters and is raised when a
//! catalog is loaded or a session is started, never while an answer is being
//! processed. `SprtError` is what every engine operation returns; its
//! [`SprtError::kind`] lets a host map failures to responses without string
//! matching.

use thiserror::Error;
use uuid::Uuid;

use crate::attempt::AttemptStatus;

/// Invalid or missing SPRT configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The exam has no SPRT configuration attached.
    #[error("exam '{0}' has no SPRT configuration")]
    MissingSprtConfig(String),

    /// `p0` must be strictly greater than `p1`.
    #[error("p0 ({p0}) must be greater than p1 ({p1})")]
    HypothesesOutOfOrder { p0: f64, p1: f64 },

    /// `p0`/`p1` are percentages in the open interval (0, 100).
    #[error("{name} must be strictly between 0 and 100, got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    /// `alpha`/`beta` are error rates in the open interval (0, 1).
    #[error("{name} must be strictly between 0 and 1, got {value}")]
    ErrorRateOutOfRange { name: &'static str, value: f64 },

    /// `alpha + beta` must stay below 1 so that `lower < 0 < upper`.
    #[error("alpha + beta must be less than 1, got {alpha} + {beta}")]
    ErrorRatesTooLarge { alpha: f64, beta: f64 },

    /// The advancement threshold lies in (0, 1].
    #[error("success threshold to advance must be in (0, 1], got {0}")]
    ThresholdOutOfRange(f64),

    /// At least one question per level is required before advancing.
    #[error("min questions per level must be at least 1")]
    MinQuestionsTooLow,
}

/// Broad category of an [`SprtError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    Reference,
    State,
    NotFound,
    Store,
}

/// Errors returned by engine operations.
#[derive(Debug, Error)]
pub enum SprtError {
    /// The exam's SPRT configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Submitted input is malformed (timestamps, duplicates).
    #[error("invalid input: {0}")]
    Validation(String),

    /// An option does not belong to the referenced question, or the question
    /// is outside the exam's banks.
    #[error("reference error: {0}")]
    Reference(String),

    /// The attempt has left `in_progress` (finished or abandoned).
    #[error("attempt {attempt_id} is {status}, expected in_progress")]
    NotInProgress {
        attempt_id: Uuid,
        status: AttemptStatus,
    },

    /// The student already has an attempt running for this exam.
    #[error("attempt {0} is already in progress for this exam")]
    AttemptAlreadyInProgress(Uuid),

    /// Any other lifecycle violation (exam closed, attempt limit reached).
    #[error("state error: {0}")]
    State(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A collaborator store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl SprtError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        SprtError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// The category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SprtError::Config(_) => ErrorKind::Configuration,
            SprtError::Validation(_) => ErrorKind::Validation,
            SprtError::Reference(_) => ErrorKind::Reference,
            SprtError::NotInProgress { .. }
            | SprtError::AttemptAlreadyInProgress(_)
            | SprtError::State(_) => ErrorKind::State,
            SprtError::NotFound { .. } => ErrorKind::NotFound,
            SprtError::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<anyhow::Error> for SprtError {
    fn from(err: anyhow::Error) -> Self {
        SprtError::Store(format!("{err:#}"))
    }
}
