//! Store error types.

use thiserror::Error;
use uuid::Uuid;

use sprtexam_core::model::{LevelId, QuestionId};

/// Errors raised while building or mutating the in-memory stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Two catalogs define the same exam.
    #[error("exam '{0}' is defined more than once")]
    DuplicateExam(String),

    /// Two catalogs give the same level id different names.
    #[error("level {id} is defined as both '{existing}' and '{other}'")]
    ConflictingLevel {
        id: LevelId,
        existing: String,
        other: String,
    },

    /// Two catalogs define the same question id.
    #[error("question {0} is defined more than once")]
    DuplicateQuestion(QuestionId),

    /// An attempt with this id is already stored.
    #[error("attempt {0} already exists")]
    DuplicateAttempt(Uuid),

    /// The entity to update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}
