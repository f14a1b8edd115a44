//! Collaborator traits.
//!
//! The engine reads exams and questions from an exam catalog and question
//! store, persists attempts through an attempt store, and takes "now" from a
//! clock. The `sprtexam-store` crate provides in-memory implementations.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attempt::{AttemptState, AttemptStatus};
use crate::model::{BankId, DifficultyLevel, Exam, LevelId, Question, QuestionId};

// ---------------------------------------------------------------------------
// Exam catalog
// ---------------------------------------------------------------------------

/// Source of exams and the shared difficulty-level sequence.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    /// Look up an exam by id, tombstoned or not.
    async fn exam(&self, exam_id: &str) -> anyhow::Result<Option<Exam>>;

    /// Non-deleted difficulty levels, ascending by id.
    async fn levels(&self) -> anyhow::Result<Vec<DifficultyLevel>>;
}

// ---------------------------------------------------------------------------
// Question store
// ---------------------------------------------------------------------------

/// Source of questions and their answer options.
#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// Look up a question by id, whatever its active or deleted state.
    async fn question(&self, question_id: QuestionId) -> anyhow::Result<Option<Question>>;

    /// Active, non-deleted questions from the given banks at `level`, minus
    /// the ids in `exclude`.
    async fn active_questions(
        &self,
        banks: &[BankId],
        level: LevelId,
        exclude: &HashSet<QuestionId>,
    ) -> anyhow::Result<Vec<Question>>;
}

// ---------------------------------------------------------------------------
// Attempt store
// ---------------------------------------------------------------------------

/// Result of a conditional attempt write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The aggregate was replaced.
    Committed,
    /// The stored attempt had already left `in_progress`; nothing was written.
    Rejected(AttemptStatus),
    /// No attempt with that id exists.
    Missing,
}

/// Persistence for attempt aggregates.
///
/// An aggregate is always written whole. `commit` re-checks that the stored
/// attempt is still in progress immediately before replacing it; it performs
/// no other conflict detection, so two writers racing on the same attempt
/// resolve as last write wins.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Store a freshly started attempt.
    async fn insert(&self, attempt: AttemptState) -> anyhow::Result<()>;

    async fn load(&self, attempt_id: Uuid) -> anyhow::Result<Option<AttemptState>>;

    /// All attempts a student has made at an exam, oldest first.
    async fn attempts_for(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Vec<AttemptState>>;

    /// Replace the stored aggregate if the stored copy is still in progress.
    async fn commit(&self, attempt: AttemptState) -> anyhow::Result<CommitOutcome>;
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
