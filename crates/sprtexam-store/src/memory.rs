//! In-memory implementations of the collaborator traits.
//!
//! [`InMemoryCatalog`] serves exams, levels and questions loaded from TOML
//! catalogs. [`InMemoryAttemptStore`] keeps attempt aggregates in a map
//! behind a `tokio` read-write lock; each commit re-checks the stored status
//! and replaces the whole aggregate under the write lock.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use sprtexam_core::attempt::{AttemptState, AttemptStatus};
use sprtexam_core::model::{
    BankId, DifficultyLevel, Exam, LevelId, OptionId, Question, QuestionBank, QuestionId,
    SoftDelete,
};
use sprtexam_core::parser::Catalog;
use sprtexam_core::traits::{AttemptStore, CommitOutcome, ExamCatalog, QuestionStore};

use crate::error::StoreError;

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Exams, levels, banks and questions held in memory.
///
/// Levels form one shared sequence across all loaded catalogs.
#[derive(Default)]
pub struct InMemoryCatalog {
    exams: RwLock<HashMap<String, Exam>>,
    levels: RwLock<BTreeMap<LevelId, DifficultyLevel>>,
    banks: RwLock<HashMap<BankId, QuestionBank>>,
    questions: RwLock<BTreeMap<QuestionId, Question>>,
}

impl InMemoryCatalog {
    /// Merge parsed catalogs into one store.
    ///
    /// A level or bank may appear in several catalogs as long as the
    /// definitions agree on the name; exams and questions must be unique.
    pub fn from_catalogs(catalogs: Vec<Catalog>) -> Result<Self, StoreError> {
        let mut exams = HashMap::new();
        let mut levels: BTreeMap<LevelId, DifficultyLevel> = BTreeMap::new();
        let mut banks = HashMap::new();
        let mut questions = BTreeMap::new();

        for catalog in catalogs {
            if exams.contains_key(&catalog.exam.id) {
                return Err(StoreError::DuplicateExam(catalog.exam.id));
            }
            for level in catalog.levels {
                match levels.get(&level.id) {
                    Some(existing) if existing.name != level.name => {
                        return Err(StoreError::ConflictingLevel {
                            id: level.id,
                            existing: existing.name.clone(),
                            other: level.name,
                        });
                    }
                    Some(_) => {}
                    None => {
                        levels.insert(level.id, level);
                    }
                }
            }
            for bank in catalog.banks {
                banks.entry(bank.id).or_insert(bank);
            }
            for question in catalog.questions {
                if questions.contains_key(&question.id) {
                    return Err(StoreError::DuplicateQuestion(question.id));
                }
                questions.insert(question.id, question);
            }
            exams.insert(catalog.exam.id.clone(), catalog.exam);
        }

        tracing::debug!(
            exams = exams.len(),
            levels = levels.len(),
            questions = questions.len(),
            "catalog loaded"
        );

        Ok(Self {
            exams: RwLock::new(exams),
            levels: RwLock::new(levels),
            banks: RwLock::new(banks),
            questions: RwLock::new(questions),
        })
    }

    /// Ids of all loaded exams, sorted.
    pub async fn exam_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.exams.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Turn a question on or off for selection.
    pub async fn set_question_active(
        &self,
        question_id: QuestionId,
        is_active: bool,
    ) -> Result<(), StoreError> {
        let mut questions = self.questions.write().await;
        let question = questions
            .get_mut(&question_id)
            .ok_or_else(|| not_found("question", question_id))?;
        question.is_active = is_active;
        Ok(())
    }

    /// Turn a question bank on or off for selection.
    pub async fn set_bank_active(
        &self,
        bank_id: BankId,
        is_active: bool,
    ) -> Result<(), StoreError> {
        let mut banks = self.banks.write().await;
        let bank = banks
            .get_mut(&bank_id)
            .ok_or_else(|| not_found("bank", bank_id))?;
        bank.is_active = is_active;
        Ok(())
    }

    /// Tombstone a question.
    pub async fn soft_delete_question(
        &self,
        question_id: QuestionId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut questions = self.questions.write().await;
        let question = questions
            .get_mut(&question_id)
            .ok_or_else(|| not_found("question", question_id))?;
        question.deleted_at = Some(at);
        Ok(())
    }

    /// Turn one option of a question on or off.
    pub async fn set_option_active(
        &self,
        question_id: QuestionId,
        option_id: OptionId,
        is_active: bool,
    ) -> Result<(), StoreError> {
        let mut questions = self.questions.write().await;
        let option = questions
            .get_mut(&question_id)
            .and_then(|q| q.options.iter_mut().find(|o| o.id == option_id))
            .ok_or_else(|| not_found("option", option_id))?;
        option.is_active = is_active;
        Ok(())
    }

    /// Tombstone a difficulty level; it drops out of the level sequence.
    pub async fn soft_delete_level(
        &self,
        level_id: LevelId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut levels = self.levels.write().await;
        let level = levels
            .get_mut(&level_id)
            .ok_or_else(|| not_found("level", level_id))?;
        level.deleted_at = Some(at);
        Ok(())
    }

    /// Tombstone an exam; it closes to new and running attempts alike.
    pub async fn soft_delete_exam(
        &self,
        exam_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut exams = self.exams.write().await;
        let exam = exams
            .get_mut(exam_id)
            .ok_or_else(|| not_found("exam", exam_id))?;
        exam.deleted_at = Some(at);
        Ok(())
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl ExamCatalog for InMemoryCatalog {
    async fn exam(&self, exam_id: &str) -> anyhow::Result<Option<Exam>> {
        Ok(self.exams.read().await.get(exam_id).cloned())
    }

    async fn levels(&self) -> anyhow::Result<Vec<DifficultyLevel>> {
        Ok(self
            .levels
            .read()
            .await
            .values()
            .filter(|l| !l.is_deleted())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuestionStore for InMemoryCatalog {
    async fn question(&self, question_id: QuestionId) -> anyhow::Result<Option<Question>> {
        Ok(self.questions.read().await.get(&question_id).cloned())
    }

    async fn active_questions(
        &self,
        banks: &[BankId],
        level: LevelId,
        exclude: &HashSet<QuestionId>,
    ) -> anyhow::Result<Vec<Question>> {
        let open_banks: HashSet<BankId> = {
            let known = self.banks.read().await;
            banks
                .iter()
                .copied()
                .filter(|id| {
                    known
                        .get(id)
                        .is_some_and(|b| b.is_active && !b.is_deleted())
                })
                .collect()
        };

        Ok(self
            .questions
            .read()
            .await
            .values()
            .filter(|q| q.level_id == level && open_banks.contains(&q.bank_id))
            .filter(|q| q.is_selectable() && !exclude.contains(&q.id))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Attempt aggregates held in memory.
#[derive(Default)]
pub struct InMemoryAttemptStore {
    attempts: RwLock<HashMap<Uuid, AttemptState>>,
}

impl InMemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.attempts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.attempts.read().await.is_empty()
    }

    /// Force a status out-of-band, as a host abandoning an attempt directly
    /// in storage would.
    pub async fn force_status(
        &self,
        attempt_id: Uuid,
        status: AttemptStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut attempts = self.attempts.write().await;
        let attempt = attempts
            .get_mut(&attempt_id)
            .ok_or_else(|| not_found("attempt", attempt_id))?;
        attempt.status = status;
        attempt.completed_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl AttemptStore for InMemoryAttemptStore {
    async fn insert(&self, attempt: AttemptState) -> anyhow::Result<()> {
        let mut attempts = self.attempts.write().await;
        if attempts.contains_key(&attempt.id) {
            return Err(StoreError::DuplicateAttempt(attempt.id).into());
        }
        attempts.insert(attempt.id, attempt);
        Ok(())
    }

    async fn load(&self, attempt_id: Uuid) -> anyhow::Result<Option<AttemptState>> {
        Ok(self.attempts.read().await.get(&attempt_id).cloned())
    }

    async fn attempts_for(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> anyhow::Result<Vec<AttemptState>> {
        let mut found: Vec<_> = self
            .attempts
            .read()
            .await
            .values()
            .filter(|a| a.exam_id == exam_id && a.student_id == student_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| (a.attempt_number, a.started_at));
        Ok(found)
    }

    async fn commit(&self, attempt: AttemptState) -> anyhow::Result<CommitOutcome> {
        let mut attempts = self.attempts.write().await;
        let Some(stored) = attempts.get(&attempt.id) else {
            return Ok(CommitOutcome::Missing);
        };
        if !stored.is_in_progress() {
            return Ok(CommitOutcome::Rejected(stored.status));
        }
        attempts.insert(attempt.id, attempt);
        Ok(CommitOutcome::Committed)
    }
}
