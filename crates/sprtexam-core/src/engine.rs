//! Session orchestrator.
//!
//! Wires the catalog, question store, attempt store, question picker, and
//! clock together and exposes the session lifecycle: start, next question,
//! submit answer, abandon, and summary.
//!
//! Every mutation works on a private copy of the attempt aggregate and ends
//! in a single [`AttemptStore::commit`]; a rejected commit leaves the stored
//! attempt untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::try_join;
use uuid::Uuid;

use crate::answer::{apply_answer, check_timing, parse_timestamp};
use crate::attempt::{AttemptState, AttemptStatus};
use crate::boundary::Boundaries;
use crate::decision::{evaluate, final_status, Decision, FinalizeReason, Verdict};
use crate::error::{ConfigError, SprtError};
use crate::model::{
    AnswerOption, DifficultyLevel, Exam, OptionId, Question, QuestionId, SoftDelete, SprtConfig,
};
use crate::progression;
use crate::report::{AnswerOutcome, SessionSummary};
use crate::selector::{select_next, QuestionPicker, RandomPicker, Selection};
use crate::statistics::{analyze_levels, classify_consistency};
use crate::traits::{
    AttemptStore, Clock, CommitOutcome, ExamCatalog, QuestionStore, SystemClock,
};

/// An answer as submitted by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSubmission {
    pub question_id: QuestionId,
    pub option_id: OptionId,
    /// RFC 3339 time at which the question was shown.
    pub question_shown_at: Option<String>,
    /// Time of the answer; the engine clock when absent.
    pub answered_at: Option<DateTime<Utc>>,
}

impl AnswerSubmission {
    pub fn new(question_id: QuestionId, option_id: OptionId, shown_at: impl Into<String>) -> Self {
        Self {
            question_id,
            option_id,
            question_shown_at: Some(shown_at.into()),
            answered_at: None,
        }
    }

    pub fn answered_at(mut self, at: DateTime<Utc>) -> Self {
        self.answered_at = Some(at);
        self
    }
}

/// The adaptive exam engine.
pub struct SprtEngine {
    catalog: Arc<dyn ExamCatalog>,
    questions: Arc<dyn QuestionStore>,
    attempts: Arc<dyn AttemptStore>,
    picker: Arc<dyn QuestionPicker>,
    clock: Arc<dyn Clock>,
}

impl SprtEngine {
    /// Engine with an entropy-seeded picker and the system clock.
    pub fn new(
        catalog: Arc<dyn ExamCatalog>,
        questions: Arc<dyn QuestionStore>,
        attempts: Arc<dyn AttemptStore>,
    ) -> Self {
        Self {
            catalog,
            questions,
            attempts,
            picker: Arc::new(RandomPicker::from_entropy()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_picker(mut self, picker: Arc<dyn QuestionPicker>) -> Self {
        self.picker = picker;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start a new attempt for `student_id` at `exam_id`.
    ///
    /// The exam must be available and carry a valid SPRT configuration, the
    /// student must have no attempt in progress, and must not have used up
    /// the exam's attempts. The attempt starts at the lowest level.
    pub async fn start_attempt(
        &self,
        exam_id: &str,
        student_id: &str,
    ) -> Result<AttemptState, SprtError> {
        let now = self.clock.now();
        let exam = self.exam(exam_id).await?;
        if !exam.is_available_at(now) {
            return Err(SprtError::State(format!(
                "exam '{exam_id}' is not available"
            )));
        }
        sprt_config(&exam)?;

        let (previous, levels) = try_join!(
            self.attempts.attempts_for(exam_id, student_id),
            self.catalog.levels()
        )?;

        if let Some(running) = previous.iter().find(|a| a.is_in_progress()) {
            return Err(SprtError::AttemptAlreadyInProgress(running.id));
        }
        if previous.len() >= exam.max_attempts as usize {
            return Err(SprtError::State(format!(
                "student '{student_id}' has used all {} attempts at exam '{exam_id}'",
                exam.max_attempts
            )));
        }

        let attempt_number = previous
            .iter()
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;
        let attempt = AttemptState::new(
            exam_id,
            student_id,
            attempt_number,
            levels.first().map(|l| l.id),
            now,
        );
        self.attempts.insert(attempt.clone()).await?;

        tracing::info!(
            attempt_id = %attempt.id,
            exam_id,
            student_id,
            attempt_number,
            "attempt started"
        );
        Ok(attempt)
    }

    /// The next question to present, or `None` once the session is over.
    ///
    /// When selection concludes the session, the attempt is finalized and
    /// committed before `None` is returned. An attempt whose exam has closed
    /// (deactivated, deleted, or past its end) is abandoned instead.
    pub async fn next_question(&self, attempt_id: Uuid) -> Result<Option<Question>, SprtError> {
        let mut attempt = self.attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Ok(None);
        }

        let (exam, levels) = try_join!(
            self.exam(&attempt.exam_id),
            async { self.catalog.levels().await.map_err(SprtError::from) }
        )?;

        let now = self.clock.now();
        if !exam.is_available_at(now) {
            attempt.status = AttemptStatus::Abandoned;
            attempt.completed_at = Some(now);
            attempt.last_activity_at = now;
            self.commit(attempt).await?;
            tracing::info!(
                attempt_id = %attempt_id,
                exam_id = %exam.id,
                "exam no longer available, attempt abandoned"
            );
            return Ok(None);
        }

        let config = sprt_config(&exam)?;
        let before = attempt.clone();
        let selection = select_next(
            &mut attempt,
            &exam,
            &config,
            &levels,
            self.questions.as_ref(),
            self.picker.as_ref(),
            now,
        )
        .await?;

        match selection {
            Selection::Question(question) => {
                if attempt != before {
                    self.commit(attempt).await?;
                }
                Ok(Some(question))
            }
            Selection::Concluded(reason) => {
                finalize(&mut attempt, reason, &levels, now);
                self.commit(attempt).await?;
                Ok(None)
            }
        }
    }

    /// Score one answer, update the statistic, and decide whether the
    /// session continues.
    ///
    /// All validation happens before anything is written. The stored attempt
    /// is re-checked for `in_progress` at commit time; an attempt abandoned
    /// in the meantime fails the submission with [`SprtError::NotInProgress`].
    ///
    /// The question must belong to one of the exam's banks, but the bank's
    /// active and deleted state only gates selection: a question already
    /// served stays answerable after its bank is switched off.
    pub async fn submit_answer(
        &self,
        attempt_id: Uuid,
        submission: AnswerSubmission,
    ) -> Result<AnswerOutcome, SprtError> {
        let shown_at = match submission.question_shown_at.as_deref() {
            Some(raw) => parse_timestamp(raw)?,
            None => {
                return Err(SprtError::Validation(
                    "question_shown_at is required".into(),
                ))
            }
        };
        let answered_at = submission.answered_at.unwrap_or_else(|| self.clock.now());

        let (attempt, question) = try_join!(
            self.attempts.load(attempt_id),
            self.questions.question(submission.question_id)
        )?;
        let mut attempt = attempt.ok_or_else(|| SprtError::not_found("attempt", attempt_id))?;
        if !attempt.is_in_progress() {
            return Err(SprtError::NotInProgress {
                attempt_id,
                status: attempt.status,
            });
        }
        let question = question
            .filter(|q| !q.is_deleted())
            .ok_or_else(|| SprtError::not_found("question", submission.question_id))?;

        let (exam, levels) = try_join!(
            self.exam(&attempt.exam_id),
            async { self.catalog.levels().await.map_err(SprtError::from) }
        )?;
        let config = sprt_config(&exam)?;

        if !exam.question_banks.contains(&question.bank_id) {
            return Err(SprtError::Reference(format!(
                "question {} is not part of exam '{}'",
                question.id, exam.id
            )));
        }
        let option = resolve_option(&question, submission.option_id)?;
        if attempt.answers.iter().any(|a| a.question_id == question.id) {
            return Err(SprtError::Validation(format!(
                "question {} was already answered in this attempt",
                question.id
            )));
        }
        let timing = check_timing(shown_at, answered_at, question.time_secs)?;

        let applied = apply_answer(&mut attempt, &exam, &config, &question, option, &timing);

        let boundaries = config.boundaries();
        let verdict = match evaluate(
            attempt.s_index,
            attempt.total_questions,
            exam.max_questions,
            &boundaries,
        ) {
            Decision::Finalize(reason) => {
                finalize(&mut attempt, reason, &levels, answered_at);
                Verdict::from_status(attempt.status)
            }
            Decision::Continue => {
                if exam.enable_difficulty_progression {
                    progression::try_advance(&mut attempt, &levels, &config, answered_at);
                }
                Verdict::Continue
            }
        };

        let outcome = AnswerOutcome::new(&attempt, &applied, &question, option, verdict);
        self.commit(attempt).await?;
        Ok(outcome)
    }

    /// Abandon an in-progress attempt.
    pub async fn abandon(&self, attempt_id: Uuid) -> Result<AttemptState, SprtError> {
        let mut attempt = self.attempt(attempt_id).await?;
        if !attempt.is_in_progress() {
            return Err(SprtError::NotInProgress {
                attempt_id,
                status: attempt.status,
            });
        }

        let now = self.clock.now();
        attempt.status = AttemptStatus::Abandoned;
        attempt.completed_at = Some(now);
        attempt.last_activity_at = now;
        self.commit(attempt.clone()).await?;

        tracing::info!(attempt_id = %attempt_id, "attempt abandoned");
        Ok(attempt)
    }

    /// Summary of a finished (approved, failed, or abandoned) attempt.
    pub async fn summary(&self, attempt_id: Uuid) -> Result<SessionSummary, SprtError> {
        let attempt = self.attempt(attempt_id).await?;
        if attempt.is_in_progress() {
            return Err(SprtError::State(format!(
                "attempt {attempt_id} is still in progress"
            )));
        }
        let (exam, levels) = try_join!(
            self.exam(&attempt.exam_id),
            async { self.catalog.levels().await.map_err(SprtError::from) }
        )?;
        let config = sprt_config(&exam)?;
        Ok(SessionSummary::build(
            &attempt,
            &exam,
            &config,
            &levels,
            self.clock.now(),
        ))
    }

    /// Decision thresholds of an exam.
    pub async fn boundaries(&self, exam_id: &str) -> Result<Boundaries, SprtError> {
        let exam = self.exam(exam_id).await?;
        Ok(sprt_config(&exam)?.boundaries())
    }

    /// Current stored state of an attempt.
    pub async fn attempt(&self, attempt_id: Uuid) -> Result<AttemptState, SprtError> {
        self.attempts
            .load(attempt_id)
            .await?
            .ok_or_else(|| SprtError::not_found("attempt", attempt_id))
    }

    async fn exam(&self, exam_id: &str) -> Result<Exam, SprtError> {
        self.catalog
            .exam(exam_id)
            .await?
            .ok_or_else(|| SprtError::not_found("exam", exam_id))
    }

    async fn commit(&self, attempt: AttemptState) -> Result<(), SprtError> {
        let attempt_id = attempt.id;
        match self.attempts.commit(attempt).await? {
            CommitOutcome::Committed => Ok(()),
            CommitOutcome::Rejected(status) => {
                tracing::warn!(
                    attempt_id = %attempt_id,
                    %status,
                    "attempt left in_progress before commit; changes discarded"
                );
                Err(SprtError::NotInProgress { attempt_id, status })
            }
            CommitOutcome::Missing => Err(SprtError::not_found("attempt", attempt_id)),
        }
    }
}

/// The exam's validated SPRT configuration.
fn sprt_config(exam: &Exam) -> Result<SprtConfig, SprtError> {
    let config = exam
        .sprt_config
        .ok_or_else(|| ConfigError::MissingSprtConfig(exam.id.clone()))?;
    config.validate()?;
    Ok(config)
}

fn resolve_option(
    question: &Question,
    option_id: OptionId,
) -> Result<&AnswerOption, SprtError> {
    if let Some(option) = question.option(option_id) {
        return Ok(option);
    }
    let message = if question.options.iter().any(|o| o.id == option_id) {
        format!("option {option_id} of question {} is no longer available", question.id)
    } else {
        format!("option {option_id} does not belong to question {}", question.id)
    };
    Err(SprtError::Reference(message))
}

/// Close the attempt: status from the finalize reason and the statistic's
/// sign, completion time, consistency, and level analysis.
fn finalize(
    attempt: &mut AttemptState,
    reason: FinalizeReason,
    levels: &[DifficultyLevel],
    now: DateTime<Utc>,
) {
    attempt.status = final_status(reason, attempt.s_index);
    attempt.completed_at = Some(now);
    attempt.last_activity_at = now;
    attempt.consistency = Some(classify_consistency(attempt.s_history.as_slice()));
    attempt.level_analysis = Some(analyze_levels(&attempt.level_progress, levels));

    tracing::info!(
        attempt_id = %attempt.id,
        %reason,
        status = %attempt.status,
        s_index = attempt.s_index,
        total_questions = attempt.total_questions,
        "attempt finalized"
    );
}
