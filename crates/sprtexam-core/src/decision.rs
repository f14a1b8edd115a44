//! The stop/continue state machine evaluated after every answer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::attempt::AttemptStatus;
use crate::boundary::{Boundaries, BoundaryPosition};

/// Outcome reported to the host after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Continue,
    Approved,
    Failed,
}

impl Verdict {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Verdict::Continue)
    }

    /// The verdict matching a persisted status. `Abandoned` never comes out
    /// of the evaluator, so it maps to `Failed`.
    pub fn from_status(status: AttemptStatus) -> Self {
        match status {
            AttemptStatus::InProgress => Verdict::Continue,
            AttemptStatus::Approved => Verdict::Approved,
            AttemptStatus::Failed | AttemptStatus::Abandoned => Verdict::Failed,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Continue => write!(f, "continue"),
            Verdict::Approved => write!(f, "approved"),
            Verdict::Failed => write!(f, "failed"),
        }
    }
}

/// Why a session is being finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinalizeReason {
    /// The statistic reached the lower threshold.
    Approved,
    /// The statistic reached the upper threshold.
    Failed,
    /// The question ceiling was reached without crossing a threshold.
    MaxQuestionsReached,
    /// The selector ran out of eligible questions.
    NoMoreQuestions,
}

impl fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalizeReason::Approved => write!(f, "approved"),
            FinalizeReason::Failed => write!(f, "failed"),
            FinalizeReason::MaxQuestionsReached => write!(f, "max-questions-reached"),
            FinalizeReason::NoMoreQuestions => write!(f, "no-more-questions"),
        }
    }
}

/// Result of evaluating the statistic after an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Finalize(FinalizeReason),
}

/// Apply the transition rules in priority order: lower threshold, upper
/// threshold, question ceiling, continue.
pub fn evaluate(
    s_index: f64,
    total_questions: u32,
    max_questions: u32,
    boundaries: &Boundaries,
) -> Decision {
    match boundaries.position(s_index) {
        BoundaryPosition::AtOrBelowLower => Decision::Finalize(FinalizeReason::Approved),
        BoundaryPosition::AtOrAboveUpper => Decision::Finalize(FinalizeReason::Failed),
        BoundaryPosition::Between if total_questions >= max_questions => {
            Decision::Finalize(FinalizeReason::MaxQuestionsReached)
        }
        BoundaryPosition::Between => Decision::Continue,
    }
}

/// Persisted status for a finalization.
///
/// `Approved` and `MaxQuestionsReached` decide by the sign of the statistic
/// (negative is approved); `Failed` and `NoMoreQuestions` always fail.
pub fn final_status(reason: FinalizeReason, s_index: f64) -> AttemptStatus {
    match reason {
        FinalizeReason::Approved | FinalizeReason::MaxQuestionsReached => {
            if s_index < 0.0 {
                AttemptStatus::Approved
            } else {
                AttemptStatus::Failed
            }
        }
        FinalizeReason::Failed | FinalizeReason::NoMoreQuestions => AttemptStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Boundaries {
        Boundaries::new(0.1, 0.1)
    }

    #[test]
    fn lower_crossing_approves() {
        assert_eq!(
            evaluate(-2.43, 6, 20, &bounds()),
            Decision::Finalize(FinalizeReason::Approved)
        );
        assert_eq!(final_status(FinalizeReason::Approved, -2.43), AttemptStatus::Approved);
    }

    #[test]
    fn upper_crossing_fails() {
        assert_eq!(
            evaluate(2.43, 6, 20, &bounds()),
            Decision::Finalize(FinalizeReason::Failed)
        );
    }

    #[test]
    fn boundary_beats_question_ceiling() {
        assert_eq!(
            evaluate(-2.43, 20, 20, &bounds()),
            Decision::Finalize(FinalizeReason::Approved)
        );
    }

    #[test]
    fn inside_boundaries_continues() {
        assert_eq!(evaluate(-2.03, 5, 20, &bounds()), Decision::Continue);
        assert_eq!(evaluate(0.0, 0, 20, &bounds()), Decision::Continue);
    }

    #[test]
    fn ceiling_tie_break_uses_sign() {
        let decision = evaluate(-0.2, 10, 10, &bounds());
        assert_eq!(decision, Decision::Finalize(FinalizeReason::MaxQuestionsReached));
        assert_eq!(
            final_status(FinalizeReason::MaxQuestionsReached, -0.2),
            AttemptStatus::Approved
        );
        assert_eq!(
            final_status(FinalizeReason::MaxQuestionsReached, 0.2),
            AttemptStatus::Failed
        );
        assert_eq!(
            final_status(FinalizeReason::MaxQuestionsReached, 0.0),
            AttemptStatus::Failed
        );
    }

    #[test]
    fn running_out_of_questions_always_fails() {
        assert_eq!(
            final_status(FinalizeReason::NoMoreQuestions, -1.5),
            AttemptStatus::Failed
        );
        assert_eq!(final_status(FinalizeReason::Failed, -0.1), AttemptStatus::Failed);
    }

    #[test]
    fn verdict_follows_status() {
        assert_eq!(Verdict::from_status(AttemptStatus::Approved), Verdict::Approved);
        assert_eq!(Verdict::from_status(AttemptStatus::Failed), Verdict::Failed);
        assert_eq!(Verdict::from_status(AttemptStatus::InProgress), Verdict::Continue);
        assert!(Verdict::Approved.is_terminal());
        assert_eq!(FinalizeReason::MaxQuestionsReached.to_string(), "max-questions-reached");
    }
}
