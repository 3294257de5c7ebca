//! Grading and certification.
//!
//! [`score_session`] is a pure function of (bank, session, answers, time).
//! [`GradeBook`] adds the one piece of state grading needs: which sessions
//! have already been graded.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::bank::QuestionBank;
use crate::error::ExamError;
use crate::model::{Answers, ExamSession, SessionId};
use crate::results::{basis_points, Award, ExamResult, QuestionOutcome};

/// Grade `answers` against `session`.
///
/// Unanswered questions count as incorrect. Answers to questions outside the
/// session are ignored, as are labels beyond a question's last option (those
/// simply cannot match the correct one).
pub fn score_session(
    bank: &QuestionBank,
    session: &ExamSession,
    answers: &Answers,
    graded_at: DateTime<Utc>,
) -> Result<ExamResult, ExamError> {
    if session.is_empty() {
        return Err(ExamError::InvalidRequest(format!(
            "session {} has no questions",
            session.id
        )));
    }

    let mut outcomes = Vec::with_capacity(session.len());
    for id in &session.questions {
        let question = bank.get(id)?;
        let selected = answers.get(id).copied();
        outcomes.push(QuestionOutcome {
            question_id: id.clone(),
            selected,
            correct_option: question.correct,
            is_correct: selected.is_some_and(|label| question.is_correct(label)),
        });
    }

    let correct_count = outcomes.iter().filter(|o| o.is_correct).count();
    let total_questions = outcomes.len();
    let bp = basis_points(correct_count, total_questions);

    Ok(ExamResult {
        session_id: session.id,
        candidate: session.candidate.clone(),
        tier_sat: session.tier,
        outcomes,
        correct_count,
        total_questions,
        percentage: f64::from(bp) / 100.0,
        basis_points: bp,
        award: Award::from_basis_points(bp),
        graded_at,
        regraded: false,
    })
}

/// Options for [`GradeBook::grade`].
#[derive(Debug, Clone, Default)]
pub struct GradeOptions {
    /// Replace an earlier result instead of failing.
    pub regrade: bool,
    /// Timestamp to stamp on the result. Defaults to now.
    pub graded_at: Option<DateTime<Utc>>,
}

impl GradeOptions {
    pub fn regrade() -> Self {
        Self {
            regrade: true,
            graded_at: None,
        }
    }

    pub fn at(mut self, graded_at: DateTime<Utc>) -> Self {
        self.graded_at = Some(graded_at);
        self
    }
}

/// Caller-owned record of graded sessions.
#[derive(Debug, Default)]
pub struct GradeBook {
    graded: Mutex<HashMap<SessionId, ExamResult>>,
}

impl GradeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grade a session once. A second call fails with
    /// [`ExamError::SessionAlreadyGraded`] unless `options.regrade` is set.
    pub fn grade(
        &self,
        bank: &QuestionBank,
        session: &ExamSession,
        answers: &Answers,
        options: GradeOptions,
    ) -> Result<ExamResult, ExamError> {
        // Holding the lock across scoring keeps check-and-record atomic.
        let mut graded = self
            .graded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let previous = graded.contains_key(&session.id);
        if previous && !options.regrade {
            return Err(ExamError::SessionAlreadyGraded(session.id));
        }

        let graded_at = options.graded_at.unwrap_or_else(Utc::now);
        let mut result = score_session(bank, session, answers, graded_at)?;
        result.regraded = previous;

        tracing::info!(
            session = %session.id,
            candidate = %session.candidate,
            correct = result.correct_count,
            total = result.total_questions,
            percentage = result.percentage,
            award = %result.award,
            regraded = result.regraded,
            "session graded"
        );

        graded.insert(session.id, result.clone());
        Ok(result)
    }

    /// The latest result recorded for a session.
    pub fn result(&self, session: SessionId) -> Option<ExamResult> {
        self.graded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&session)
            .cloned()
    }

    pub fn is_graded(&self, session: SessionId) -> bool {
        self.graded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(&session)
    }

    pub fn len(&self) -> usize {
        self.graded
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
