//! Exam engine error types.
//!
//! Every failure the core can report to its caller. Edge code (file parsing,
//! config, CLI) wraps these in `anyhow::Error`, so callers can still
//! `downcast_ref::<ExamError>()` to branch on the variant.

use std::fmt;

use thiserror::Error;

use crate::model::{QuestionId, SessionId};

/// A single problem found while checking a question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityIssue {
    /// The question the problem belongs to (if applicable).
    pub question_id: Option<QuestionId>,
    /// Problem description.
    pub message: String,
}

impl IntegrityIssue {
    pub fn bank(message: impl Into<String>) -> Self {
        Self {
            question_id: None,
            message: message.into(),
        }
    }

    pub fn question(id: &QuestionId, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.clone()),
            message: message.into(),
        }
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.question_id {
            Some(id) => write!(f, "[{id}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Errors surfaced by the bank, selector and scorer.
#[derive(Debug, Error)]
pub enum ExamError {
    /// The bank is malformed. Fatal at load time.
    #[error("question bank failed integrity check ({} problem(s)): {}", .issues.len(), summarize(.issues))]
    BankIntegrity { issues: Vec<IntegrityIssue> },

    /// A question identifier is not in the bank.
    #[error("question not found: {0}")]
    NotFound(QuestionId),

    /// The bank cannot supply the requested exam.
    #[error("insufficient questions: requested {requested}, only {available} available")]
    InsufficientQuestions { requested: usize, available: usize },

    /// The session was already graded and no regrade was requested.
    #[error("session {0} has already been graded")]
    SessionAlreadyGraded(SessionId),

    /// The request itself is unusable (zero count, empty session, bad weights).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ExamError {
    /// Returns `true` if the caller can recover by changing its request,
    /// e.g. relaxing exclusions or asking for fewer questions.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ExamError::InsufficientQuestions { .. })
    }

    /// The integrity problems, if this is a `BankIntegrity` error.
    pub fn issues(&self) -> &[IntegrityIssue] {
        match self {
            ExamError::BankIntegrity { issues } => issues,
            _ => &[],
        }
    }
}

fn summarize(issues: &[IntegrityIssue]) -> String {
    const SHOWN: usize = 3;
    let mut parts: Vec<String> = issues.iter().take(SHOWN).map(|i| i.to_string()).collect();
    if issues.len() > SHOWN {
        parts.push(format!("and {} more", issues.len() - SHOWN));
    }
    parts.join("; ")
}
