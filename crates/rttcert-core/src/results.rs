//! Grading result types and the certification threshold table.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{CandidateId, CertificationTier, OptionLabel, QuestionId, SessionId};

/// Lower bound (inclusive, percent) for each award.
pub const FOUNDATION_THRESHOLD: u32 = 70;
pub const PRACTITIONER_THRESHOLD: u32 = 80;
pub const EXPERT_THRESHOLD: u32 = 90;

/// Outcome of an exam: a certification tier or a fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Award {
    Fail,
    Foundation,
    Practitioner,
    Expert,
}

impl Award {
    /// Map a score in basis points (hundredths of a percent) to an award.
    pub fn from_basis_points(bp: u32) -> Self {
        if bp >= EXPERT_THRESHOLD * 100 {
            Award::Expert
        } else if bp >= PRACTITIONER_THRESHOLD * 100 {
            Award::Practitioner
        } else if bp >= FOUNDATION_THRESHOLD * 100 {
            Award::Foundation
        } else {
            Award::Fail
        }
    }

    /// Map an arbitrary percentage to an award. 89.999 is still Practitioner.
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= EXPERT_THRESHOLD as f64 {
            Award::Expert
        } else if percentage >= PRACTITIONER_THRESHOLD as f64 {
            Award::Practitioner
        } else if percentage >= FOUNDATION_THRESHOLD as f64 {
            Award::Foundation
        } else {
            Award::Fail
        }
    }

    /// The certificate awarded, if any.
    pub fn tier(self) -> Option<CertificationTier> {
        match self {
            Award::Fail => None,
            Award::Foundation => Some(CertificationTier::Foundation),
            Award::Practitioner => Some(CertificationTier::Practitioner),
            Award::Expert => Some(CertificationTier::Expert),
        }
    }

    pub fn passed(self) -> bool {
        self != Award::Fail
    }
}

impl fmt::Display for Award {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Award::Fail => write!(f, "fail"),
            Award::Foundation => write!(f, "foundation"),
            Award::Practitioner => write!(f, "practitioner"),
            Award::Expert => write!(f, "expert"),
        }
    }
}

/// Score as basis points, floored: `correct * 10_000 / total`.
///
/// Flooring keeps the award monotone with the exact ratio, so 179/200
/// (89.5%) can never round up into the Expert band.
pub fn basis_points(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as u64 * 10_000) / total as u64) as u32
}

/// Grading of a single question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub question_id: QuestionId,
    /// What the candidate picked (None = unanswered).
    pub selected: Option<OptionLabel>,
    pub correct_option: OptionLabel,
    pub is_correct: bool,
}

/// Result of grading one exam session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub session_id: SessionId,
    pub candidate: CandidateId,
    pub tier_sat: CertificationTier,
    /// Per-question outcomes in exam order.
    pub outcomes: Vec<QuestionOutcome>,
    pub correct_count: usize,
    pub total_questions: usize,
    /// Percentage floored to two decimal places.
    pub percentage: f64,
    pub basis_points: u32,
    pub award: Award,
    pub graded_at: DateTime<Utc>,
    #[serde(default)]
    pub regraded: bool,
}

impl ExamResult {
    pub fn passed(&self) -> bool {
        self.award.passed()
    }

    pub fn unanswered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.selected.is_none()).count()
    }
}
