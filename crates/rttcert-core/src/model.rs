//! Core data model types for rttcert.
//!
//! Questions, their closed category/difficulty tags, certification tiers and
//! the exam session value object handed back to callers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable question identifier (e.g. `RTT-0042`). Never reused or renumbered.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifies the person sitting an exam.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A group of candidates sitting exams in the same period.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CohortId(String);

impl CohortId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CohortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exam session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Question difficulty tier, easiest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    fn rank(self) -> i32 {
        self as i32
    }

    /// The other difficulties ordered by distance from `self`, harder first on ties.
    ///
    /// `Medium` yields `[Hard, Easy, Expert]`.
    pub fn fallback_order(self) -> Vec<Difficulty> {
        let mut others: Vec<Difficulty> = Self::ALL.into_iter().filter(|d| *d != self).collect();
        others.sort_by_key(|d| ((d.rank() - self.rank()).abs(), -d.rank()));
        others
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
            Difficulty::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            "expert" => Ok(Difficulty::Expert),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Topic area a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    RttFundamentals,
    ClockStarts,
    ClockStops,
    PausesAndActiveMonitoring,
    CancerPathways,
    DataQualityAndValidation,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::RttFundamentals,
        Category::ClockStarts,
        Category::ClockStops,
        Category::PausesAndActiveMonitoring,
        Category::CancerPathways,
        Category::DataQualityAndValidation,
    ];

    /// Machine name used in bank files and config.
    pub fn slug(self) -> &'static str {
        match self {
            Category::RttFundamentals => "rtt-fundamentals",
            Category::ClockStarts => "clock-starts",
            Category::ClockStops => "clock-stops",
            Category::PausesAndActiveMonitoring => "pauses-and-active-monitoring",
            Category::CancerPathways => "cancer-pathways",
            Category::DataQualityAndValidation => "data-quality-and-validation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::RttFundamentals => "RTT Fundamentals",
            Category::ClockStarts => "Clock Starts",
            Category::ClockStops => "Clock Stops",
            Category::PausesAndActiveMonitoring => "Pauses & Active Monitoring",
            Category::CancerPathways => "Cancer Pathways",
            Category::DataQualityAndValidation => "Data Quality & Validation",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', ' '], "-");
        Category::ALL
            .into_iter()
            .find(|c| c.slug() == normalized)
            .ok_or_else(|| format!("unknown category: {}", s.trim()))
    }
}

/// Certification level an exam is set at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificationTier {
    Foundation,
    Practitioner,
    Expert,
}

impl CertificationTier {
    pub const ALL: [CertificationTier; 3] = [
        CertificationTier::Foundation,
        CertificationTier::Practitioner,
        CertificationTier::Expert,
    ];
}

impl fmt::Display for CertificationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertificationTier::Foundation => write!(f, "foundation"),
            CertificationTier::Practitioner => write!(f, "practitioner"),
            CertificationTier::Expert => write!(f, "expert"),
        }
    }
}

impl FromStr for CertificationTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "foundation" => Ok(CertificationTier::Foundation),
            "practitioner" => Ok(CertificationTier::Practitioner),
            "expert" => Ok(CertificationTier::Expert),
            other => Err(format!("unknown certification tier: {other}")),
        }
    }
}

/// Position-derived label of an answer option: `A` is index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OptionLabel(u8);

impl OptionLabel {
    /// Labels run `A`..=`Z`.
    pub const MAX_OPTIONS: usize = 26;

    pub fn from_index(index: usize) -> Option<Self> {
        (index < Self::MAX_OPTIONS).then(|| Self(index as u8))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn letter(self) -> char {
        (b'A' + self.0) as char
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for OptionLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => {
                Ok(Self(c.to_ascii_uppercase() as u8 - b'A'))
            }
            _ => Err(format!("invalid option label: {trimmed:?}")),
        }
    }
}

impl TryFrom<String> for OptionLabel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OptionLabel> for String {
    fn from(label: OptionLabel) -> Self {
        label.to_string()
    }
}

/// A question as authored in a bank file, before validation.
///
/// Category and difficulty stay strings here; they are checked against the
/// closed enums when the bank is built, so a typo becomes an integrity error
/// instead of an unreachable cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub id: String,
    pub category: String,
    pub difficulty: String,
    /// RTT topic tag, e.g. "RTT code 10".
    #[serde(default)]
    pub topic: String,
    pub prompt: String,
    #[serde(default)]
    pub options: Vec<OptionRecord>,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// One authored answer option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionRecord {
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

/// A validated, immutable exam question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub topic: String,
    pub prompt: String,
    /// Option texts; the label of each is derived from its position.
    pub options: Vec<String>,
    pub correct: OptionLabel,
    pub explanation: Option<String>,
}

impl Question {
    /// Whether `label` names the correct option.
    pub fn is_correct(&self, label: OptionLabel) -> bool {
        label == self.correct
    }

    pub fn labelled_options(&self) -> Vec<LabelledOption> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(i, text)| {
                OptionLabel::from_index(i).map(|label| LabelledOption {
                    label,
                    text: text.clone(),
                })
            })
            .collect()
    }
}

/// Option text paired with its label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelledOption {
    pub label: OptionLabel,
    pub text: String,
}

/// Question view handed to candidates: no correct option, no explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicQuestion {
    pub number: usize,
    pub id: QuestionId,
    pub category: Category,
    pub difficulty: Difficulty,
    pub prompt: String,
    pub options: Vec<LabelledOption>,
}

/// A candidate's submitted answers.
pub type Answers = BTreeMap<QuestionId, OptionLabel>;

/// A cell draw that had to be served from another cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellFallback {
    pub category: Category,
    pub difficulty: Difficulty,
    pub from_category: Category,
    pub from_difficulty: Difficulty,
    pub count: usize,
}

/// Everything needed to reproduce and audit a draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRecord {
    /// Seed the draw RNG was built from (recorded even when chosen from entropy).
    pub rng_seed: u64,
    #[serde(default)]
    pub cohort_seed: Option<u64>,
    /// Number of excluded ids supplied by the caller that exist in the bank.
    #[serde(default)]
    pub excluded: usize,
    /// Excluded questions that were drawn anyway to keep the exam balanced.
    #[serde(default)]
    pub relaxed_exclusions: usize,
    #[serde(default)]
    pub fallbacks: Vec<CellFallback>,
}

/// One candidate's generated attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamSession {
    pub id: SessionId,
    pub candidate: CandidateId,
    #[serde(default)]
    pub cohort: Option<CohortId>,
    pub tier: CertificationTier,
    pub generated_at: DateTime<Utc>,
    pub bank_id: String,
    pub bank_version: u32,
    /// Questions in exam order.
    pub questions: Vec<QuestionId>,
    pub draw: DrawRecord,
    /// The session this one replaces when the candidate retakes.
    #[serde(default)]
    pub supersedes: Option<SessionId>,
}

impl ExamSession {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn contains(&self, id: &QuestionId) -> bool {
        self.questions.contains(id)
    }
}
