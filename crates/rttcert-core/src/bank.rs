//! The immutable question bank.
//!
//! A bank is built once from authored records, validated as a whole, and then
//! only read. It is `Send + Sync` and meant to be shared behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ExamError, IntegrityIssue};
use crate::model::{
    Category, Difficulty, ExamSession, OptionLabel, PublicQuestion, Question, QuestionId,
    QuestionRecord,
};

/// A (category, difficulty) partition of the bank.
pub type CellKey = (Category, Difficulty);

/// Bank metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Bumped on every additive update.
    #[serde(default = "default_version")]
    pub version: u32,
}

fn default_version() -> u32 {
    1
}

impl BankInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            version,
        }
    }
}

#[derive(Debug)]
pub struct QuestionBank {
    info: BankInfo,
    questions: Vec<Question>,
    index: HashMap<QuestionId, usize>,
    /// Question ids per cell, sorted so draws are reproducible.
    cells: BTreeMap<CellKey, Vec<QuestionId>>,
}

impl QuestionBank {
    /// Validate authored records and build the bank.
    ///
    /// Every problem is collected; the error lists all of them.
    pub fn from_records(info: BankInfo, records: Vec<QuestionRecord>) -> Result<Self, ExamError> {
        let mut issues = Vec::new();
        let mut questions = Vec::with_capacity(records.len());

        for record in records {
            match validate_record(record) {
                Ok(q) => questions.push(q),
                Err(mut problems) => issues.append(&mut problems),
            }
        }

        match Self::build(info, questions) {
            Ok(bank) if issues.is_empty() => Ok(bank),
            Ok(_) => Err(ExamError::BankIntegrity { issues }),
            Err(ExamError::BankIntegrity { issues: mut more }) => {
                issues.append(&mut more);
                Err(ExamError::BankIntegrity { issues })
            }
            Err(other) => Err(other),
        }
    }

    /// Build a bank from already-typed questions.
    pub fn from_questions(info: BankInfo, questions: Vec<Question>) -> Result<Self, ExamError> {
        let mut issues = Vec::new();
        for q in &questions {
            if q.id.as_str().trim().is_empty() {
                issues.push(IntegrityIssue::bank(format!(
                    "question with empty ID (prompt: {:?})",
                    truncate(&q.prompt, 40)
                )));
            }
            if q.prompt.trim().is_empty() {
                issues.push(IntegrityIssue::question(&q.id, "prompt is empty"));
            }
            if q.options.len() < 2 {
                issues.push(IntegrityIssue::question(&q.id, "needs at least two options"));
            }
            if q.options.len() > OptionLabel::MAX_OPTIONS {
                issues.push(IntegrityIssue::question(
                    &q.id,
                    format!("too many options ({})", q.options.len()),
                ));
            }
            if q.options.iter().any(|o| o.trim().is_empty()) {
                issues.push(IntegrityIssue::question(&q.id, "option text is empty"));
            }
            if q.correct.index() >= q.options.len() {
                issues.push(IntegrityIssue::question(
                    &q.id,
                    format!("correct option {} is out of range", q.correct),
                ));
            }
        }
        if !issues.is_empty() {
            return Err(ExamError::BankIntegrity { issues });
        }
        Self::build(info, questions)
    }

    fn build(info: BankInfo, questions: Vec<Question>) -> Result<Self, ExamError> {
        let mut issues = Vec::new();

        if questions.is_empty() {
            issues.push(IntegrityIssue::bank("bank contains no valid questions"));
        }

        let mut index = HashMap::with_capacity(questions.len());
        let mut cells: BTreeMap<CellKey, Vec<QuestionId>> = BTreeMap::new();
        for (i, q) in questions.iter().enumerate() {
            if index.insert(q.id.clone(), i).is_some() {
                issues.push(IntegrityIssue::question(
                    &q.id,
                    format!("duplicate question ID: {}", q.id),
                ));
                continue;
            }
            cells
                .entry((q.category, q.difficulty))
                .or_default()
                .push(q.id.clone());
        }

        let present: BTreeSet<Category> = cells.keys().map(|(c, _)| *c).collect();
        for category in &present {
            for difficulty in Difficulty::ALL {
                if !cells.contains_key(&(*category, difficulty)) {
                    issues.push(IntegrityIssue::bank(format!(
                        "category '{}' has no {difficulty} questions",
                        category.slug()
                    )));
                }
            }
        }

        if !issues.is_empty() {
            return Err(ExamError::BankIntegrity { issues });
        }

        for ids in cells.values_mut() {
            ids.sort();
        }

        tracing::debug!(
            bank = %info.id,
            version = info.version,
            questions = questions.len(),
            cells = cells.len(),
            "question bank loaded"
        );

        Ok(Self {
            info,
            questions,
            index,
            cells,
        })
    }

    pub fn info(&self) -> &BankInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn version(&self) -> u32 {
        self.info.version
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// All questions in authored order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn contains(&self, id: &QuestionId) -> bool {
        self.index.contains_key(id)
    }

    /// Look up a question by identifier.
    pub fn get(&self, id: &QuestionId) -> Result<&Question, ExamError> {
        self.index
            .get(id)
            .map(|&i| &self.questions[i])
            .ok_or_else(|| ExamError::NotFound(id.clone()))
    }

    /// Categories present in the bank, in canonical order.
    pub fn categories(&self) -> Vec<Category> {
        let set: BTreeSet<Category> = self.cells.keys().map(|(c, _)| *c).collect();
        set.into_iter().collect()
    }

    /// Sorted question ids in one cell (empty if the cell does not exist).
    pub fn cell(&self, category: Category, difficulty: Difficulty) -> &[QuestionId] {
        self.cells
            .get(&(category, difficulty))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate all cells in canonical order.
    pub fn cells(&self) -> impl Iterator<Item = (CellKey, &[QuestionId])> {
        self.cells.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    /// The answer-free paper for a session, in exam order.
    pub fn paper(&self, session: &ExamSession) -> Result<Vec<PublicQuestion>, ExamError> {
        session
            .questions
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let q = self.get(id)?;
                Ok(PublicQuestion {
                    number: i + 1,
                    id: q.id.clone(),
                    category: q.category,
                    difficulty: q.difficulty,
                    prompt: q.prompt.clone(),
                    options: q.labelled_options(),
                })
            })
            .collect()
    }
}

fn validate_record(record: QuestionRecord) -> Result<Question, Vec<IntegrityIssue>> {
    let id = QuestionId::new(record.id.trim());
    let mut issues = Vec::new();

    if id.as_str().is_empty() {
        issues.push(IntegrityIssue::bank(format!(
            "question with empty ID (prompt: {:?})",
            truncate(&record.prompt, 40)
        )));
    }

    let category = record
        .category
        .parse::<Category>()
        .map_err(|e| issues.push(IntegrityIssue::question(&id, e)))
        .ok();
    let difficulty = record
        .difficulty
        .parse::<Difficulty>()
        .map_err(|e| issues.push(IntegrityIssue::question(&id, e)))
        .ok();

    if record.prompt.trim().is_empty() {
        issues.push(IntegrityIssue::question(&id, "prompt is empty"));
    }

    if record.options.len() < 2 {
        issues.push(IntegrityIssue::question(
            &id,
            format!("needs at least two options, found {}", record.options.len()),
        ));
    }
    if record.options.len() > OptionLabel::MAX_OPTIONS {
        issues.push(IntegrityIssue::question(
            &id,
            format!("too many options ({})", record.options.len()),
        ));
    }
    if record.options.iter().any(|o| o.text.trim().is_empty()) {
        issues.push(IntegrityIssue::question(&id, "option text is empty"));
    }

    let correct: Vec<usize> = record
        .options
        .iter()
        .enumerate()
        .filter(|(_, o)| o.correct)
        .map(|(i, _)| i)
        .collect();
    let correct = match correct.as_slice() {
        [single] => OptionLabel::from_index(*single),
        [] => {
            issues.push(IntegrityIssue::question(&id, "no option is marked correct"));
            None
        }
        many => {
            issues.push(IntegrityIssue::question(
                &id,
                format!("{} options are marked correct, expected exactly one", many.len()),
            ));
            None
        }
    };

    match (category, difficulty, correct) {
        (Some(category), Some(difficulty), Some(correct)) if issues.is_empty() => Ok(Question {
            id,
            category,
            difficulty,
            topic: record.topic.trim().to_string(),
            prompt: record.prompt.trim().to_string(),
            options: record.options.into_iter().map(|o| o.text.trim().to_string()).collect(),
            correct,
            explanation: record
                .explanation
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty()),
        }),
        _ => Err(issues),
    }
}

fn truncate(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
