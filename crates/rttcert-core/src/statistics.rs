//! Bank coverage, per-category results and cross-session overlap.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::bank::QuestionBank;
use crate::error::ExamError;
use crate::model::{Category, Difficulty, ExamSession, QuestionId, SessionId};
use crate::results::{basis_points, ExamResult};

/// Question counts per cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankCoverage {
    pub bank_id: String,
    pub version: u32,
    pub total: usize,
    /// Rows in canonical category order; columns follow [`Difficulty::ALL`].
    pub rows: Vec<CoverageRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageRow {
    pub category: Category,
    pub counts: [usize; 4],
}

impl CoverageRow {
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    pub fn count(&self, difficulty: Difficulty) -> usize {
        self.counts[difficulty as usize]
    }
}

impl BankCoverage {
    /// Smallest cell in the bank.
    pub fn thinnest_cell(&self) -> Option<(Category, Difficulty, usize)> {
        self.rows
            .iter()
            .flat_map(|row| {
                Difficulty::ALL
                    .into_iter()
                    .map(move |d| (row.category, d, row.count(d)))
            })
            .min_by_key(|(_, _, n)| *n)
    }

    /// Column totals per difficulty.
    pub fn difficulty_totals(&self) -> [usize; 4] {
        let mut totals = [0; 4];
        for row in &self.rows {
            for (t, c) in totals.iter_mut().zip(row.counts) {
                *t += c;
            }
        }
        totals
    }
}

pub fn bank_coverage(bank: &QuestionBank) -> BankCoverage {
    let rows = bank
        .categories()
        .into_iter()
        .map(|category| {
            let mut counts = [0; 4];
            for difficulty in Difficulty::ALL {
                counts[difficulty as usize] = bank.cell(category, difficulty).len();
            }
            CoverageRow { category, counts }
        })
        .collect();

    BankCoverage {
        bank_id: bank.id().to_string(),
        version: bank.version(),
        total: bank.len(),
        rows,
    }
}

/// Correct answers in one category of a graded exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: Category,
    pub correct: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Per-category breakdown of a result, in canonical category order.
pub fn category_breakdown(
    bank: &QuestionBank,
    result: &ExamResult,
) -> Result<Vec<CategoryScore>, ExamError> {
    let mut tally: BTreeMap<Category, (usize, usize)> = BTreeMap::new();
    for outcome in &result.outcomes {
        let question = bank.get(&outcome.question_id)?;
        let entry = tally.entry(question.category).or_default();
        entry.1 += 1;
        if outcome.is_correct {
            entry.0 += 1;
        }
    }

    Ok(tally
        .into_iter()
        .map(|(category, (correct, total))| CategoryScore {
            category,
            correct,
            total,
            percentage: f64::from(basis_points(correct, total)) / 100.0,
        })
        .collect())
}

/// Pairwise overlap between issued sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapStats {
    pub sessions: usize,
    pub pairs: usize,
    /// Largest Jaccard similarity seen between two sessions.
    pub max_jaccard: f64,
    pub mean_jaccard: f64,
    /// Pairs with exactly the same question set.
    pub identical_pairs: usize,
    /// The pair behind `max_jaccard`.
    pub most_similar: Option<(SessionId, SessionId)>,
}

fn jaccard(a: &HashSet<&QuestionId>, b: &HashSet<&QuestionId>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Compare every pair of sessions by their question sets.
pub fn overlap_stats(sessions: &[ExamSession]) -> OverlapStats {
    let sets: Vec<HashSet<&QuestionId>> = sessions
        .iter()
        .map(|s| s.questions.iter().collect())
        .collect();

    let mut pairs = 0;
    let mut sum = 0.0;
    let mut max_jaccard = 0.0;
    let mut identical_pairs = 0;
    let mut most_similar = None;

    for i in 0..sets.len() {
        for j in (i + 1)..sets.len() {
            let similarity = jaccard(&sets[i], &sets[j]);
            pairs += 1;
            sum += similarity;
            if sets[i] == sets[j] {
                identical_pairs += 1;
            }
            if most_similar.is_none() || similarity > max_jaccard {
                max_jaccard = similarity;
                most_similar = Some((sessions[i].id, sessions[j].id));
            }
        }
    }

    OverlapStats {
        sessions: sessions.len(),
        pairs,
        max_jaccard,
        mean_jaccard: if pairs == 0 { 0.0 } else { sum / pairs as f64 },
        identical_pairs,
        most_similar,
    }
}
