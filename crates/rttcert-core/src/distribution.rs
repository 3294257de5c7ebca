//! Per-tier target distributions and the apportionment of an exam's question
//! count into (category, difficulty) cells.
//!
//! All quota arithmetic is done on integers: the exact target of a cell is
//! `count * cw * dw / (sum_cw * sum_dw)`, kept as a numerator over a shared
//! denominator so the split never depends on float rounding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bank::CellKey;
use crate::error::ExamError;
use crate::model::{Category, CertificationTier, Difficulty};

/// Weighting used to balance an exam for one certification tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProfile {
    /// Relative weight per difficulty. Missing entries weigh zero.
    pub difficulty_weights: BTreeMap<Difficulty, u32>,
    /// Relative weight per category. Empty means equal weights for every
    /// category present in the bank.
    #[serde(default)]
    pub category_weights: BTreeMap<Category, u32>,
}

impl TierProfile {
    pub fn new(easy: u32, medium: u32, hard: u32, expert: u32) -> Self {
        let difficulty_weights = Difficulty::ALL.into_iter().zip([easy, medium, hard, expert]).collect();
        Self {
            difficulty_weights,
            category_weights: BTreeMap::new(),
        }
    }

    /// Foundation exams skew easy/medium; expert exams skew hard/expert.
    pub fn default_for(tier: CertificationTier) -> Self {
        match tier {
            CertificationTier::Foundation => Self::new(40, 40, 15, 5),
            CertificationTier::Practitioner => Self::new(20, 40, 30, 10),
            CertificationTier::Expert => Self::new(10, 20, 40, 30),
        }
    }

    pub fn with_category_weight(mut self, category: Category, weight: u32) -> Self {
        self.category_weights.insert(category, weight);
        self
    }

    pub fn difficulty_weight(&self, difficulty: Difficulty) -> u32 {
        self.difficulty_weights.get(&difficulty).copied().unwrap_or(0)
    }

    fn category_weight(&self, category: Category) -> u32 {
        if self.category_weights.is_empty() {
            1
        } else {
            self.category_weights.get(&category).copied().unwrap_or(0)
        }
    }
}

/// Planned number of questions for one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTarget {
    pub category: Category,
    pub difficulty: Difficulty,
    /// Integer number of questions to draw.
    pub target: usize,
    /// Exact (fractional) target, for reporting and tolerance checks.
    pub exact: f64,
}

impl CellTarget {
    pub fn key(&self) -> CellKey {
        (self.category, self.difficulty)
    }
}

/// The full split of an exam across cells, in canonical cell order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellPlan {
    pub count: usize,
    pub cells: Vec<CellTarget>,
}

impl CellPlan {
    pub fn target(&self, category: Category, difficulty: Difficulty) -> usize {
        self.cells
            .iter()
            .find(|c| c.category == category && c.difficulty == difficulty)
            .map(|c| c.target)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.cells.iter().map(|c| c.target).sum()
    }
}

/// Split `count` questions across the cells of `categories`.
///
/// Every cell gets the floor of its exact target. The leftover units go one
/// each to cells that were rounded down, largest exact target first (ties:
/// larger remainder, then canonical order), so each cell ends within ±1 of
/// its exact target and the plan sums to `count`.
pub fn apportion(
    categories: &[Category],
    profile: &TierProfile,
    count: usize,
) -> Result<CellPlan, ExamError> {
    let cat_weights: Vec<(Category, u128)> = categories
        .iter()
        .map(|&c| (c, profile.category_weight(c) as u128))
        .collect();
    let diff_weights: Vec<(Difficulty, u128)> = Difficulty::ALL
        .into_iter()
        .map(|d| (d, profile.difficulty_weight(d) as u128))
        .collect();

    let cat_sum: u128 = cat_weights.iter().map(|(_, w)| w).sum();
    let diff_sum: u128 = diff_weights.iter().map(|(_, w)| w).sum();
    if cat_sum == 0 {
        return Err(ExamError::InvalidRequest(
            "tier profile gives zero weight to every category in the bank".into(),
        ));
    }
    if diff_sum == 0 {
        return Err(ExamError::InvalidRequest(
            "tier profile gives zero weight to every difficulty".into(),
        ));
    }

    let denominator = cat_sum * diff_sum;
    let count_wide = count as u128;

    struct Quota {
        key: CellKey,
        numerator: u128,
        floor: usize,
        remainder: u128,
    }

    let mut quotas: Vec<Quota> = Vec::with_capacity(cat_weights.len() * diff_weights.len());
    for &(category, cw) in &cat_weights {
        for &(difficulty, dw) in &diff_weights {
            let numerator = count_wide * cw * dw;
            quotas.push(Quota {
                key: (category, difficulty),
                numerator,
                floor: (numerator / denominator) as usize,
                remainder: numerator % denominator,
            });
        }
    }

    let assigned: usize = quotas.iter().map(|q| q.floor).sum();
    let leftover = count - assigned;

    let mut order: Vec<usize> = (0..quotas.len()).filter(|&i| quotas[i].remainder > 0).collect();
    order.sort_by(|&a, &b| {
        quotas[b]
            .numerator
            .cmp(&quotas[a].numerator)
            .then(quotas[b].remainder.cmp(&quotas[a].remainder))
            .then(a.cmp(&b))
    });

    let mut targets: Vec<usize> = quotas.iter().map(|q| q.floor).collect();
    for &i in order.iter().take(leftover) {
        targets[i] += 1;
    }

    let cells = quotas
        .iter()
        .zip(targets)
        .map(|(q, target)| CellTarget {
            category: q.key.0,
            difficulty: q.key.1,
            target,
            exact: q.numerator as f64 / denominator as f64,
        })
        .collect();

    Ok(CellPlan { count, cells })
}
