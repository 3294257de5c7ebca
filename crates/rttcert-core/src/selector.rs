//! Balanced, randomized question selection.
//!
//! `select` splits the exam across (category, difficulty) cells with
//! [`apportion`], shuffles each cell with a seeded RNG and draws without
//! replacement. Shortfalls are served according to the [`ExclusionPolicy`].
//!
//! ## RNG ordering
//!
//! Cells are shuffled in canonical order (category, then difficulty), fresh
//! questions before excluded ones, and the final exam order is one last
//! shuffle. Reordering any of these calls changes every seeded draw.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::bank::{CellKey, QuestionBank};
use crate::distribution::{apportion, CellPlan, TierProfile};
use crate::error::ExamError;
use crate::model::{CellFallback, CertificationTier, DrawRecord, QuestionId};

/// What to do when a cell runs short because of excluded questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExclusionPolicy {
    /// Keep the exam balanced: reuse excluded questions from the same cell
    /// before borrowing from other cells.
    #[default]
    BestEffort,
    /// Never draw an excluded question; borrow from other cells instead and
    /// fail if the bank runs dry.
    Strict,
}

/// Inputs to one draw. All context is explicit; nothing is read from ambient state.
#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub tier: CertificationTier,
    /// Total questions in the exam.
    pub count: usize,
    /// Questions the candidate (or cohort) has recently seen.
    pub excluded: HashSet<QuestionId>,
    /// Partitions every cell per cohort so different cohorts favour different questions.
    pub cohort_seed: Option<u64>,
    /// Seed for the draw. `None` picks one from entropy (and records it).
    pub rng_seed: Option<u64>,
    /// Overrides the tier's default distribution.
    pub profile: Option<TierProfile>,
    pub policy: ExclusionPolicy,
}

impl SelectionRequest {
    pub fn new(tier: CertificationTier, count: usize) -> Self {
        Self {
            tier,
            count,
            excluded: HashSet::new(),
            cohort_seed: None,
            rng_seed: None,
            profile: None,
            policy: ExclusionPolicy::default(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_cohort_seed(mut self, seed: u64) -> Self {
        self.cohort_seed = Some(seed);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = QuestionId>) -> Self {
        self.excluded.extend(ids);
        self
    }

    pub fn with_profile(mut self, profile: TierProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_policy(mut self, policy: ExclusionPolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// The drawn exam plus everything needed to audit it.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Questions in exam order.
    pub questions: Vec<QuestionId>,
    pub draw: DrawRecord,
    pub plan: CellPlan,
}

#[derive(Default)]
struct CellPool {
    fresh: VecDeque<QuestionId>,
    stale: VecDeque<QuestionId>,
}

fn take(pool: &mut VecDeque<QuestionId>, n: usize, into: &mut Vec<QuestionId>) -> usize {
    let n = n.min(pool.len());
    into.extend(pool.drain(..n));
    n
}

/// Draw a balanced exam from `bank`.
pub fn select(bank: &QuestionBank, request: &SelectionRequest) -> Result<Selection, ExamError> {
    let count = request.count;
    if count == 0 {
        return Err(ExamError::InvalidRequest("exam must have at least one question".into()));
    }
    if count > bank.len() {
        return Err(ExamError::InsufficientQuestions {
            requested: count,
            available: bank.len(),
        });
    }

    let excluded: HashSet<&QuestionId> = request
        .excluded
        .iter()
        .filter(|id| bank.contains(id))
        .collect();
    if request.policy == ExclusionPolicy::Strict && count > bank.len() - excluded.len() {
        return Err(ExamError::InsufficientQuestions {
            requested: count,
            available: bank.len() - excluded.len(),
        });
    }

    let profile = request
        .profile
        .clone()
        .unwrap_or_else(|| TierProfile::default_for(request.tier));
    let plan = apportion(&bank.categories(), &profile, count)?;

    let seed = request
        .rng_seed
        .unwrap_or_else(|| StdRng::from_entropy().next_u64());
    let mut rng = StdRng::seed_from_u64(seed);

    let mut pools: BTreeMap<CellKey, CellPool> = BTreeMap::new();
    for (key, ids) in bank.cells() {
        let (mut fresh, mut stale): (Vec<QuestionId>, Vec<QuestionId>) =
            ids.iter().cloned().partition(|id| !excluded.contains(id));

        let fresh = match request.cohort_seed {
            Some(cohort_seed) => {
                let primary = cohort_primary_share(cohort_seed, key, ids);
                let (mut first, mut second): (Vec<QuestionId>, Vec<QuestionId>) =
                    fresh.into_iter().partition(|id| primary.contains(id));
                first.shuffle(&mut rng);
                second.shuffle(&mut rng);
                first.extend(second);
                first
            }
            None => {
                fresh.shuffle(&mut rng);
                fresh
            }
        };
        stale.shuffle(&mut rng);

        pools.insert(
            key,
            CellPool {
                fresh: fresh.into(),
                stale: stale.into(),
            },
        );
    }

    let mut drawn: Vec<QuestionId> = Vec::with_capacity(count);
    let mut relaxed = 0usize;
    let mut shortfalls: Vec<(CellKey, usize)> = Vec::new();

    for cell in &plan.cells {
        if cell.target == 0 {
            continue;
        }
        let key = cell.key();
        let pool = pools.entry(key).or_default();
        let mut got = take(&mut pool.fresh, cell.target, &mut drawn);
        if got < cell.target && request.policy == ExclusionPolicy::BestEffort {
            let reused = take(&mut pool.stale, cell.target - got, &mut drawn);
            relaxed += reused;
            got += reused;
        }
        tracing::debug!(
            category = %key.0,
            difficulty = %key.1,
            target = cell.target,
            drawn = got,
            "cell drawn"
        );
        if got < cell.target {
            shortfalls.push((key, cell.target - got));
        }
    }

    let mut fallbacks = Vec::new();
    for (key, mut missing) in shortfalls {
        let donors = donor_order(key, &pools);
        let mut passes = vec![false];
        if request.policy == ExclusionPolicy::BestEffort {
            passes.push(true);
        }
        for use_stale in passes {
            for donor in &donors {
                if missing == 0 {
                    break;
                }
                let Some(pool) = pools.get_mut(donor) else {
                    continue;
                };
                let source = if use_stale { &mut pool.stale } else { &mut pool.fresh };
                let got = take(source, missing, &mut drawn);
                if got == 0 {
                    continue;
                }
                if use_stale {
                    relaxed += got;
                }
                missing -= got;
                fallbacks.push(CellFallback {
                    category: key.0,
                    difficulty: key.1,
                    from_category: donor.0,
                    from_difficulty: donor.1,
                    count: got,
                });
            }
        }
        if missing > 0 {
            return Err(ExamError::InsufficientQuestions {
                requested: count,
                available: drawn.len(),
            });
        }
    }

    if relaxed > 0 {
        tracing::warn!(
            relaxed,
            excluded = excluded.len(),
            "reused excluded questions to keep the exam balanced"
        );
    }
    if !fallbacks.is_empty() {
        tracing::warn!(
            fallbacks = fallbacks.len(),
            "some cells were served from neighbouring cells"
        );
    }

    drawn.shuffle(&mut rng);

    Ok(Selection {
        questions: drawn,
        draw: DrawRecord {
            rng_seed: seed,
            cohort_seed: request.cohort_seed,
            excluded: excluded.len(),
            relaxed_exclusions: relaxed,
            fallbacks,
        },
        plan,
    })
}

/// Cells to borrow from when `key` runs short: same category by nearest
/// difficulty first, then every other category (same difficulty first).
fn donor_order(key: CellKey, pools: &BTreeMap<CellKey, CellPool>) -> Vec<CellKey> {
    let (category, difficulty) = key;
    let mut order: Vec<CellKey> = difficulty
        .fallback_order()
        .into_iter()
        .map(|d| (category, d))
        .collect();

    let mut difficulties = vec![difficulty];
    difficulties.extend(difficulty.fallback_order());
    let others: Vec<_> = {
        let mut cats: Vec<_> = pools.keys().map(|(c, _)| *c).filter(|c| *c != category).collect();
        cats.dedup();
        cats
    };
    for other in others {
        order.extend(difficulties.iter().map(|&d| (other, d)));
    }
    order.retain(|k| pools.contains_key(k));
    order
}

/// The half of a cell a cohort draws from first.
///
/// Depends only on the cohort seed, the cell and its (sorted) contents, so
/// every candidate of a cohort shares the same preference.
fn cohort_primary_share(cohort_seed: u64, key: CellKey, ids: &[QuestionId]) -> HashSet<QuestionId> {
    let salt = (((key.0 as u64) << 8) | key.1 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut rng = StdRng::seed_from_u64(cohort_seed ^ salt);
    let mut ranked = ids.to_vec();
    ranked.shuffle(&mut rng);
    let share = ids.len().div_ceil(2);
    ranked.into_iter().take(share).collect()
}
