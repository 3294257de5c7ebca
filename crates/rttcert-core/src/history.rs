//! Attempt history: which questions each candidate and cohort has already seen.
//!
//! The history is append-only. Exclusions are computed from it before a draw
//! and the new attempt is appended after; two simultaneous starts for the same
//! candidate can therefore both miss each other's questions. Anti-duplication
//! is probabilistic, so that window is accepted.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{CandidateId, CohortId, ExamSession, QuestionId, SessionId};

/// One issued exam, as remembered for exclusion purposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub session_id: SessionId,
    pub candidate: CandidateId,
    pub cohort: Option<CohortId>,
    pub issued_at: DateTime<Utc>,
    pub questions: Vec<QuestionId>,
}

impl From<&ExamSession> for AttemptRecord {
    fn from(session: &ExamSession) -> Self {
        Self {
            session_id: session.id,
            candidate: session.candidate.clone(),
            cohort: session.cohort.clone(),
            issued_at: session.generated_at,
            questions: session.questions.clone(),
        }
    }
}

/// Storage for issued attempts.
#[async_trait]
pub trait AttemptHistory: Send + Sync {
    /// The candidate's most recent attempts across every cohort, newest first.
    async fn recent_attempts(&self, candidate: &CandidateId, limit: usize) -> Vec<AttemptRecord>;

    /// The candidate's attempts within one cohort, oldest first.
    async fn cohort_attempts(&self, candidate: &CandidateId, cohort: Option<&CohortId>) -> Vec<AttemptRecord>;

    /// Every question issued to anyone in the cohort.
    async fn cohort_questions(&self, cohort: &CohortId) -> HashSet<QuestionId>;

    /// The candidate's latest session across all cohorts.
    async fn latest_session(&self, candidate: &CandidateId) -> Option<SessionId>;

    /// Record an issued attempt.
    async fn append(&self, record: AttemptRecord);
}

type AttemptKey = (Option<CohortId>, CandidateId);

#[derive(Debug, Default)]
struct HistoryState {
    /// Attempts per (cohort, candidate), oldest first.
    attempts: HashMap<AttemptKey, Vec<AttemptRecord>>,
    cohort_questions: HashMap<CohortId, HashSet<QuestionId>>,
    latest: HashMap<CandidateId, (DateTime<Utc>, SessionId)>,
}

/// Process-local history guarded by a single `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    state: RwLock<HistoryState>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts recorded.
    pub async fn len(&self) -> usize {
        self.state.read().await.attempts.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AttemptHistory for InMemoryHistory {
    async fn recent_attempts(&self, candidate: &CandidateId, limit: usize) -> Vec<AttemptRecord> {
        let state = self.state.read().await;
        let mut records: Vec<AttemptRecord> = state
            .attempts
            .iter()
            .filter(|((_, c), _)| c == candidate)
            .flat_map(|(_, records)| records.iter().cloned())
            .collect();
        records.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        records.truncate(limit);
        records
    }

    async fn cohort_attempts(&self, candidate: &CandidateId, cohort: Option<&CohortId>) -> Vec<AttemptRecord> {
        let key = (cohort.cloned(), candidate.clone());
        self.state
            .read()
            .await
            .attempts
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    async fn cohort_questions(&self, cohort: &CohortId) -> HashSet<QuestionId> {
        self.state
            .read()
            .await
            .cohort_questions
            .get(cohort)
            .cloned()
            .unwrap_or_default()
    }

    async fn latest_session(&self, candidate: &CandidateId) -> Option<SessionId> {
        self.state
            .read()
            .await
            .latest
            .get(candidate)
            .map(|(_, id)| *id)
    }

    async fn append(&self, record: AttemptRecord) {
        let mut state = self.state.write().await;
        if let Some(cohort) = &record.cohort {
            state
                .cohort_questions
                .entry(cohort.clone())
                .or_default()
                .extend(record.questions.iter().cloned());
        }
        let newer = state
            .latest
            .get(&record.candidate)
            .map_or(true, |(at, _)| record.issued_at >= *at);
        if newer {
            state
                .latest
                .insert(record.candidate.clone(), (record.issued_at, record.session_id));
        }
        let key = (record.cohort.clone(), record.candidate.clone());
        let attempts = state.attempts.entry(key).or_default();
        let pos = attempts.partition_point(|r| r.issued_at <= record.issued_at);
        attempts.insert(pos, record);
    }
}

/// How far back exclusions reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Number of most recent attempts whose questions are excluded.
    pub attempts: usize,
    /// Attempts older than this are ignored.
    pub window: Duration,
    /// Also exclude everything already issued to the candidate's cohort.
    pub include_cohort: bool,
}

impl Default for CooldownPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            window: Duration::days(180),
            include_cohort: true,
        }
    }
}

/// Build the excluded-id set for a new attempt.
///
/// The candidate's own cooldown spans every cohort; `cohort` only adds the
/// questions already issued to its members.
pub async fn exclusions_for(
    history: &dyn AttemptHistory,
    candidate: &CandidateId,
    cohort: Option<&CohortId>,
    policy: &CooldownPolicy,
    now: DateTime<Utc>,
) -> HashSet<QuestionId> {
    let cutoff = now - policy.window;
    let mut excluded: HashSet<QuestionId> = history
        .recent_attempts(candidate, policy.attempts)
        .await
        .into_iter()
        .filter(|r| r.issued_at >= cutoff)
        .flat_map(|r| r.questions)
        .collect();

    if policy.include_cohort {
        if let Some(cohort) = cohort {
            excluded.extend(history.cohort_questions(cohort).await);
        }
    }
    excluded
}
