//! Exam engine orchestrator.
//!
//! Ties the bank, attempt history and selector together: builds exclusions,
//! draws, stamps sessions and records them. Whole cohorts are issued
//! concurrently with bounded parallelism.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;

use crate::bank::QuestionBank;
use crate::distribution::TierProfile;
use crate::error::ExamError;
use crate::history::{exclusions_for, AttemptHistory, AttemptRecord, CooldownPolicy};
use crate::model::{Answers, CandidateId, CertificationTier, CohortId, ExamSession, SessionId};
use crate::results::ExamResult;
use crate::scorer::{GradeBook, GradeOptions};
use crate::selector::{select, ExclusionPolicy, SelectionRequest};

/// Configuration for the exam engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Exam length when a request does not say.
    pub questions_per_exam: usize,
    pub policy: ExclusionPolicy,
    pub cooldown: CooldownPolicy,
    /// Maximum concurrent issues in `start_cohort`.
    pub parallelism: usize,
    /// Per-tier overrides of the default distribution.
    pub profiles: BTreeMap<CertificationTier, TierProfile>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            questions_per_exam: 100,
            policy: ExclusionPolicy::default(),
            cooldown: CooldownPolicy::default(),
            parallelism: 4,
            profiles: BTreeMap::new(),
        }
    }
}

/// A request to issue one exam.
#[derive(Debug, Clone)]
pub struct StartExam {
    pub candidate: CandidateId,
    pub cohort: Option<CohortId>,
    pub tier: CertificationTier,
    /// Overrides `EngineConfig::questions_per_exam`.
    pub count: Option<usize>,
    pub rng_seed: Option<u64>,
    /// Overrides the seed derived from the cohort id.
    pub cohort_seed: Option<u64>,
}

impl StartExam {
    pub fn new(candidate: CandidateId, tier: CertificationTier) -> Self {
        Self {
            candidate,
            cohort: None,
            tier,
            count: None,
            rng_seed: None,
            cohort_seed: None,
        }
    }

    pub fn in_cohort(mut self, cohort: CohortId) -> Self {
        self.cohort = Some(cohort);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub fn with_cohort_seed(mut self, seed: u64) -> Self {
        self.cohort_seed = Some(seed);
        self
    }
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_issue_start(&self, candidate: &CandidateId);
    fn on_issued(&self, session: &ExamSession);
    fn on_issue_error(&self, candidate: &CandidateId, error: &ExamError);
    fn on_cohort_complete(&self, total: usize, issued: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_issue_start(&self, _: &CandidateId) {}
    fn on_issued(&self, _: &ExamSession) {}
    fn on_issue_error(&self, _: &CandidateId, _: &ExamError) {}
    fn on_cohort_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// Outcome of issuing a batch of exams.
#[derive(Debug)]
pub struct CohortIssue {
    /// Issued sessions, ordered by candidate.
    pub sessions: Vec<ExamSession>,
    /// Candidates whose exam could not be issued.
    pub failures: Vec<(CandidateId, ExamError)>,
    pub duration_ms: u64,
}

/// The central exam engine.
pub struct ExamEngine {
    bank: Arc<QuestionBank>,
    history: Arc<dyn AttemptHistory>,
    grades: GradeBook,
    config: EngineConfig,
}

impl ExamEngine {
    pub fn new(bank: Arc<QuestionBank>, history: Arc<dyn AttemptHistory>, config: EngineConfig) -> Self {
        Self {
            bank,
            history,
            grades: GradeBook::new(),
            config,
        }
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn grades(&self) -> &GradeBook {
        &self.grades
    }

    /// Issue one exam. Nothing is recorded when selection fails.
    pub async fn start_exam(&self, request: StartExam) -> Result<ExamSession, ExamError> {
        let now = Utc::now();
        let excluded = exclusions_for(
            self.history.as_ref(),
            &request.candidate,
            request.cohort.as_ref(),
            &self.config.cooldown,
            now,
        )
        .await;

        let mut selection_request = SelectionRequest::new(
            request.tier,
            request.count.unwrap_or(self.config.questions_per_exam),
        )
        .excluding(excluded)
        .with_policy(self.config.policy);
        if let Some(profile) = self.config.profiles.get(&request.tier) {
            selection_request = selection_request.with_profile(profile.clone());
        }
        if let Some(seed) = request.rng_seed {
            selection_request = selection_request.with_seed(seed);
        }
        if let Some(seed) = request
            .cohort_seed
            .or_else(|| request.cohort.as_ref().map(cohort_seed_for))
        {
            selection_request = selection_request.with_cohort_seed(seed);
        }

        let selection = select(&self.bank, &selection_request)?;
        let supersedes = self.history.latest_session(&request.candidate).await;

        let session = ExamSession {
            id: SessionId::new_v4(),
            candidate: request.candidate,
            cohort: request.cohort,
            tier: request.tier,
            generated_at: now,
            bank_id: self.bank.id().to_string(),
            bank_version: self.bank.version(),
            questions: selection.questions,
            draw: selection.draw,
            supersedes,
        };
        self.history.append(AttemptRecord::from(&session)).await;

        tracing::info!(
            session = %session.id,
            candidate = %session.candidate,
            tier = %session.tier,
            questions = session.len(),
            seed = session.draw.rng_seed,
            "exam issued"
        );
        Ok(session)
    }

    /// Issue exams for many candidates concurrently.
    ///
    /// Failures are collected per candidate and never abort the batch.
    pub async fn start_cohort(
        &self,
        requests: Vec<StartExam>,
        progress: &dyn ProgressReporter,
    ) -> CohortIssue {
        let start = Instant::now();
        let total = requests.len();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for request in requests {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let candidate = request.candidate.clone();
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (
                        candidate,
                        Err(ExamError::InvalidRequest("issue queue closed".into())),
                    );
                };
                progress.on_issue_start(&candidate);
                let outcome = self.start_exam(request).await;
                (candidate, outcome)
            });
        }

        let mut sessions = Vec::with_capacity(total);
        let mut failures = Vec::new();
        while let Some((candidate, outcome)) = futures.next().await {
            match outcome {
                Ok(session) => {
                    progress.on_issued(&session);
                    sessions.push(session);
                }
                Err(e) => {
                    tracing::warn!(candidate = %candidate, error = %e, "failed to issue exam");
                    progress.on_issue_error(&candidate, &e);
                    failures.push((candidate, e));
                }
            }
        }

        sessions.sort_by(|a, b| a.candidate.cmp(&b.candidate));
        failures.sort_by(|a, b| a.0.cmp(&b.0));

        let elapsed = start.elapsed();
        progress.on_cohort_complete(total, sessions.len(), failures.len(), elapsed);

        CohortIssue {
            sessions,
            failures,
            duration_ms: elapsed.as_millis() as u64,
        }
    }

    /// Grade a session issued from this engine's bank.
    pub fn grade(
        &self,
        session: &ExamSession,
        answers: &Answers,
        regrade: bool,
    ) -> Result<ExamResult, ExamError> {
        let options = GradeOptions {
            regrade,
            graded_at: None,
        };
        self.grades.grade(&self.bank, session, answers, options)
    }
}

/// Stable 64-bit seed for a cohort id (FNV-1a).
pub fn cohort_seed_for(cohort: &CohortId) -> u64 {
    cohort
        .as_str()
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}
