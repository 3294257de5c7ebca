//! The `rttcert issue` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use rttcert_core::engine::{ExamEngine, ProgressReporter, StartExam};
use rttcert_core::error::ExamError;
use rttcert_core::history::{AttemptHistory, AttemptRecord, InMemoryHistory};
use rttcert_core::model::{CandidateId, CertificationTier, CohortId, ExamSession};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_issue_start(&self, candidate: &CandidateId) {
        eprintln!("  Issuing: {candidate}");
    }

    fn on_issued(&self, session: &ExamSession) {
        let note = if session.draw.relaxed_exclusions > 0 {
            format!(", {} reused", session.draw.relaxed_exclusions)
        } else {
            String::new()
        };
        eprintln!(
            "  Done: {} ({} questions, seed {}{note})",
            session.candidate,
            session.len(),
            session.draw.rng_seed
        );
    }

    fn on_issue_error(&self, candidate: &CandidateId, error: &ExamError) {
        eprintln!("  ERROR: {candidate}: {error}");
    }

    fn on_cohort_complete(&self, total: usize, issued: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {issued}/{total} issued, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    bank: Option<PathBuf>,
    cohort: String,
    candidates: Vec<String>,
    tier: CertificationTier,
    count: Option<usize>,
    history_dir: Option<PathBuf>,
    output: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (bank, config) = super::load_bank_and_config(bank, config_path)?;
    let engine_config = config.engine_config()?;
    anyhow::ensure!(engine_config.parallelism >= 1, "parallelism must be at least 1");

    let history = Arc::new(InMemoryHistory::new());
    if let Some(dir) = &history_dir {
        let loaded = seed_history(history.as_ref(), dir).await?;
        eprintln!("Loaded {loaded} earlier session(s) from {}", dir.display());
    }

    let cohort = CohortId::new(cohort);
    let mut requests = Vec::with_capacity(candidates.len());
    for candidate in candidates.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        check_file_safe(candidate)?;
        let request = StartExam::new(CandidateId::new(candidate), tier).in_cohort(cohort.clone());
        requests.push(match count {
            Some(n) => request.with_count(n),
            None => request,
        });
    }
    anyhow::ensure!(!requests.is_empty(), "no candidates given");

    let engine = ExamEngine::new(Arc::new(bank), history, engine_config);
    eprintln!("Issuing {} {tier} exam(s) for cohort {cohort}", requests.len());
    let issue = engine.start_cohort(requests, &ConsoleReporter).await;

    std::fs::create_dir_all(&output)
        .with_context(|| format!("failed to create {}", output.display()))?;
    // One file per session, so a retake never replaces the session it supersedes.
    for session in &issue.sessions {
        let path = output.join(format!("{}-{}.json", session.candidate, session.id));
        session.save_json(&path)?;
    }
    println!("{} session(s) written to {}", issue.sessions.len(), output.display());

    if !issue.failures.is_empty() {
        anyhow::bail!("{} candidate(s) could not be issued an exam", issue.failures.len());
    }
    Ok(())
}

/// Candidate ids become file names under `--output`.
fn check_file_safe(candidate: &str) -> Result<()> {
    anyhow::ensure!(
        !candidate.contains(['/', '\\']) && !candidate.contains("..") && candidate != ".",
        "candidate id {candidate:?} cannot be used as a file name"
    );
    Ok(())
}

async fn seed_history(history: &InMemoryHistory, dir: &Path) -> Result<usize> {
    anyhow::ensure!(dir.is_dir(), "not a directory: {}", dir.display());
    let mut loaded = 0;
    for entry in std::fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            match ExamSession::load_json(&path) {
                Ok(session) => {
                    history.append(AttemptRecord::from(&session)).await;
                    loaded += 1;
                }
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }
    }
    Ok(loaded)
}
