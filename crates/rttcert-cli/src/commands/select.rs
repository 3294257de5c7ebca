//! The `rttcert select` command.

use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;

use rttcert_core::engine::cohort_seed_for;
use rttcert_core::model::{CandidateId, CertificationTier, CohortId, ExamSession, SessionId};
use rttcert_core::selector::{select, ExclusionPolicy, SelectionRequest};

pub struct SelectArgs {
    pub bank: Option<PathBuf>,
    pub candidate: String,
    pub tier: CertificationTier,
    pub cohort: Option<String>,
    pub count: Option<usize>,
    pub seed: Option<u64>,
    pub cohort_seed: Option<u64>,
    pub exclude: Vec<PathBuf>,
    pub strict: bool,
    pub output: Option<PathBuf>,
}

pub fn execute(args: SelectArgs, config_path: Option<PathBuf>) -> Result<()> {
    let (bank, config) = super::load_bank_and_config(args.bank, config_path)?;
    let candidate = CandidateId::new(args.candidate);
    let cohort = args.cohort.map(CohortId::new);

    let mut previous = Vec::new();
    for path in &args.exclude {
        previous.push(ExamSession::load_json(path)?);
    }
    let excluded: HashSet<_> = previous.iter().flat_map(|s| s.questions.iter().cloned()).collect();
    let supersedes: Option<SessionId> = previous
        .iter()
        .filter(|s| s.candidate == candidate)
        .max_by_key(|s| s.generated_at)
        .map(|s| s.id);

    let policy = if args.strict {
        ExclusionPolicy::Strict
    } else {
        config.exclusion_policy
    };
    let mut request = SelectionRequest::new(args.tier, args.count.unwrap_or(config.questions_per_exam))
        .excluding(excluded)
        .with_profile(config.profile_for(args.tier)?)
        .with_policy(policy);
    if let Some(seed) = args.seed {
        request = request.with_seed(seed);
    }
    if let Some(seed) = args.cohort_seed.or_else(|| cohort.as_ref().map(cohort_seed_for)) {
        request = request.with_cohort_seed(seed);
    }

    let selection = select(&bank, &request)
        .with_context(|| format!("failed to draw an exam for {candidate}"))?;

    let session = ExamSession {
        id: SessionId::new_v4(),
        candidate,
        cohort,
        tier: args.tier,
        generated_at: Utc::now(),
        bank_id: bank.id().to_string(),
        bank_version: bank.version(),
        questions: selection.questions,
        draw: selection.draw,
        supersedes,
    };

    eprintln!(
        "Drew {} questions for {} ({}), seed {}",
        session.len(),
        session.candidate,
        session.tier,
        session.draw.rng_seed
    );
    if session.draw.relaxed_exclusions > 0 {
        eprintln!(
            "  {} previously seen question(s) reused to keep the exam balanced",
            session.draw.relaxed_exclusions
        );
    }
    for fallback in &session.draw.fallbacks {
        eprintln!(
            "  {} {} short: {} taken from {} {}",
            fallback.category, fallback.difficulty, fallback.count, fallback.from_category, fallback.from_difficulty
        );
    }

    match args.output {
        Some(path) => {
            session.save_json(&path)?;
            eprintln!("Session written to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&session)?),
    }
    Ok(())
}
