//! The `rttcert grade` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;

use rttcert_core::error::ExamError;
use rttcert_core::model::ExamSession;
use rttcert_core::report::load_answers;
use rttcert_core::results::ExamResult;
use rttcert_core::scorer::score_session;

pub fn execute(
    bank: Option<PathBuf>,
    session_path: PathBuf,
    answers_path: PathBuf,
    format: String,
    output: Option<PathBuf>,
    regrade: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (bank, _) = super::load_bank_and_config(bank, config_path)?;
    let session = ExamSession::load_json(&session_path)?;
    let answers = load_answers(&answers_path)?;

    if session.bank_id != bank.id() || session.bank_version > bank.version() {
        tracing::warn!(
            session_bank = %session.bank_id,
            session_version = session.bank_version,
            bank = bank.id(),
            version = bank.version(),
            "session was drawn from a different bank"
        );
    }

    // A result file already on disk for this session is the record of a prior grade.
    let mut already_graded = false;
    if let Some(path) = output.as_deref().filter(|p| p.exists()) {
        let previous = ExamResult::load_json(path)?;
        if previous.session_id == session.id {
            if !regrade {
                return Err(ExamError::SessionAlreadyGraded(session.id).into());
            }
            already_graded = true;
        }
    }

    let mut result = score_session(&bank, &session, &answers, Utc::now())?;
    result.regraded = already_graded;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "markdown" | "md" => println!("{}", result.to_markdown(Some(&bank))),
        _ => {
            println!(
                "{}: {}/{} correct ({:.2}%)",
                result.candidate, result.correct_count, result.total_questions, result.percentage
            );
            if result.unanswered() > 0 {
                println!("  {} unanswered", result.unanswered());
            }
            match result.award.tier() {
                Some(tier) => println!("Award: {tier} certificate"),
                None => println!("Award: fail"),
            }
        }
    }

    if let Some(path) = output {
        result.save_json(&path)?;
        eprintln!("Result written to {}", path.display());
    }
    Ok(())
}
