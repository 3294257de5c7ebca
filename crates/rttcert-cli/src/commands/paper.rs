//! The `rttcert paper` command.

use std::path::PathBuf;

use anyhow::Result;

use rttcert_core::model::ExamSession;

pub fn execute(
    bank: Option<PathBuf>,
    session_path: PathBuf,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (bank, _) = super::load_bank_and_config(bank, config_path)?;
    let session = ExamSession::load_json(&session_path)?;
    let paper = bank.paper(&session)?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&paper)?);
        return Ok(());
    }

    println!(
        "{}: {} exam for {} ({} questions)\n",
        bank.info().name,
        session.tier,
        session.candidate,
        paper.len()
    );
    for q in &paper {
        println!("{}. [{}] {}", q.number, q.id, q.prompt);
        for option in &q.options {
            println!("   {}) {}", option.label, option.text);
        }
        println!();
    }
    Ok(())
}
