//! The `rttcert validate` command.

use std::path::PathBuf;

use anyhow::Result;

use rttcert_core::config::load_config_from;
use rttcert_core::parser::{load_bank, load_bank_directory, validate_bank};

pub fn execute(bank: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let bank_path = super::bank_path(bank, &config)?;

    let banks = if bank_path.is_dir() {
        let banks = load_bank_directory(&bank_path)?;
        anyhow::ensure!(!banks.is_empty(), "no valid banks found in {}", bank_path.display());
        banks
    } else {
        vec![load_bank(&bank_path)?]
    };

    let mut total_warnings = 0;

    for bank in &banks {
        println!(
            "Bank: {} v{} ({} questions, {} categories)",
            bank.info().name,
            bank.version(),
            bank.len(),
            bank.categories().len()
        );

        let warnings = validate_bank(bank, config.min_cell_size);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
