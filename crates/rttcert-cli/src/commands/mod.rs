pub mod audit;
pub mod grade;
pub mod init;
pub mod issue;
pub mod paper;
pub mod select;
pub mod stats;
pub mod validate;

use std::path::PathBuf;

use anyhow::{Context, Result};

use rttcert_core::bank::QuestionBank;
use rttcert_core::config::{load_config_from, ExamConfig};
use rttcert_core::parser::load_bank;

/// Load config, then the bank named by `--bank` or the config's `bank_path`.
pub fn load_bank_and_config(
    bank: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<(QuestionBank, ExamConfig)> {
    let config = load_config_from(config_path.as_deref())?;
    let path = bank_path(bank, &config)?;
    let bank = load_bank(&path)?;
    Ok((bank, config))
}

pub fn bank_path(bank: Option<PathBuf>, config: &ExamConfig) -> Result<PathBuf> {
    bank.or_else(|| config.bank_path.clone())
        .context("no question bank given; pass --bank or set bank_path in rttcert.toml")
}
