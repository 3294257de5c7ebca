//! The `rttcert stats` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use rttcert_core::model::Difficulty;
use rttcert_core::statistics::bank_coverage;

pub fn execute(bank: Option<PathBuf>, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let (bank, _) = super::load_bank_and_config(bank, config_path)?;
    let coverage = bank_coverage(&bank);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&coverage)?);
        return Ok(());
    }

    let mut header = vec!["Category".to_string()];
    header.extend(Difficulty::ALL.iter().map(|d| d.to_string()));
    header.push("Total".to_string());

    let mut table = Table::new();
    table.set_header(header);
    for row in &coverage.rows {
        let mut cells = vec![Cell::new(row.category)];
        cells.extend(row.counts.iter().map(Cell::new));
        cells.push(Cell::new(row.total()));
        table.add_row(cells);
    }
    let mut totals = vec![Cell::new("All")];
    totals.extend(coverage.difficulty_totals().iter().map(Cell::new));
    totals.push(Cell::new(coverage.total));
    table.add_row(totals);

    println!("{} v{} ({})", bank.info().name, coverage.version, coverage.bank_id);
    println!("{table}");
    if let Some((category, difficulty, n)) = coverage.thinnest_cell() {
        println!("Thinnest cell: {category} / {difficulty} ({n})");
    }
    Ok(())
}
