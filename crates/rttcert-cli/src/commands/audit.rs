//! The `rttcert audit` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use rttcert_core::model::{ExamSession, SessionId};
use rttcert_core::statistics::overlap_stats;

pub fn execute(paths: Vec<PathBuf>, format: String) -> Result<()> {
    let sessions = paths
        .iter()
        .map(|p| ExamSession::load_json(p))
        .collect::<Result<Vec<_>>>()?;
    let stats = overlap_stats(&sessions);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec![Cell::new("Sessions"), Cell::new(stats.sessions)]);
    table.add_row(vec![Cell::new("Pairs compared"), Cell::new(stats.pairs)]);
    table.add_row(vec![
        Cell::new("Mean overlap (Jaccard)"),
        Cell::new(format!("{:.3}", stats.mean_jaccard)),
    ]);
    table.add_row(vec![
        Cell::new("Max overlap (Jaccard)"),
        Cell::new(format!("{:.3}", stats.max_jaccard)),
    ]);
    table.add_row(vec![Cell::new("Identical pairs"), Cell::new(stats.identical_pairs)]);
    println!("{table}");

    if let Some((a, b)) = stats.most_similar {
        let name = |id: SessionId| {
            sessions
                .iter()
                .find(|s| s.id == id)
                .map(|s| s.candidate.to_string())
                .unwrap_or_default()
        };
        println!("Most similar: {} ({a}) and {} ({b})", name(a), name(b));
    }
    if stats.identical_pairs > 0 {
        eprintln!("WARNING: {} pair(s) of sessions share an identical question set", stats.identical_pairs);
    }
    Ok(())
}
