//! The `rttcert init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("rttcert.toml").exists() {
        println!("rttcert.toml already exists, skipping.");
    } else {
        std::fs::write("rttcert.toml", SAMPLE_CONFIG)?;
        println!("Created rttcert.toml");
    }

    std::fs::create_dir_all("banks")?;
    let bank_path = std::path::Path::new("banks/rtt-core.toml");
    if bank_path.exists() {
        println!("banks/rtt-core.toml already exists, skipping.");
    } else {
        std::fs::write(bank_path, SAMPLE_BANK)?;
        println!("Created banks/rtt-core.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: rttcert validate");
    println!("  2. Run: rttcert select --candidate alice --tier foundation --count 20 --output alice.json");
    println!("  3. Run: rttcert paper --session alice.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# rttcert configuration

bank_path = "banks/rtt-core.toml"
questions_per_exam = 20

# Questions from a candidate's last N attempts (within the window) are avoided.
cooldown_attempts = 3
cooldown_days = 180
exclude_cohort_questions = true

# best-effort: reuse seen questions before unbalancing an exam
# strict: never reuse, borrow from neighbouring cells instead
exclusion_policy = "best-effort"

parallelism = 4
min_cell_size = 2

# Override the difficulty mix for a tier (weights are relative).
# [profiles.expert]
# easy = 10
# medium = 20
# hard = 40
# expert = 30
"#;

const SAMPLE_BANK: &str = include_str!("../../../../banks/rtt-core.toml");
