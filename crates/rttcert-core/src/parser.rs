//! TOML question bank parser.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::bank::{BankInfo, QuestionBank};
use crate::model::{Category, Difficulty, QuestionRecord};

/// Intermediate TOML structure for parsing bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: BankInfo,
    #[serde(default)]
    questions: Vec<QuestionRecord>,
}

/// Parse a single bank file.
pub fn load_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_bank_str(&content, path)
}

/// Parse bank TOML from a string. `source_path` is used in error messages.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let file: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML in {}", source_path.display()))?;

    let bank = QuestionBank::from_records(file.bank, file.questions)
        .with_context(|| format!("invalid question bank in {}", source_path.display()))?;
    Ok(bank)
}

/// Load every `.toml` bank under a directory (recursively).
///
/// Files that fail to parse are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match load_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                }
            }
        }
    }

    Ok(banks)
}

/// A validation warning (non-fatal issue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Lint a bank that already passed integrity checks.
pub fn validate_bank(bank: &QuestionBank, min_cell_size: usize) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    for q in bank.questions() {
        if q.explanation.is_none() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: "missing explanation".into(),
            });
        }

        let mut seen = HashSet::new();
        for option in &q.options {
            if !seen.insert(option.to_lowercase()) {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.to_string()),
                    message: format!("duplicate option text: {option:?}"),
                });
            }
        }

        if q.topic.is_empty() {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.to_string()),
                message: "missing RTT topic tag".into(),
            });
        }
    }

    let mut sizes: BTreeMap<(Category, Difficulty), usize> = BTreeMap::new();
    for (key, ids) in bank.cells() {
        sizes.insert(key, ids.len());
    }
    for ((category, difficulty), size) in sizes {
        if size < min_cell_size {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "cell {}/{difficulty} has only {size} question(s) (minimum {min_cell_size})",
                    category.slug()
                ),
            });
        }
    }

    warnings
}

/// Load a bank file and lint it.
pub fn validate_bank_file(
    path: &Path,
    min_cell_size: usize,
) -> Result<(QuestionBank, Vec<ValidationWarning>)> {
    let bank = load_bank(path)?;
    let warnings = validate_bank(&bank, min_cell_size);
    Ok((bank, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExamError;
    use crate::model::QuestionId;
    use std::fmt::Write as _;

    /// A bank with one question per difficulty in `clock-stops`.
    fn bank_toml(extra: &str) -> String {
        let mut s = String::from(
            r#"
[bank]
id = "rtt-test"
name = "RTT Test Bank"
version = 3
"#,
        );
        for (i, d) in ["easy", "medium", "hard", "expert"].iter().enumerate() {
            let _ = write!(
                s,
                r#"
[[questions]]
id = "CS-{i}"
category = "clock-stops"
difficulty = "{d}"
topic = "RTT code 30"
prompt = "Which code records first definitive treatment?"
explanation = "Code 30 stops the clock."
options = [
  {{ text = "10" }},
  {{ text = "30", correct = true }},
  {{ text = "20" }},
]
"#
            );
        }
        s.push_str(extra);
        s
    }

    #[test]
    fn parse_valid_toml() {
        let bank = parse_bank_str(&bank_toml(""), Path::new("test.toml")).unwrap();
        assert_eq!(bank.id(), "rtt-test");
        assert_eq!(bank.version(), 3);
        assert_eq!(bank.len(), 4);
        let q = bank.get(&QuestionId::new("CS-2")).unwrap();
        assert_eq!(q.difficulty, Difficulty::Hard);
        assert_eq!(q.correct.to_string(), "B");
        assert_eq!(q.options[1], "30");
    }

    #[test]
    fn parse_malformed_toml() {
        let err = parse_bank_str("this is not valid toml [[[", Path::new("bad.toml")).unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn integrity_errors_downcast_to_exam_error() {
        let extra = r#"
[[questions]]
id = "CS-9"
category = "clock-stopz"
difficulty = "easy"
prompt = "typo"
options = [{ text = "a", correct = true }, { text = "b", correct = true }]
"#;
        let err = parse_bank_str(&bank_toml(extra), Path::new("typo.toml")).unwrap_err();
        let exam = err.downcast_ref::<ExamError>().expect("ExamError inside");
        assert_eq!(exam.issues().len(), 2);
        assert!(format!("{err:#}").contains("unknown category: clock-stopz"));
    }

    #[test]
    fn validate_reports_lint_warnings() {
        let extra = r#"
[[questions]]
id = "CS-5"
category = "clock-stops"
difficulty = "easy"
prompt = "Duplicate options"
options = [{ text = "Code 30", correct = true }, { text = "code 30" }]
"#;
        let bank = parse_bank_str(&bank_toml(extra), Path::new("lint.toml")).unwrap();
        let warnings = validate_bank(&bank, 2);
        let for_cs5: Vec<&str> = warnings
            .iter()
            .filter(|w| w.question_id.as_deref() == Some("CS-5"))
            .map(|w| w.message.as_str())
            .collect();
        assert!(for_cs5.contains(&"missing explanation"));
        assert!(for_cs5.contains(&"missing RTT topic tag"));
        assert!(for_cs5.iter().any(|m| m.starts_with("duplicate option text")));

        // easy now has 2; the other three cells have 1.
        let thin = warnings.iter().filter(|w| w.question_id.is_none()).count();
        assert_eq!(thin, 3);
    }

    #[test]
    fn load_directory_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.toml"), bank_toml("")).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "nope = [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("b.toml"), bank_toml("")).unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        assert_eq!(banks.len(), 2);
        assert!(load_bank_directory(&dir.path().join("a.toml")).is_err());
    }

    #[test]
    fn validate_bank_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bank.toml");
        std::fs::write(&path, bank_toml("")).unwrap();
        let (bank, warnings) = validate_bank_file(&path, 1).unwrap();
        assert_eq!(bank.len(), 4);
        assert!(warnings.is_empty());
    }
}
