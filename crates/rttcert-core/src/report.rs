//! JSON persistence for sessions, answers and results, plus markdown transcripts.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bank::QuestionBank;
use crate::model::{Answers, ExamSession};
use crate::results::ExamResult;
use crate::statistics::category_breakdown;

fn save_pretty<T: Serialize>(value: &T, what: &str, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).with_context(|| format!("failed to serialize {what}"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {what} to {}", path.display()))?;
    Ok(())
}

fn load<T: DeserializeOwned>(what: &str, path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {what} from {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {what} JSON in {}", path.display()))
}

impl ExamSession {
    /// Save the session as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_pretty(self, "session", path)
    }

    /// Load a session from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load("session", path)
    }
}

impl ExamResult {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_pretty(self, "result", path)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load("result", path)
    }

    /// Render a markdown transcript. With a bank, adds a per-category table
    /// and the explanation of every missed question.
    pub fn to_markdown(&self, bank: Option<&QuestionBank>) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Exam Result: {}\n", self.candidate);
        let _ = writeln!(md, "- **Session:** {}", self.session_id);
        let _ = writeln!(md, "- **Tier sat:** {}", self.tier_sat);
        let _ = writeln!(
            md,
            "- **Score:** {}/{} ({:.2}%)",
            self.correct_count, self.total_questions, self.percentage
        );
        let _ = writeln!(md, "- **Award:** {}", self.award);
        let _ = writeln!(md, "- **Graded:** {}", self.graded_at.format("%Y-%m-%d %H:%M UTC"));
        if self.regraded {
            let _ = writeln!(md, "- **Regraded:** yes");
        }

        let Some(bank) = bank else {
            return md;
        };

        if let Ok(breakdown) = category_breakdown(bank, self) {
            md.push_str("\n## By Category\n\n");
            md.push_str("| Category | Correct | Total | % |\n");
            md.push_str("|----------|---------|-------|---|\n");
            for row in breakdown {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {:.2} |",
                    row.category, row.correct, row.total, row.percentage
                );
            }
        }

        let missed: Vec<_> = self.outcomes.iter().filter(|o| !o.is_correct).collect();
        if !missed.is_empty() {
            md.push_str("\n## Missed Questions\n\n");
            for outcome in missed {
                let Ok(question) = bank.get(&outcome.question_id) else {
                    continue;
                };
                let answered = outcome
                    .selected
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    md,
                    "- **{}** ({}, {}): answered {}, correct {}",
                    question.id, question.category, question.difficulty, answered, outcome.correct_option
                );
                if let Some(explanation) = &question.explanation {
                    let _ = writeln!(md, "  - {explanation}");
                }
            }
        }

        md
    }
}

/// Load a candidate's answers: a JSON object mapping question id to option letter.
pub fn load_answers(path: &Path) -> Result<Answers> {
    load("answers", path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::test_support::uniform_bank;
    use crate::model::{CandidateId, Category, CertificationTier, DrawRecord, OptionLabel, SessionId};
    use crate::results::{Award, QuestionOutcome};
    use chrono::{TimeZone, Utc};

    fn sample_session() -> ExamSession {
        ExamSession {
            id: SessionId::new_v4(),
            candidate: CandidateId::new("nurse-7"),
            cohort: Some(crate::model::CohortId::new("2025-q1")),
            tier: CertificationTier::Practitioner,
            generated_at: Utc.with_ymd_and_hms(2025, 2, 3, 10, 0, 0).unwrap(),
            bank_id: "test".into(),
            bank_version: 2,
            questions: vec!["clock-stops-easy-00".into(), "clock-stops-hard-01".into()],
            draw: DrawRecord {
                rng_seed: 42,
                cohort_seed: Some(7),
                excluded: 3,
                relaxed_exclusions: 1,
                fallbacks: vec![],
            },
            supersedes: None,
        }
    }

    fn sample_result() -> ExamResult {
        let b = OptionLabel::from_index(1).unwrap();
        ExamResult {
            session_id: SessionId::new_v4(),
            candidate: CandidateId::new("nurse-7"),
            tier_sat: CertificationTier::Practitioner,
            outcomes: vec![
                QuestionOutcome {
                    question_id: "clock-stops-easy-00".into(),
                    selected: Some(b),
                    correct_option: b,
                    is_correct: true,
                },
                QuestionOutcome {
                    question_id: "clock-stops-hard-01".into(),
                    selected: None,
                    correct_option: b,
                    is_correct: false,
                },
            ],
            correct_count: 1,
            total_questions: 2,
            percentage: 50.0,
            basis_points: 5000,
            award: Award::Fail,
            graded_at: Utc.with_ymd_and_hms(2025, 2, 3, 11, 30, 0).unwrap(),
            regraded: false,
        }
    }

    #[test]
    fn session_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("session.json");
        let session = sample_session();
        session.save_json(&path).unwrap();
        let loaded = ExamSession::load_json(&path).unwrap();
        assert_eq!(loaded, session);
    }

    #[test]
    fn result_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        let result = sample_result();
        result.save_json(&path).unwrap();
        assert_eq!(ExamResult::load_json(&path).unwrap(), result);
    }

    #[test]
    fn load_answers_reads_letters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"RTT-0001": "b", "RTT-0002": "D"}"#).unwrap();
        let answers = load_answers(&path).unwrap();
        assert_eq!(answers[&crate::model::QuestionId::new("RTT-0001")].to_string(), "B");
        assert_eq!(answers.len(), 2);
    }

    #[test]
    fn bad_answer_label_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answers.json");
        std::fs::write(&path, r#"{"RTT-0001": "BB"}"#).unwrap();
        let err = load_answers(&path).unwrap_err();
        assert!(format!("{err:#}").contains("answers.json"));
    }

    #[test]
    fn markdown_summary_and_missed_questions() {
        let bank = uniform_bank(&[Category::ClockStops], 2);
        let md = sample_result().to_markdown(Some(&bank));
        assert!(md.contains("# Exam Result: nurse-7"));
        assert!(md.contains("1/2 (50.00%)"));
        assert!(md.contains("**Award:** fail"));
        assert!(md.contains("| Clock Stops | 1 | 2 | 50.00 |"));
        assert!(md.contains("clock-stops-hard-01"));
        assert!(md.contains("answered -, correct B"));

        let plain = sample_result().to_markdown(None);
        assert!(!plain.contains("By Category"));
    }
}
