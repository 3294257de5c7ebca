//! CLI integration tests using assert_cmd.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const BANK: &str = "../../banks/rtt-core.toml";

fn rttcert() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("rttcert").unwrap()
}

fn select_into(dir: &TempDir, name: &str, extra: &[&str]) -> PathBuf {
    let path = dir.path().join(format!("{name}.json"));
    rttcert()
        .args(["select", "--bank", BANK, "--candidate", name, "--tier", "foundation"])
        .args(["--count", "20"])
        .args(extra)
        .arg("--output")
        .arg(&path)
        .assert()
        .success();
    path
}

fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn question_ids(session: &serde_json::Value) -> Vec<String> {
    session["questions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q.as_str().unwrap().to_string())
        .collect()
}

#[test]
fn validate_sample_bank() {
    rttcert()
        .args(["validate", "--bank", BANK])
        .assert()
        .success()
        .stdout(predicate::str::contains("48 questions, 6 categories"))
        .stdout(predicate::str::contains("All banks valid"));
}

#[test]
fn validate_directory() {
    rttcert()
        .args(["validate", "--bank", "../../banks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("RTT Core Certification Bank"));
}

#[test]
fn validate_nonexistent_file() {
    rttcert()
        .args(["validate", "--bank", "nonexistent.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_reports_integrity_problems() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(
        &path,
        r#"
[bank]
id = "broken"
name = "Broken"

[[questions]]
id = "B-1"
category = "clock-stops"
difficulty = "easy"
prompt = "Only one difficulty present"
options = [{ text = "30", correct = true }, { text = "20" }]
"#,
    )
    .unwrap();

    rttcert()
        .args(["validate", "--bank"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("integrity check"))
        .stderr(predicate::str::contains("'clock-stops' has no medium questions"));
}

#[test]
fn stats_shows_coverage_table() {
    rttcert()
        .args(["stats", "--bank", BANK])
        .assert()
        .success()
        .stdout(predicate::str::contains("Clock Stops"))
        .stdout(predicate::str::contains("Cancer Pathways"))
        .stdout(predicate::str::contains("48"));
}

#[test]
fn stats_json() {
    let output = rttcert()
        .args(["stats", "--bank", BANK, "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let coverage: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(coverage["total"], 48);
    assert_eq!(coverage["rows"].as_array().unwrap().len(), 6);
}

#[test]
fn select_is_reproducible_with_seed() {
    let dir = TempDir::new().unwrap();
    let a = select_into(&dir, "alice", &["--seed", "42"]);
    let first = read_json(&a);
    let ids = question_ids(&first);
    assert_eq!(ids.len(), 20);
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 20);
    assert_eq!(first["draw"]["rng_seed"], 42);
    assert_eq!(first["bank_id"], "rtt-core");

    let b = select_into(&dir, "alice", &["--seed", "42"]);
    assert_eq!(question_ids(&read_json(&b)), ids);
}

#[test]
fn select_more_than_bank_fails() {
    rttcert()
        .args(["select", "--bank", BANK, "--candidate", "bob", "--tier", "expert", "--count", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("insufficient questions"));
}

#[test]
fn select_rejects_unknown_tier() {
    rttcert()
        .args(["select", "--bank", BANK, "--candidate", "bob", "--tier", "gold"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown certification tier"));
}

#[test]
fn strict_retake_avoids_previous_questions() {
    let dir = TempDir::new().unwrap();
    let first = select_into(&dir, "carol", &["--seed", "1"]);
    let retake = dir.path().join("carol-retake.json");
    rttcert()
        .args(["select", "--bank", BANK, "--candidate", "carol", "--tier", "foundation", "--count", "20"])
        .args(["--seed", "2", "--strict", "--exclude"])
        .arg(&first)
        .arg("--output")
        .arg(&retake)
        .assert()
        .success();

    let first = read_json(&first);
    let second = read_json(&retake);
    let seen: HashSet<String> = question_ids(&first).into_iter().collect();
    assert!(question_ids(&second).iter().all(|id| !seen.contains(id)));
    assert_eq!(second["supersedes"], first["id"]);
    assert_eq!(second["draw"]["relaxed_exclusions"], 0);
}

#[test]
fn paper_hides_answers() {
    let dir = TempDir::new().unwrap();
    let session = select_into(&dir, "dave", &["--seed", "3"]);
    rttcert()
        .args(["paper", "--bank", BANK, "--session"])
        .arg(&session)
        .assert()
        .success()
        .stdout(predicate::str::contains("1. [RTT-"))
        .stdout(predicate::str::contains("A) "))
        .stdout(predicate::str::contains("explanation").not());
}

/// Answers with every question right.
fn perfect_answers(dir: &TempDir, session: &Path) -> PathBuf {
    let bank = rttcert_core::parser::load_bank(Path::new(BANK)).unwrap();
    let answers: BTreeMap<String, String> = question_ids(&read_json(session))
        .into_iter()
        .map(|id| {
            let q = bank.get(&rttcert_core::model::QuestionId::new(id.clone())).unwrap();
            (id, q.correct.to_string())
        })
        .collect();
    let path = dir.path().join("answers.json");
    std::fs::write(&path, serde_json::to_string(&answers).unwrap()).unwrap();
    path
}

#[test]
fn grade_perfect_score_is_expert() {
    let dir = TempDir::new().unwrap();
    let session = select_into(&dir, "erin", &["--seed", "4"]);
    let answers = perfect_answers(&dir, &session);

    let output = rttcert()
        .args(["grade", "--bank", BANK, "--format", "json", "--session"])
        .arg(&session)
        .arg("--answers")
        .arg(&answers)
        .output()
        .unwrap();
    assert!(output.status.success());
    let result: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(result["correct_count"], 20);
    assert_eq!(result["award"], "expert");
    assert_eq!(result["percentage"], 100.0);
}

#[test]
fn grade_missing_answers_fail() {
    let dir = TempDir::new().unwrap();
    let session = select_into(&dir, "frank", &["--seed", "5"]);
    let answers = dir.path().join("empty.json");
    std::fs::write(&answers, "{}").unwrap();

    rttcert()
        .args(["grade", "--bank", BANK, "--session"])
        .arg(&session)
        .arg("--answers")
        .arg(&answers)
        .assert()
        .success()
        .stdout(predicate::str::contains("0/20 correct (0.00%)"))
        .stdout(predicate::str::contains("20 unanswered"))
        .stdout(predicate::str::contains("Award: fail"));
}

#[test]
fn grade_twice_requires_regrade() {
    let dir = TempDir::new().unwrap();
    let session = select_into(&dir, "gina", &["--seed", "6"]);
    let answers = perfect_answers(&dir, &session);
    let result = dir.path().join("result.json");

    let grade = |regrade: bool| {
        let mut cmd = rttcert();
        cmd.args(["grade", "--bank", BANK, "--session"])
            .arg(&session)
            .arg("--answers")
            .arg(&answers)
            .arg("--output")
            .arg(&result);
        if regrade {
            cmd.arg("--regrade");
        }
        cmd.assert()
    };

    grade(false).success();
    grade(false)
        .failure()
        .stderr(predicate::str::contains("already been graded"));
    grade(true).success();
    assert_eq!(read_json(&result)["regraded"], true);
}

#[test]
fn grade_markdown_transcript() {
    let dir = TempDir::new().unwrap();
    let session = select_into(&dir, "hal", &["--seed", "7"]);
    let answers = dir.path().join("empty.json");
    std::fs::write(&answers, "{}").unwrap();

    rttcert()
        .args(["grade", "--bank", BANK, "--format", "markdown", "--session"])
        .arg(&session)
        .arg("--answers")
        .arg(&answers)
        .assert()
        .success()
        .stdout(predicate::str::contains("# Exam Result: hal"))
        .stdout(predicate::str::contains("## By Category"))
        .stdout(predicate::str::contains("## Missed Questions"));
}

#[test]
fn audit_reports_overlap() {
    let dir = TempDir::new().unwrap();
    let a = select_into(&dir, "ivy", &["--seed", "8"]);
    let b = select_into(&dir, "jon", &["--seed", "8"]);
    rttcert()
        .args(["audit", "--sessions"])
        .arg(&a)
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Pairs compared"))
        .stdout(predicate::str::contains("Identical pairs"))
        .stderr(predicate::str::contains("identical question set"));
}

/// Session files written by `issue` for one candidate.
fn sessions_for(dir: &Path, candidate: &str) -> Vec<serde_json::Value> {
    let prefix = format!("{candidate}-");
    let mut sessions: Vec<serde_json::Value> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".json"))
        })
        .map(|p| read_json(&p))
        .collect();
    // A retake supersedes an earlier session; originals come first.
    sessions.sort_by_key(|s| !s["supersedes"].is_null());
    sessions
}

#[test]
fn issue_writes_one_session_per_candidate() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sessions");
    rttcert()
        .args(["issue", "--bank", BANK, "--cohort", "2025-q2", "--tier", "practitioner"])
        .args(["--candidates", "kim,lee,max", "--count", "12", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 session(s) written"));

    for name in ["kim", "lee", "max"] {
        let sessions = sessions_for(&out, name);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["cohort"], "2025-q2");
        assert_eq!(question_ids(&sessions[0]).len(), 12);
    }
}

#[test]
fn reissue_keeps_the_superseded_session() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sessions");
    let issue = |cohort: &str| {
        let mut cmd = rttcert();
        cmd.args(["issue", "--bank", BANK, "--cohort", cohort, "--tier", "foundation"])
            .args(["--candidates", "kim", "--count", "12", "--output"])
            .arg(&out);
        if out.exists() {
            cmd.arg("--history").arg(&out);
        }
        cmd.assert().success();
    };
    issue("jan");
    issue("feb");

    let sessions = sessions_for(&out, "kim");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[1]["supersedes"], sessions[0]["id"]);
    let seen: HashSet<String> = question_ids(&sessions[0]).into_iter().collect();
    assert!(question_ids(&sessions[1]).iter().all(|id| !seen.contains(id)));
}

#[test]
fn issue_rejects_candidate_ids_that_leave_the_output_dir() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sessions");
    rttcert()
        .args(["issue", "--bank", BANK, "--cohort", "jan", "--tier", "foundation"])
        .args(["--candidates", "kim,../escape", "--count", "12", "--output"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used as a file name"));
    assert!(!dir.path().join("escape.json").exists());
    assert!(!out.exists());
}

#[test]
fn rust_log_enables_debug_events() {
    let dir = TempDir::new().unwrap();
    let select = |rust_log: Option<&str>| {
        let mut cmd = rttcert();
        cmd.env_remove("RUST_LOG")
            .args(["select", "--bank", BANK, "--candidate", "nia", "--tier", "foundation"])
            .args(["--count", "12", "--seed", "9", "--output"])
            .arg(dir.path().join("nia.json"));
        if let Some(filter) = rust_log {
            cmd.env("RUST_LOG", filter);
        }
        cmd.assert().success()
    };
    select(Some("rttcert=debug")).stderr(predicate::str::contains("cell drawn"));
    select(None).stderr(predicate::str::contains("cell drawn").not());
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    rttcert()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created rttcert.toml"))
        .stdout(predicate::str::contains("Created banks/rtt-core.toml"));

    assert!(dir.path().join("rttcert.toml").exists());

    // The generated config points at the generated bank.
    rttcert()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("All banks valid"));

    rttcert()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}
