//! End-to-end outcome checks driving the compiled binary with a stub LM
//! command. Only the outcomes that make no version-control calls run here;
//! the publish sequence is covered by unit tests with recording mocks.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run `patchbot run` in `repo` with the LM stubbed to print `response`.
fn run_patchbot(repo: &Path, response: &str) -> Output {
    let stub_dir = TempDir::new().expect("stub dir");
    let response_path = stub_dir.path().join("response.json");
    fs::write(&response_path, response).expect("write stub response");
    // The stub consumes the prompt on stdin, then prints the canned response.
    let stub = format!(
        "sh -c 'cat >/dev/null; cat {}'",
        response_path.display()
    );

    Command::new(env!("CARGO_BIN_EXE_patchbot"))
        .arg("run")
        .arg("--task")
        .arg("update the docs")
        .arg("--actor")
        .arg("reviewer")
        .arg("--repo")
        .arg(repo)
        .env("PATCHBOT_LM_COMMAND", &stub)
        .output()
        .expect("run patchbot")
}

#[test]
fn non_json_output_reports_malformed_plan_with_raw_text() {
    let repo = TempDir::new().expect("repo dir");
    let output = run_patchbot(repo.path(), "not json");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("could not parse"));
    assert!(stdout.contains("not json"));
}

#[test]
fn empty_changes_reports_empty_plan_and_mutates_nothing() {
    let repo = TempDir::new().expect("repo dir");
    fs::write(repo.path().join("README.md"), "# readme").expect("write fixture");
    let output = run_patchbot(repo.path(), r#"{"changes":[]}"#);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("proposed no changes"));
    let readme = fs::read_to_string(repo.path().join("README.md")).expect("read");
    assert_eq!(readme, "# readme");
}

#[test]
fn inapplicable_replace_reports_no_op_and_leaves_file_intact() {
    let repo = TempDir::new().expect("repo dir");
    fs::write(repo.path().join("a.txt"), "actual content").expect("write fixture");
    let plan = r#"{"changes":[{"path":"a.txt","operation":"replace","find":"absent","content":"x"}]}"#;
    let output = run_patchbot(repo.path(), plan);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("nothing was changed"));
    let content = fs::read_to_string(repo.path().join("a.txt")).expect("read");
    assert_eq!(content, "actual content");
}

#[test]
fn plan_subcommand_previews_without_applying() {
    let repo = TempDir::new().expect("repo dir");
    fs::write(repo.path().join("README.md"), "# readme").expect("write fixture");
    let stub_dir = TempDir::new().expect("stub dir");
    let response_path = stub_dir.path().join("response.json");
    fs::write(
        &response_path,
        r#"{"changes":[{"path":"README.md","operation":"append","content":"Hello"}]}"#,
    )
    .expect("write stub response");
    let stub = format!(
        "sh -c 'cat >/dev/null; cat {}'",
        response_path.display()
    );

    let output = Command::new(env!("CARGO_BIN_EXE_patchbot"))
        .arg("plan")
        .arg("--task")
        .arg("update the docs")
        .arg("--repo")
        .arg(repo.path())
        .env("PATCHBOT_LM_COMMAND", &stub)
        .output()
        .expect("run patchbot plan");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("README.md"));
    assert!(stdout.contains("append"));
    let readme = fs::read_to_string(repo.path().join("README.md")).expect("read");
    assert_eq!(readme, "# readme");
}
