//! Integration tests for the gitensure binary.
//!
//! These exercise the full CLI and check exit statuses and output against
//! real Git repos.

mod support;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use support::{git, rev, write, Fixture};

/// Get a command for running gitensure in the work clone, isolated from
/// any user configuration.
fn gitensure(fx: &Fixture) -> Command {
    let mut cmd = Command::cargo_bin("gitensure").unwrap();
    cmd.arg("--cwd")
        .arg(fx.work())
        .env("GITENSURE_CONFIG", fx.work().join("no-such-config.toml"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn version_flag_works() {
    Command::cargo_bin("gitensure")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gitensure"));
}

#[test]
fn verify_compliant_repository() {
    let fx = Fixture::new();
    gitensure(&fx)
        .args(["verify", "--branch", "main", "--checked-out"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Compliant"));
}

#[test]
fn verify_reports_violations_with_status_1() {
    let fx = Fixture::new();
    write(&fx.work(), "README.md", "# Dirty\n");

    gitensure(&fx)
        .args(["verify", "--commit-message", "x"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("uncommitted changes"));
}

#[test]
fn ensure_converges_and_reports_json() {
    let fx = Fixture::new();
    write(&fx.work(), "README.md", "# Deployed\n");

    let output = gitensure(&fx)
        .args([
            "--json",
            "ensure",
            "--commit-message",
            "deploy",
            "--push-to",
            "origin/main",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["changed"], true);
    assert_eq!(json["passed"], true);
    assert_eq!(json["mode"], "ensure");
    assert_eq!(json["actions"].as_array().unwrap().len(), 2);
    assert_eq!(json["final_state"]["dirty"], false);
    assert_eq!(fx.origin_tip("main"), rev(&fx.work(), "HEAD"));
}

#[test]
fn dry_run_changes_nothing() {
    let fx = Fixture::new();
    write(&fx.work(), "README.md", "# Pending\n");
    let head = rev(&fx.work(), "HEAD");

    gitensure(&fx)
        .args(["ensure", "--commit-message", "x", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Would apply"))
        .stdout(predicate::str::contains("planned"));

    assert_eq!(rev(&fx.work(), "HEAD"), head);
}

#[test]
fn apply_reads_toml_documents() {
    let fx = Fixture::new();
    let doc = fx.work().join("desired.toml");
    std::fs::write(
        &doc,
        "branch = \"main\"\n\n[verify]\nchecked_out = true\n",
    )
    .unwrap();
    // Keep the document itself from dirtying the tree.
    write(&fx.work(), ".git/info/exclude", "desired.toml\n");

    gitensure(&fx)
        .args(["apply", "desired.toml"])
        .assert()
        .success();
}

#[test]
fn apply_reads_json_from_stdin() {
    let fx = Fixture::new();
    gitensure(&fx)
        .args(["apply", "-"])
        .write_stdin(r#"{"verify": {"checked_out": true}}"#)
        .assert()
        .success();
}

#[test]
fn invalid_descriptor_exits_2() {
    let fx = Fixture::new();
    gitensure(&fx)
        .args(["apply", "-"])
        .write_stdin(r#"{"verify": {}, "ensure": {}}"#)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("verify"));
}

#[test]
fn safety_refusal_exits_3_and_pushes_nothing() {
    let fx = Fixture::new();
    support::commit(&fx.work(), "local.txt", "local\n", "local");
    fx.push_upstream("main", 1);
    git(&fx.work(), &["fetch", "origin"]);
    let upstream = fx.origin_tip("main");

    gitensure(&fx)
        .args(["ensure", "--push-to", "origin/main"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("fast-forward"));

    assert_eq!(fx.origin_tip("main"), upstream);
}

#[test]
fn outside_a_repository_exits_3() {
    let dir = TempDir::new().unwrap();
    Command::cargo_bin("gitensure")
        .unwrap()
        .arg("--cwd")
        .arg(dir.path())
        .args(["verify", "--checked-out"])
        .assert()
        .code(3);
}

#[test]
fn probe_prints_state() {
    let fx = Fixture::new();
    gitensure(&fx)
        .args(["probe", "--pull-from", "origin/main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("HEAD:       main"))
        .stdout(predicate::str::contains("origin/main (0 ahead, 0 behind)"));
}

#[test]
fn config_show_uses_repo_config() {
    let fx = Fixture::new();
    std::fs::create_dir_all(fx.work().join(".git/gitensure")).unwrap();
    write(
        &fx.work(),
        ".git/gitensure/config.toml",
        "remote = \"upstream\"\nverify_hooks = false\n",
    );

    gitensure(&fx)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("remote = \"upstream\""))
        .stdout(predicate::str::contains("verify_hooks = false"));
}

#[test]
fn completion_generates_script() {
    Command::cargo_bin("gitensure")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gitensure"));
}
