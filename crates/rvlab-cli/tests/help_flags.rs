use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn help_lists_commands() {
    let output = Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .arg("--help")
        .output()
        .expect("run help");
    assert!(output.status.success(), "--help should succeed");
    let text = String::from_utf8_lossy(&output.stdout);

    for needle in ["serve", "folders", "run", "--server", "--json"] {
        assert!(
            text.contains(needle),
            "help output should contain '{needle}'"
        );
    }
}

#[test]
fn serve_help_mentions_env_overrides() {
    Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--max-workspaces")
                .and(predicate::str::contains("RVLAB_BACKEND_URL"))
                .and(predicate::str::contains("--build-timeout-secs")),
        );
}

#[test]
fn run_requires_a_folder() {
    Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--folder"));
}

#[test]
fn unreachable_server_is_reported() {
    Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .args(["--server", "http://127.0.0.1:1", "folders", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GET http://127.0.0.1:1/api/folders"));
}

#[test]
fn serve_rejects_zero_max_workspaces() {
    Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .args(["serve", "--max-workspaces", "0", "--bind", "127.0.0.1:0"])
        .env_remove("RVLAB_MAX_WORKSPACES")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--max-workspaces must be at least 1"));

    Command::new(assert_cmd::cargo::cargo_bin!("rvlab"))
        .args(["serve", "--bind", "127.0.0.1:0"])
        .env("RVLAB_MAX_WORKSPACES", "0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be at least 1"));
}
