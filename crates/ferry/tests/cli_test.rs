//! Integration tests for the `ferry` CLI binary.
//!
//! Argument parsing, config handling and error exit codes run without any
//! platform; the export test drives two wiremock accounts end to end.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ferry` binary with env isolation.
///
/// Points the config directories at `home` so tests never touch the
/// user's real configuration.
fn ferry_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ferry");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home)
        .env_remove("FERRY_OUTPUT")
        .env_remove("FERRY_DEFAULT_PROFILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Write `config.toml` where `ferry` looks for it under `home`.
fn write_config(home: &Path, contents: &str) {
    let dir = home.join("ferry");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), contents).unwrap();
}

fn offline_config(home: &Path) {
    write_config(
        home,
        r#"
[profiles.prod]
api_url = "http://127.0.0.1:9"
token = "prod-secret-token"

[profiles.staging]
api_url = "http://127.0.0.1:9"
"#,
    );
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = ferry_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("export")
            .and(predicate::str::contains("restore"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ferry"));
}

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_invalid_output_format() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["-o", "yaml", "config", "path"])
        .assert()
        .failure()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_uses_config_dir() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ferry").and(predicate::str::contains("config.toml")));
}

#[test]
fn test_config_show_redacts_tokens() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    ferry_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("<redacted>")
                .and(predicate::str::contains("prod-secret-token").not())
                .and(predicate::str::contains("staging")),
        );
}

// ── Errors & exit codes ─────────────────────────────────────────────

#[test]
fn test_export_unknown_profile() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    let output = ferry_cmd(home.path())
        .args(["export", "--from", "prod", "--to", "nope", "-y"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("nope"), "{text}");
    assert!(text.contains("prod, staging"), "{text}");
}

#[test]
fn test_export_profile_without_token() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    ferry_cmd(home.path())
        .args(["export", "--from", "prod", "--to", "staging", "-y"])
        .assert()
        .code(3);
}

#[test]
fn test_export_into_same_profile_is_rejected() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["export", "--from", "prod", "--to", "prod"])
        .assert()
        .code(2);
}

#[test]
fn test_export_unknown_entity_kind() {
    let home = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["export", "--from", "a", "--to", "b", "--entities", "devices,gadgets"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gadgets"));
}

#[test]
fn test_restore_missing_archive() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    ferry_cmd(home.path())
        .args(["restore", "--archive"])
        .arg(home.path().join("absent"))
        .args(["--to", "prod"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot read archive"));
}

#[test]
fn test_restore_empty_archive_is_a_noop() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    let archive = TempDir::new().unwrap();
    ferry_cmd(home.path())
        .args(["restore", "--archive"])
        .arg(archive.path())
        .args(["--to", "prod"])
        .assert()
        .success()
        .stderr(predicate::str::contains("holds no entities"));
}

#[test]
fn test_restore_requires_yes_when_not_interactive() {
    let home = TempDir::new().unwrap();
    offline_config(home.path());
    let archive = TempDir::new().unwrap();
    std::fs::write(
        archive.path().join("secrets.json"),
        r#"[{ "id": "s1", "key": "API_KEY", "value": "v" }]"#,
    )
    .unwrap();

    ferry_cmd(home.path())
        .args(["restore", "--archive"])
        .arg(archive.path())
        .args(["--to", "prod"])
        .write_stdin("")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("secrets"))
        .stderr(predicate::str::contains("--yes"));
}

// ── End to end ──────────────────────────────────────────────────────

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "status": true, "result": result }))
}

#[tokio::test(flavor = "multi_thread")]
async fn test_export_secrets_between_mock_accounts() {
    let source = MockServer::start().await;
    let target = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets"))
        .respond_with(ok(json!([{ "id": "s1", "key": "API_KEY" }])))
        .mount(&source)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets/s1"))
        .respond_with(ok(json!({ "id": "s1", "key": "API_KEY", "value": "v" })))
        .mount(&source)
        .await;
    Mock::given(method("GET"))
        .and(path("/secrets"))
        .respond_with(ok(json!([])))
        .mount(&target)
        .await;
    Mock::given(method("POST"))
        .and(path("/secrets"))
        .respond_with(ok(json!({ "id": "s2" })))
        .expect(1)
        .mount(&target)
        .await;

    let home = TempDir::new().unwrap();
    write_config(
        home.path(),
        &format!(
            r#"
[defaults]
item_delay_ms = 0

[profiles.a]
api_url = "{}"
token = "token-a"

[profiles.b]
api_url = "{}"
token = "token-b"
"#,
            source.uri(),
            target.uri()
        ),
    );

    let output = ferry_cmd(home.path())
        .args(["-y", "-o", "json", "export", "--from", "a", "--to", "b"])
        .args(["--entities", "secrets"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["phases"][0]["kind"], "secrets");
    assert_eq!(report["phases"][0]["outcome"]["status"], "completed");
    assert_eq!(report["phases"][0]["outcome"]["created"], 1);
}
