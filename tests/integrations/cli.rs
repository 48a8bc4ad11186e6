//! Runs the `errsole-alerts` binary against temporary stores.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

#[path = "../helpers/mock_chat.rs"]
mod mock_chat;

fn store_file(contents: serde_json::Value) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

fn errsole_alerts() -> Command {
    let mut cmd = Command::cargo_bin("errsole-alerts").unwrap();
    // Keep RUST_LOG from the environment out of the way of assertions.
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    errsole_alerts()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("test-chat"))
        .stdout(predicate::str::contains("test-email"))
        .stdout(predicate::str::contains("exception"));
}

#[test]
fn test_disabled_chat_reports_false() {
    let store = store_file(json!({
        "chatIntegration": { "status": false, "url": "http://127.0.0.1:9/hook" }
    }));

    errsole_alerts()
        .args(["--store", store.path().to_str().unwrap()])
        .args(["test-chat", "--message", "ping"])
        .assert()
        .code(1)
        .stdout(predicate::str::diff("false\n"));
}

#[test]
fn test_unconfigured_email_reports_false() {
    let store = store_file(json!({}));

    errsole_alerts()
        .args(["--store", store.path().to_str().unwrap()])
        .args(["test-email", "-m", "ping"])
        .assert()
        .code(1)
        .stdout(predicate::str::diff("false\n"));
}

#[tokio::test]
async fn test_chat_alert_delivered_through_cli() {
    let server = mock_chat::start_webhook(200, 1).await;
    let store = store_file(json!({
        "chatIntegration": { "status": true, "url": mock_chat::webhook_url(&server) }
    }));
    let store_path = store.path().to_str().unwrap().to_string();

    let assert = tokio::task::spawn_blocking(move || {
        errsole_alerts()
            .args(["--store", &store_path])
            .args(["test-chat", "-m", "ping", "--app-name", "api"])
            .assert()
    })
    .await
    .unwrap();

    assert.success().stdout(predicate::str::diff("true\n"));
}
