//! End-to-End Tests for the focusmind binary.
//!
//! These tests run the compiled CLI against a temporary data directory:
//! - Help and shell completions
//! - Statistics read straight from the session log
//! - Errors when the daemon is not running
//! - A real daemon process driven by the CLI and stopped with SIGTERM

use std::path::Path;
use std::process::{Child, Command as StdCommand, Stdio};
use std::time::{Duration, Instant};

use assert_cmd::Command;
use predicates::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn focusmind(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("focusmind").unwrap();
    cmd.env("FOCUSMIND_HOME", home).env_remove("RUST_LOG");
    cmd
}

fn write_log(home: &Path, lines: &[&str]) {
    std::fs::create_dir_all(home).unwrap();
    std::fs::write(home.join("sessions.jsonl"), lines.join("\n") + "\n").unwrap();
}

/// Starts `focusmind daemon --no-sound` and waits for its socket.
fn spawn_daemon(home: &Path) -> Child {
    let child = StdCommand::new(assert_cmd::cargo::cargo_bin("focusmind"))
        .args(["daemon", "--no-sound"])
        .env("FOCUSMIND_HOME", home)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    let socket = home.join("focusmind.sock");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !socket.exists() {
        assert!(Instant::now() < deadline, "daemon did not create its socket");
        std::thread::sleep(Duration::from_millis(50));
    }
    child
}

fn terminate(mut child: Child) {
    let status = StdCommand::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
    let exit = child.wait().unwrap();
    assert!(exit.success(), "daemon exited with {:?}", exit);
}

// ============================================================================
// Help and completions
// ============================================================================

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    focusmind(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("rate"))
        .stdout(predicate::str::contains("stats"))
        .stdout(predicate::str::contains("daemon"));
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    focusmind(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("focusmind"));
}

#[test]
fn test_invalid_rating_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    focusmind(dir.path()).args(["rate", "9"]).assert().failure();
}

// ============================================================================
// Stats
// ============================================================================

#[test]
fn test_stats_without_log() {
    let dir = tempfile::tempdir().unwrap();
    focusmind(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("記録されたセッションはありません"));
}

#[test]
fn test_stats_filters_signed_in_user() {
    let dir = tempfile::tempdir().unwrap();
    write_log(
        dir.path(),
        &[
            r#"{"durationSeconds":2700,"feedback":4,"completedAt":"2026-06-10T10:00:00Z","user":"alice"}"#,
            r#"{"durationSeconds":2700,"feedback":2,"completedAt":"2026-06-10T11:00:00Z","user":"alice"}"#,
            r#"{"durationSeconds":1200,"feedback":null,"completedAt":"2026-06-10T12:00:00Z","user":"bob"}"#,
            "not json",
        ],
    );
    std::fs::write(
        dir.path().join("auth.json"),
        r#"{"user":"alice","signedInAt":"2026-06-10T08:00:00Z"}"#,
    )
    .unwrap();

    focusmind(dir.path())
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("(alice)"))
        .stdout(predicate::str::contains("セッション数: 2"))
        .stdout(predicate::str::contains("合計時間: 90分"))
        .stdout(predicate::str::contains("平均評価: 3.0 (2件)"));
}

// ============================================================================
// Daemon
// ============================================================================

#[test]
fn test_status_without_daemon_fails() {
    let dir = tempfile::tempdir().unwrap();
    focusmind(dir.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("エラー"))
        .stderr(predicate::str::contains("focusmind daemon"));
}

#[test]
fn test_daemon_round_trip_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path();
    let daemon = spawn_daemon(home);

    focusmind(home)
        .arg("start")
        .assert()
        .success()
        .stdout(predicate::str::contains("タイマーを開始しました"));

    focusmind(home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("実行中"))
        .stdout(predicate::str::contains("ゲスト"));

    focusmind(home)
        .args(["settings", "--work", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ログイン"));

    terminate(daemon);

    // Shutdown suspends the running session and removes the socket.
    assert!(!home.join("focusmind.sock").exists());
    assert!(home.join("timer_state.json").exists());

    // The next run picks the session up again.
    let daemon = spawn_daemon(home);
    focusmind(home)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("実行中"));
    terminate(daemon);
}
