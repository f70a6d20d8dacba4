//! Startup failures of the `ytcontrol` binary: logged cause and hint, then a
//! non-zero exit.

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;

const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the binary with a clean environment and wait for it to exit.
async fn run_ytcontrol(args: &[&str]) -> Output {
    let child = Command::new(env!("CARGO_BIN_EXE_ytcontrol"))
        .args(args)
        .env_remove("YTCONTROL_HOST")
        .env_remove("YTCONTROL_PORT")
        .env_remove("YTCONTROL_CONFIG")
        .env("RUST_LOG", "ytcontrol=info")
        .env("NO_COLOR", "1")
        .kill_on_drop(true)
        .output();

    tokio::time::timeout(EXIT_TIMEOUT, child)
        .await
        .expect("ytcontrol should exit on a startup failure")
        .expect("failed to run ytcontrol")
}

fn combined_output(output: &Output) -> String {
    format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    )
}

#[tokio::test]
async fn unreadable_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.toml");

    let output = run_ytcontrol(&["--config", missing.to_str().unwrap()]).await;

    assert!(!output.status.success(), "expected a failing exit status");
    assert_eq!(output.status.code(), Some(1));
    let log = combined_output(&output);
    assert!(log.contains("Failed to read config"), "missing cause in: {log}");
    assert!(log.contains("missing.toml"), "missing path in: {log}");
    assert!(log.contains("--config"), "missing hint in: {log}");
}

#[tokio::test]
async fn malformed_config_exits_non_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[server\nport = \"eight thousand\"").unwrap();

    let output = run_ytcontrol(&["--config", path.to_str().unwrap()]).await;

    assert_eq!(output.status.code(), Some(1));
    let log = combined_output(&output);
    assert!(log.contains("Failed to parse config"), "missing cause in: {log}");
}

#[tokio::test]
async fn port_in_use_exits_non_zero() {
    let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = held.local_addr().unwrap().port().to_string();

    let output = run_ytcontrol(&["--host", "127.0.0.1", "--port", &port]).await;

    assert_eq!(output.status.code(), Some(1));
    let log = combined_output(&output);
    assert!(
        log.contains(&format!("failed to bind 127.0.0.1:{port}")),
        "missing cause in: {log}"
    );
    assert!(
        log.contains("Another process is using this port"),
        "missing hint in: {log}"
    );
    drop(held);
}
