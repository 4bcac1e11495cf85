//! Tests for the producer supervisor

use super::process::{read_records, relay_diagnostics};
use super::*;
use crate::telemetry::{Record, TelemetryHandle};
use std::time::Duration;

fn interest(keys: &[&str]) -> Record {
    keys.iter().map(|k| (k.to_string(), String::new())).collect()
}

#[tokio::test]
async fn test_malformed_record_skipped() {
    let store = TelemetryHandle::spawn();
    let output: &[u8] = b"{\"a\": 1}\n{\"b\":\"2\"}\n";

    let stats = read_records(output, &store).await;
    assert_eq!(stats, OutputStats { records: 1, malformed: 1 });

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["b"], "2");
}

#[tokio::test]
async fn test_read_records_handles_syntax_errors() {
    let store = TelemetryHandle::spawn();
    let output: &[u8] = b"{\"x\":\"1\"}oops\n{\"y\":\"2\"}";

    let stats = read_records(output, &store).await;
    assert_eq!(stats.records, 2);
    assert_eq!(stats.malformed, 1);
}

#[tokio::test]
async fn test_relay_diagnostics_counts_lines() {
    let stderr: &[u8] = b"warming up\nsensor 3 offline\n";
    assert_eq!(relay_diagnostics(stderr).await, 2);

    let empty: &[u8] = b"";
    assert_eq!(relay_diagnostics(empty).await, 0);
}

#[tokio::test]
async fn test_relay_diagnostics_survives_invalid_utf8() {
    let stderr: &[u8] = b"bad \xff byte\nsecond line\nno trailing newline";
    assert_eq!(relay_diagnostics(stderr).await, 3);
}

#[tokio::test]
async fn test_read_records_pretty_printed_error() {
    let store = TelemetryHandle::spawn();
    let output: &[u8] = b"{\n  \"a\": oops,\n  \"b\": \"2\"\n}\n{\n  \"c\": \"3\"\n}\n";

    let stats = read_records(output, &store).await;
    assert_eq!(stats, OutputStats { records: 1, malformed: 1 });

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["c"], "3");
}

#[cfg(unix)]
#[tokio::test]
async fn test_fast_exit_stops_restarts() {
    let store = TelemetryHandle::spawn();
    let handle = Supervisor::new("exit 1", RestartPolicy::default(), store).spawn();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("supervisor should stop on its own");

    assert_eq!(status.state, SupervisorState::Stopped);
    assert_eq!(status.spawns, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_not_found_stops_restarts() {
    let store = TelemetryHandle::spawn();
    let supervisor = Supervisor::new(
        "definitely-not-a-telemetry-command-8f3a",
        RestartPolicy::default(),
        store,
    );
    let mut status_rx = supervisor.subscribe();
    let handle = supervisor.spawn();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap();
    assert_eq!(status.spawns, 1);

    // No further spawns after the stop
    tokio::time::sleep(Duration::from_millis(200)).await;
    let last = *status_rx.borrow_and_update();
    assert_eq!(last.spawns, 1);
    assert_eq!(last.state, SupervisorState::Stopped);
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_failure_stops_restarts() {
    let store = TelemetryHandle::spawn();
    let supervisor = Supervisor::new("echo never", RestartPolicy::default(), store)
        .with_shell("/nonexistent/telemetry-shell-8f3a");
    let handle = supervisor.spawn();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .expect("spawn failure should stop supervision");
    assert_eq!(status.state, SupervisorState::Stopped);
    assert_eq!(status.spawns, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_spawn_failure_reports_command() {
    let err = ProducerRun::spawn_with_shell("/nonexistent/telemetry-shell-8f3a", "echo never")
        .err()
        .unwrap();
    assert!(matches!(err, SupervisorError::Spawn { ref command, .. } if command == "echo never"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_slow_exit_triggers_restart() {
    let store = TelemetryHandle::spawn();
    let policy = RestartPolicy::new(Duration::from_millis(100));
    let mut handle = Supervisor::new("sleep 0.3", policy, store).spawn();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.wait_for_spawns(2))
        .await
        .expect("second spawn should happen");
    assert!(status.spawns >= 2);
    assert!(!handle.is_finished());

    handle.abort();
}

#[cfg(unix)]
#[tokio::test]
async fn test_records_reach_store() {
    let store = TelemetryHandle::spawn();
    let command = r#"printf '{"cpu":"12"}{"mem":"40"}\n'; echo 'diag line' >&2"#;
    let handle = Supervisor::new(command, RestartPolicy::default(), store.clone()).spawn();

    let status = tokio::time::timeout(Duration::from_secs(10), handle.join())
        .await
        .unwrap();
    assert_eq!(status.state, SupervisorState::Stopped);

    let mut cache = interest(&["cpu", "mem", "disk"]);
    assert!(store.read(&mut cache).await);
    assert_eq!(cache["cpu"], "12");
    assert_eq!(cache["mem"], "40");
    assert_eq!(cache["disk"], "");
}

#[cfg(unix)]
#[tokio::test]
async fn test_producer_run_outcome() {
    let store = TelemetryHandle::spawn();
    let run = ProducerRun::spawn(r#"printf '{"k":"v"}'; echo bad >&2; exit 3"#).unwrap();
    assert!(run.pid().is_some());

    let outcome = run.drive(&store).await.unwrap();
    assert_eq!(outcome.status.code(), Some(3));
    assert_eq!(outcome.output.records, 1);
    assert_eq!(outcome.diagnostics, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn test_invalid_utf8_on_stderr_keeps_producer_running() {
    let store = TelemetryHandle::spawn();
    let command = r#"printf 'bad \377\n' >&2; sleep 0.3; echo more >&2; printf '{"k":"v"}'"#;
    let run = ProducerRun::spawn(command).unwrap();

    let outcome = run.drive(&store).await.unwrap();
    assert!(outcome.status.success());
    assert_eq!(outcome.output.records, 1);
    assert_eq!(outcome.diagnostics, 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_abort_kills_running_producer() {
    let store = TelemetryHandle::spawn();
    let mut handle = Supervisor::new("sleep 30", RestartPolicy::default(), store).spawn();

    let status = handle.wait_for_spawns(1).await;
    assert_eq!(status.spawns, 1);

    handle.abort();
    let status = tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap();
    assert_eq!(status.spawns, 1);
}
