//! Producer supervisor - keeps one telemetry command alive
//!
//! Runs the configured command, feeds its stdout into the telemetry store
//! and restarts it when it exits, unless it exits so quickly that it is
//! presumed broken. In that case supervision stops for good and consumers
//! simply stop seeing updates.

mod decoder;
mod error;
mod policy;
mod process;

#[cfg(test)]
mod tests;

pub use decoder::RecordDecoder;
pub use error::{DecodeError, SupervisorError};
pub use policy::{
    ExitDecision, RestartPolicy, SupervisorState, SupervisorStatus, DEFAULT_MIN_UPTIME,
};
pub use process::{OutputStats, ProducerRun, RunOutcome, DEFAULT_SHELL};

use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::telemetry::TelemetryHandle;

/// Supervisor for a single producer command
///
/// State machine:
///
/// ```text
///   ┌──────────► Spawning ──ok──► Running ──exit──┐
///   │               │                              │
///   │             error                            ▼
///   │               └──────────────────────► decide(elapsed)
///   │                                              │
///   └──────────── Restart (ran ≥ min_uptime) ◄─────┤
///                                                  │
///                 Stop (ran < min_uptime) ─► Stopped (terminal)
/// ```
pub struct Supervisor {
    shell: String,
    command: String,
    policy: RestartPolicy,
    store: TelemetryHandle,
    status_tx: watch::Sender<SupervisorStatus>,
}

impl Supervisor {
    /// Create a supervisor for `command`, feeding records into `store`
    ///
    /// Nothing runs until [`spawn`](Self::spawn) or [`run`](Self::run).
    pub fn new(command: impl Into<String>, policy: RestartPolicy, store: TelemetryHandle) -> Self {
        let (status_tx, _) = watch::channel(SupervisorStatus::default());
        Self {
            shell: DEFAULT_SHELL.to_string(),
            command: command.into(),
            policy,
            store,
            status_tx,
        }
    }

    /// Interpret the command with `shell` instead of `sh`
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Receiver for status changes
    pub fn subscribe(&self) -> watch::Receiver<SupervisorStatus> {
        self.status_tx.subscribe()
    }

    /// Run the supervision loop on its own task
    pub fn spawn(self) -> SupervisorHandle {
        let status = self.subscribe();
        let task = tokio::spawn(self.run());
        SupervisorHandle { status, task }
    }

    /// Supervision loop
    ///
    /// Only returns once the restart policy has decided to stop.
    pub async fn run(self) -> SupervisorStatus {
        loop {
            let started = Instant::now();
            self.status_tx.send_modify(|s| {
                s.state = SupervisorState::Spawning;
                s.spawns += 1;
            });

            info!(command = %self.command, "Starting telemetry command");

            let result = match ProducerRun::spawn_with_shell(&self.shell, &self.command) {
                Ok(run) => {
                    info!(
                        pid = ?run.pid(),
                        started_at = %run.started_at.format("%H:%M:%S"),
                        "Telemetry command running"
                    );
                    self.set_state(SupervisorState::Running);
                    run.drive(&self.store).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) if outcome.status.success() => {
                    info!(
                        records = outcome.output.records,
                        malformed = outcome.output.malformed,
                        diagnostics = outcome.diagnostics,
                        "Telemetry command exited"
                    );
                }
                Ok(outcome) => {
                    warn!(
                        status = %outcome.status,
                        records = outcome.output.records,
                        malformed = outcome.output.malformed,
                        diagnostics = outcome.diagnostics,
                        "Telemetry command failed"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Telemetry command failed");
                }
            }

            let elapsed = started.elapsed();
            match self.policy.decide(elapsed) {
                ExitDecision::Restart => {
                    info!(elapsed_secs = elapsed.as_secs(), "Command ended; restarting");
                }
                ExitDecision::Stop => {
                    warn!(
                        elapsed_ms = elapsed.as_millis() as u64,
                        min_uptime_secs = self.policy.min_uptime.as_secs(),
                        "Command ended too quickly; not restarting"
                    );
                    self.set_state(SupervisorState::Stopped);
                    return *self.status_tx.borrow();
                }
            }
        }
    }

    fn set_state(&self, state: SupervisorState) {
        self.status_tx.send_modify(|s| s.state = state);
    }
}

/// Handle to a supervisor running on its own task
pub struct SupervisorHandle {
    status: watch::Receiver<SupervisorStatus>,
    task: JoinHandle<SupervisorStatus>,
}

impl SupervisorHandle {
    /// Latest published status
    pub fn status(&self) -> SupervisorStatus {
        *self.status.borrow()
    }

    /// Wait until at least `n` spawn attempts have been made
    ///
    /// Returns early with the last status if the supervisor stops first.
    pub async fn wait_for_spawns(&mut self, n: u64) -> SupervisorStatus {
        let reached = self.status.wait_for(|s| s.spawns >= n).await.map(|s| *s);
        reached.unwrap_or_else(|_| *self.status.borrow())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the supervisor to stop on its own
    pub async fn join(self) -> SupervisorStatus {
        match self.task.await {
            Ok(status) => status,
            Err(_) => *self.status.borrow(),
        }
    }

    /// Stop supervising; a running child is killed
    pub fn abort(&self) {
        self.task.abort();
    }
}
