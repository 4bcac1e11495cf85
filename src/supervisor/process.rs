//! One spawn-to-exit cycle of the producer command
//!
//! The command runs through `sh -c` so the configured string may use shell
//! syntax. Stdout is decoded into store writes and stderr is relayed to the
//! log, concurrently, until both streams close.

use std::process::{ExitStatus, Stdio};

use chrono::{DateTime, Local};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

use super::decoder::RecordDecoder;
use super::error::SupervisorError;
use crate::telemetry::TelemetryHandle;

const READ_CHUNK: usize = 8 * 1024;

/// Shell used to interpret the producer command
pub const DEFAULT_SHELL: &str = "sh";

/// A live producer process
pub struct ProducerRun {
    /// Wall-clock start time, for logs
    pub started_at: DateTime<Local>,
    child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

/// What happened during one run
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome {
    pub status: ExitStatus,
    pub output: OutputStats,
    /// Lines relayed from stderr
    pub diagnostics: u64,
}

/// Counters from the stdout reader
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    /// Records forwarded to the store
    pub records: u64,
    /// Records dropped as malformed
    pub malformed: u64,
}

impl ProducerRun {
    /// Start `sh -c <command>` with both output streams piped
    ///
    /// The child is killed if the run is dropped before it exits.
    pub fn spawn(command: &str) -> Result<Self, SupervisorError> {
        Self::spawn_with_shell(DEFAULT_SHELL, command)
    }

    /// Start `<shell> -c <command>` with both output streams piped
    pub fn spawn_with_shell(shell: &str, command: &str) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(shell);
        cmd.arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            command: command.to_string(),
            source,
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or(SupervisorError::MissingPipe("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(SupervisorError::MissingPipe("stderr"))?;

        debug!(pid = ?child.id(), "Telemetry command started");

        Ok(Self {
            started_at: Local::now(),
            child,
            stdout,
            stderr,
        })
    }

    /// OS process id, while the process is alive
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Drain both streams into `store` and the log, then reap the process
    pub async fn drive(self, store: &TelemetryHandle) -> Result<RunOutcome, SupervisorError> {
        let ProducerRun {
            mut child,
            stdout,
            stderr,
            started_at: _,
        } = self;

        let (output, diagnostics) =
            tokio::join!(read_records(stdout, store), relay_diagnostics(stderr));

        let status = child.wait().await.map_err(SupervisorError::Wait)?;

        Ok(RunOutcome {
            status,
            output,
            diagnostics,
        })
    }
}

/// Decode records from `reader` and hand each one to the store
///
/// Malformed records are logged and skipped. Returns at end of stream or on
/// a read error.
pub(super) async fn read_records<R>(mut reader: R, store: &TelemetryHandle) -> OutputStats
where
    R: AsyncRead + Unpin,
{
    let mut decoder = RecordDecoder::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut stats = OutputStats::default();

    loop {
        let n = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to read telemetry output");
                break;
            }
        };

        decoder.push(&chunk[..n]);
        while let Some(result) = decoder.next_record() {
            match result {
                Ok(record) => {
                    store.write(record);
                    stats.records += 1;
                }
                Err(e) => {
                    warn!(error = %e, "Skipping telemetry record");
                    stats.malformed += 1;
                }
            }
        }
    }

    if let Some(e) = decoder.finish() {
        warn!(error = %e, "Skipping telemetry record");
        stats.malformed += 1;
    }

    stats
}

/// Relay each line of `reader` verbatim to the log
///
/// Stderr is arbitrary bytes; invalid UTF-8 is logged lossily and never
/// stops the relay. Only EOF or an I/O error ends it, so the producer's
/// stderr pipe stays open for its whole life.
pub(super) async fn relay_diagnostics<R>(reader: R) -> u64
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut line = Vec::new();
    let mut count = 0;

    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&line);
                warn!(
                    target: "producer",
                    source = "producer",
                    "{}",
                    text.trim_end_matches(['\r', '\n'])
                );
                count += 1;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read telemetry diagnostics");
                break;
            }
        }
    }

    count
}
