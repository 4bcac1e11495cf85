//! Supervisor error types
//!
//! None of these ever reach the telemetry store. They end up in the log.

use thiserror::Error;

/// Failure to bring up or reap one producer run
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The shell could not be started
    #[error("failed to start telemetry command `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A standard stream was not captured
    #[error("failed to capture {0} of telemetry command")]
    MissingPipe(&'static str),

    /// Waiting on the child failed
    #[error("failed to wait on telemetry command: {0}")]
    Wait(#[source] std::io::Error),
}

/// One producer record that could not be decoded
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not valid JSON; the rest of the offending line was skipped
    #[error("malformed telemetry record: {0}")]
    Syntax(#[source] serde_json::Error),

    /// Valid JSON, but not an object whose values are all strings
    #[error("telemetry record is not a string map: {0}")]
    NotAStringMap(String),

    /// The stream ended in the middle of a record
    #[error("telemetry stream ended inside a record ({0} bytes discarded)")]
    Truncated(usize),

    /// An unfinished record outgrew the decode buffer
    #[error("telemetry record exceeds {max} bytes ({0} bytes discarded)", max = super::decoder::MAX_RECORD_BYTES)]
    Oversized(usize),
}
