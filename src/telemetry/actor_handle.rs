//! TelemetryHandle - public API for the TelemetryActor
//!
//! Writes are fire-and-forget; reads await a oneshot reply.

use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use super::commands::TelemetryCommand;
use super::types::Record;

/// Handle for interacting with the TelemetryActor
///
/// Cheap to clone; every producer and consumer holds its own copy. None of
/// the methods can fail. If the actor is gone, writes are dropped and reads
/// report no change.
#[derive(Clone)]
pub struct TelemetryHandle {
    /// Command channel to the TelemetryActor
    cmd_tx: mpsc::UnboundedSender<TelemetryCommand>,
}

impl TelemetryHandle {
    /// Create a new TelemetryHandle with the given command sender
    pub fn new(cmd_tx: mpsc::UnboundedSender<TelemetryCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Spawn a new TelemetryActor and return a handle
    ///
    /// This is a convenience wrapper around `TelemetryActor::spawn`.
    pub fn spawn() -> Self {
        super::actor::TelemetryActor::spawn()
    }

    /// Upsert `data` into the dataset
    ///
    /// Fire-and-forget: returns as soon as the command is queued.
    pub fn write(&self, data: Record) {
        if self.cmd_tx.send(TelemetryCommand::Write { data }).is_err() {
            trace!("Telemetry store closed; write dropped");
        }
    }

    /// Refresh a consumer cache from the dataset
    ///
    /// Every entry of `interest` whose value differs from the dataset is
    /// overwritten with the current value (the empty string for unknown
    /// keys). Returns true if anything changed.
    pub async fn read(&self, interest: &mut Record) -> bool {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = TelemetryCommand::Read {
            interest: interest.clone(),
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return false;
        }

        // The reply is dropped unanswered if the actor stops without
        // serving the request; the cache is left as it was.
        let Ok(reply) = response_rx.await else {
            return false;
        };
        let changed = reply.changed();
        interest.extend(reply.updates);
        changed
    }

    /// Copy of the whole dataset
    pub async fn snapshot(&self) -> Record {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = TelemetryCommand::Snapshot {
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return Record::new();
        }

        response_rx.await.ok().unwrap_or_default()
    }

    /// Check if the actor is still alive
    pub fn is_alive(&self) -> bool {
        !self.cmd_tx.is_closed()
    }

    /// Signal the actor to shut down gracefully
    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(TelemetryCommand::Shutdown);
    }
}
