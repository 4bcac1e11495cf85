//! Command enum for the telemetry store actor
//!
//! Writes are fire-and-forget. Reads carry a oneshot channel and always get
//! exactly one reply.

use super::types::{ReadReply, Record};
use tokio::sync::oneshot;

/// Commands for the telemetry store actor
///
/// Every command goes through the same unbounded queue, so a read always
/// observes every write that was handed off before it.
pub enum TelemetryCommand {
    /// Upsert a record into the dataset
    ///
    /// Sent by the supervisor for each decoded producer record.
    Write {
        /// Keys and values to upsert
        data: Record,
    },

    /// Compare a consumer cache against the dataset
    ///
    /// The actor replies with the stale entries of `interest` and their
    /// current values.
    Read {
        /// Copy of the consumer's cache of last-seen values
        interest: Record,
        /// Response channel
        response: oneshot::Sender<ReadReply>,
    },

    /// Copy the whole dataset
    Snapshot {
        /// Response channel
        response: oneshot::Sender<Record>,
    },

    /// Gracefully shut down the store actor
    Shutdown,
}

impl std::fmt::Debug for TelemetryCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryCommand::Write { data } => f
                .debug_struct("Write")
                .field("keys", &data.len())
                .finish(),
            TelemetryCommand::Read { interest, .. } => f
                .debug_struct("Read")
                .field("keys", &interest.len())
                .finish_non_exhaustive(),
            TelemetryCommand::Snapshot { .. } => {
                f.debug_struct("Snapshot").finish_non_exhaustive()
            }
            TelemetryCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}
