//! Telemetry dataset store - the shared key/value view of producer output
//!
//! The dataset is owned by a single actor task. Producers hand it write
//! batches, consumers poll it with their own cache of last-seen values and
//! get back only the keys that moved. The store keeps no subscription state.

mod actor;
mod actor_handle;
mod commands;
mod types;

pub use actor::TelemetryActor;
pub use actor_handle::TelemetryHandle;
pub use commands::TelemetryCommand;
pub use types::{apply_write, changed_entries, diff_into, Dataset, ReadReply, Record};
