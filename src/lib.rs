//! deck-telemetry - supervised telemetry feed for control-surface widgets
//!
//! A single external producer command is kept running by the
//! [`supervisor`]; its stdout records are upserted into the shared dataset
//! held by the [`telemetry`] store actor; [`consumer`]s poll the store with
//! their own caches and learn which of their keys changed.

pub mod config;
pub mod consumer;
pub mod supervisor;
pub mod telemetry;

pub use config::AppConfig;
pub use supervisor::{RestartPolicy, Supervisor, SupervisorHandle, SupervisorState};
pub use telemetry::{Record, TelemetryHandle};
