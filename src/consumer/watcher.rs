//! Console consumer that logs telemetry changes
//!
//! Polls the store on a fixed tick with its cache of watched keys, the same
//! way a widget would, and logs each key whose value moved.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::dependency::{Dependency, TelemetryDependency};
use crate::telemetry::TelemetryHandle;

/// Periodic logger for a fixed set of telemetry keys
pub struct Watcher {
    dependency: TelemetryDependency,
    poll_interval: Duration,
}

impl Watcher {
    /// Watch `keys` in `store`, polling every `poll_interval`
    ///
    /// All keys start out empty, so the first poll reports every key the
    /// dataset already holds.
    pub fn new<I, S>(store: TelemetryHandle, keys: I, poll_interval: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dependency: TelemetryDependency::for_keys(store, keys),
            poll_interval,
        }
    }

    /// Poll once, returning the keys that changed with their new values
    pub async fn poll(&mut self) -> Vec<(String, String)> {
        let before = self.dependency.cache().clone();
        if !self.dependency.has_changed().await {
            return Vec::new();
        }

        let mut changes: Vec<(String, String)> = self
            .dependency
            .cache()
            .iter()
            .filter(|(key, value)| before.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        changes.sort();
        changes
    }

    /// Poll forever, logging every change
    pub async fn run(mut self) {
        debug!(
            keys = self.dependency.cache().len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            "Telemetry watcher started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            for (key, value) in self.poll().await {
                info!(key = %key, value = %value, "Telemetry changed");
            }
        }
    }
}
