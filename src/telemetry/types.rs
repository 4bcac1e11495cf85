//! Telemetry dataset type definitions
//!
//! Values are opaque strings. A key the dataset has never seen reads as the
//! empty string.

use std::collections::HashMap;

/// One decoded producer record, a write batch, or a consumer interest set
pub type Record = HashMap<String, String>;

/// The canonical dataset held by the store actor
pub type Dataset = HashMap<String, String>;

/// Reply to a read request
///
/// Carries only the entries of the interest set whose value moved. The
/// caller keeps its own map and merges these in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadReply {
    /// Changed keys with their current dataset values
    pub updates: Record,
}

impl ReadReply {
    /// True if at least one entry of the interest set was stale
    pub fn changed(&self) -> bool {
        !self.updates.is_empty()
    }
}

/// Upsert every entry of `update` into `dataset` (last write wins per key)
pub fn apply_write(dataset: &mut Dataset, update: Record) {
    dataset.extend(update);
}

/// Entries of `interest` that differ from `dataset`, with the dataset value
///
/// Only keys already present in `interest` are looked at.
pub fn changed_entries(dataset: &Dataset, interest: &Record) -> Record {
    interest
        .iter()
        .filter_map(|(key, value)| {
            let current = dataset.get(key).map(String::as_str).unwrap_or("");
            (value != current).then(|| (key.clone(), current.to_string()))
        })
        .collect()
}

/// Bring `interest` up to date with `dataset`
///
/// Returns true if any entry was overwritten.
pub fn diff_into(dataset: &Dataset, interest: &mut Record) -> bool {
    let updates = changed_entries(dataset, interest);
    let changed = !updates.is_empty();
    interest.extend(updates);
    changed
}
