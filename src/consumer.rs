//! Consumer side of the telemetry store
//!
//! Consumers (widgets, the console watcher) keep their own cache of the keys
//! they care about and poll the store with it. The dependency types here let
//! a consumer declare what its templates depend on and ask, on each tick,
//! whether anything it depends on moved.

mod dependency;
mod watcher;

pub use dependency::{
    Dependency, DependencySet, SettingDependency, StaticDependency, TelemetryDependency,
    TELEMETRY_PREFIX,
};
pub use watcher::Watcher;
