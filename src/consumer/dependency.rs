//! Polymorphic dependencies of a templated consumer

use async_trait::async_trait;
use tokio::sync::watch;

use crate::telemetry::{Record, TelemetryHandle};

/// Prefix marking an expression as a telemetry key lookup
pub const TELEMETRY_PREFIX: &str = "telemetry.";

/// Something a consumer's expressions may depend on
#[async_trait]
pub trait Dependency: Send {
    /// Whether any of `expressions` needs this dependency
    fn is_relevant(&self, expressions: &[String]) -> bool;

    /// Whether the underlying value moved since it was last resolved
    async fn has_changed(&mut self) -> bool;

    /// Replacement text for `expression`, if this dependency handles it
    fn resolve(&mut self, expression: &str) -> Option<String>;
}

/// Base dependency: matches a fixed set of names, never changes, resolves
/// nothing
#[derive(Debug, Clone, Default)]
pub struct StaticDependency {
    names: Vec<String>,
}

impl StaticDependency {
    /// Dependency on a fixed list of names that never changes
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    fn matches(&self, expression: &str) -> bool {
        self.names.iter().any(|n| n == expression)
    }
}

#[async_trait]
impl Dependency for StaticDependency {
    fn is_relevant(&self, expressions: &[String]) -> bool {
        expressions.iter().any(|x| self.matches(x))
    }

    async fn has_changed(&mut self) -> bool {
        false
    }

    fn resolve(&mut self, _expression: &str) -> Option<String> {
        None
    }
}

/// Dependency on a process-wide setting such as display brightness
pub struct SettingDependency {
    base: StaticDependency,
    name: String,
    setting: watch::Receiver<String>,
}

impl SettingDependency {
    /// Dependency on the setting `name`, whose current value comes from
    /// `setting`
    pub fn new(name: impl Into<String>, setting: watch::Receiver<String>) -> Self {
        let name = name.into();
        Self {
            base: StaticDependency::new([name.clone()]),
            name,
            setting,
        }
    }
}

#[async_trait]
impl Dependency for SettingDependency {
    fn is_relevant(&self, expressions: &[String]) -> bool {
        self.base.is_relevant(expressions)
    }

    async fn has_changed(&mut self) -> bool {
        // A closed sender means the setting can no longer move
        self.setting.has_changed().unwrap_or(false)
    }

    fn resolve(&mut self, expression: &str) -> Option<String> {
        if expression != self.name {
            return None;
        }
        Some(self.setting.borrow_and_update().clone())
    }
}

/// Dependency on telemetry keys, backed by a private cache
///
/// Expressions of the form `telemetry.<key>` select the keys. The cache
/// holds exactly those keys and is the interest set sent to the store.
pub struct TelemetryDependency {
    store: TelemetryHandle,
    cache: Record,
}

impl TelemetryDependency {
    /// Build a dependency for the telemetry keys named in `expressions`
    pub fn for_expressions(store: TelemetryHandle, expressions: &[String]) -> Self {
        let cache = expressions
            .iter()
            .filter_map(|x| x.strip_prefix(TELEMETRY_PREFIX))
            .map(|key| (key.to_string(), String::new()))
            .collect();
        Self { store, cache }
    }

    /// Build a dependency for raw key names
    pub fn for_keys<I, S>(store: TelemetryHandle, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cache = keys
            .into_iter()
            .map(|key| (key.into(), String::new()))
            .collect();
        Self { store, cache }
    }

    /// Last values seen for each key
    pub fn cache(&self) -> &Record {
        &self.cache
    }
}

#[async_trait]
impl Dependency for TelemetryDependency {
    fn is_relevant(&self, expressions: &[String]) -> bool {
        expressions
            .iter()
            .filter_map(|x| x.strip_prefix(TELEMETRY_PREFIX))
            .any(|key| self.cache.contains_key(key))
    }

    async fn has_changed(&mut self) -> bool {
        self.store.read(&mut self.cache).await
    }

    fn resolve(&mut self, expression: &str) -> Option<String> {
        let key = expression.strip_prefix(TELEMETRY_PREFIX)?;
        self.cache.get(key).cloned()
    }
}

/// The dependencies one consumer actually uses
#[derive(Default)]
pub struct DependencySet {
    dependencies: Vec<Box<dyn Dependency>>,
}

impl DependencySet {
    /// Create an empty set; dependencies are added with
    /// [`append_if_relevant`](Self::append_if_relevant)
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `dependency` only if one of `expressions` needs it
    ///
    /// Returns whether it was kept.
    pub fn append_if_relevant<D>(&mut self, dependency: D, expressions: &[String]) -> bool
    where
        D: Dependency + 'static,
    {
        if !dependency.is_relevant(expressions) {
            return false;
        }
        self.dependencies.push(Box::new(dependency));
        true
    }

    /// Number of dependencies kept
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// True if no expression needed any dependency
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    /// Whether the consumer needs to redraw
    ///
    /// Every dependency is polled, so each one refreshes its own state even
    /// after an earlier one already reported a change.
    pub async fn requires_update(&mut self) -> bool {
        let mut changed = false;
        for dependency in &mut self.dependencies {
            changed |= dependency.has_changed().await;
        }
        changed
    }

    /// Replacement for `expression` from the first dependency that handles it
    pub fn resolve(&mut self, expression: &str) -> Option<String> {
        self.dependencies
            .iter_mut()
            .find_map(|d| d.resolve(expression))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exprs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_static_dependency_is_noop() {
        let mut dep = StaticDependency::new(["brightness"]);
        assert!(dep.is_relevant(&exprs(&["label", "brightness"])));
        assert!(!dep.is_relevant(&exprs(&["label"])));
        assert!(!dep.has_changed().await);
        assert_eq!(dep.resolve("brightness"), None);
    }

    #[tokio::test]
    async fn test_setting_dependency_tracks_changes() {
        let (tx, rx) = watch::channel("50".to_string());
        let mut dep = SettingDependency::new("brightness", rx);

        assert!(!dep.has_changed().await);
        assert_eq!(dep.resolve("brightness").as_deref(), Some("50"));
        assert_eq!(dep.resolve("other"), None);

        tx.send("80".to_string()).unwrap();
        assert!(dep.has_changed().await);
        assert_eq!(dep.resolve("brightness").as_deref(), Some("80"));
        assert!(!dep.has_changed().await);
    }

    #[tokio::test]
    async fn test_telemetry_dependency() {
        let store = TelemetryHandle::spawn();
        let expressions = exprs(&["telemetry.cpu", "brightness", "telemetry.mem"]);
        let mut dep = TelemetryDependency::for_expressions(store.clone(), &expressions);

        assert!(dep.is_relevant(&expressions));
        assert_eq!(dep.cache().len(), 2);
        assert!(!dep.has_changed().await);
        assert_eq!(dep.resolve("telemetry.cpu").as_deref(), Some(""));

        let mut update = Record::new();
        update.insert("cpu".to_string(), "12".to_string());
        update.insert("gpu".to_string(), "99".to_string());
        store.write(update);

        assert!(dep.has_changed().await);
        assert_eq!(dep.resolve("telemetry.cpu").as_deref(), Some("12"));
        assert_eq!(dep.resolve("telemetry.gpu"), None);
        assert_eq!(dep.resolve("cpu"), None);
        assert!(!dep.has_changed().await);
    }

    #[tokio::test]
    async fn test_dependency_set() {
        let store = TelemetryHandle::spawn();
        let (tx, rx) = watch::channel("10".to_string());
        let expressions = exprs(&["telemetry.load", "brightness"]);

        let mut set = DependencySet::new();
        assert!(set.is_empty());
        assert!(!set.append_if_relevant(StaticDependency::new(["unused"]), &expressions));
        assert!(set.append_if_relevant(SettingDependency::new("brightness", rx), &expressions));
        assert!(set.append_if_relevant(
            TelemetryDependency::for_expressions(store.clone(), &expressions),
            &expressions,
        ));
        assert_eq!(set.len(), 2);
        assert!(!set.is_empty());
        assert!(!set.requires_update().await);

        // Both dependencies change; both must refresh in one poll
        tx.send("20".to_string()).unwrap();
        let mut update = Record::new();
        update.insert("load".to_string(), "0.5".to_string());
        store.write(update);

        assert!(set.requires_update().await);
        assert_eq!(set.resolve("telemetry.load").as_deref(), Some("0.5"));
        assert_eq!(set.resolve("brightness").as_deref(), Some("20"));
        assert_eq!(set.resolve("label"), None);
        assert!(!set.requires_update().await);
    }
}
