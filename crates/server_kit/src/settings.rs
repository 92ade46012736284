//! # Settings Source
//!
//! Typed, immutable configuration snapshots with change notification.
//!
//! Every function declares a settings type implementing [`Settings`]. The
//! source keeps the latest snapshot of each type and replaces it wholesale
//! whenever configuration is published or reloaded. Each published snapshot
//! carries a revision number that increases across the whole source, so a
//! subscriber receiving notifications out of order can tell which one is
//! newest.
//!
//! Subscribers run on the publishing thread, in subscription order. A failing
//! subscriber is logged and reported; it never prevents delivery to the
//! others.

use crate::error::{FunctionError, SettingsError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A configuration section owned by one function.
pub trait Settings: DeserializeOwned + Send + Sync + 'static {
    /// Table name in the settings document, e.g. `"greeter"`.
    const SECTION: &'static str;

    /// Whether the owning function should be running.
    fn is_enabled(&self) -> bool;
}

/// An immutable settings value together with the revision it was published at.
#[derive(Debug)]
pub struct SettingsSnapshot<T> {
    revision: u64,
    settings: Arc<T>,
}

impl<T> SettingsSnapshot<T> {
    /// Revision the snapshot was published at; later publishes have higher ones.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl<T> Clone for SettingsSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            revision: self.revision,
            settings: Arc::clone(&self.settings),
        }
    }
}

impl<T> Deref for SettingsSnapshot<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.settings
    }
}

type AnySettings = Arc<dyn Any + Send + Sync>;

/// A published change, delivered to every subscriber.
#[derive(Clone)]
pub struct SettingsChange {
    section: &'static str,
    revision: u64,
    value: AnySettings,
}

impl std::fmt::Debug for SettingsChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsChange")
            .field("section", &self.section)
            .field("revision", &self.revision)
            .finish()
    }
}

impl SettingsChange {
    /// Section name of the changed settings type.
    pub fn section(&self) -> &'static str {
        self.section
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the typed snapshot when this change is for `T`.
    pub fn downcast<T: Settings>(&self) -> Option<SettingsSnapshot<T>> {
        Arc::clone(&self.value)
            .downcast::<T>()
            .ok()
            .map(|settings| SettingsSnapshot {
                revision: self.revision,
                settings,
            })
    }
}

/// Handle returned by [`SettingsSource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&SettingsChange) -> Result<(), FunctionError> + Send + Sync>;

/// Outcome of a single publish.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub section: &'static str,
    pub revision: u64,
    /// Subscribers that accepted the change
    pub delivered: usize,
    /// Errors returned by subscribers that rejected it
    pub failures: Vec<FunctionError>,
}

impl PublishReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct SectionEntry {
    type_id: TypeId,
    parse: fn(toml::Value) -> Result<AnySettings, toml::de::Error>,
}

fn parse_section<T: Settings>(value: toml::Value) -> Result<AnySettings, toml::de::Error> {
    let settings: T = value.try_into()?;
    Ok(Arc::new(settings))
}

/// Holds the current settings snapshots and notifies subscribers of changes.
#[derive(Default)]
pub struct SettingsSource {
    sections: RwLock<HashMap<&'static str, SectionEntry>>,
    current: DashMap<TypeId, (u64, AnySettings)>,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    revision: AtomicU64,
    next_subscription: AtomicU64,
}

impl std::fmt::Debug for SettingsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsSource")
            .field("sections", &self.sections.read().keys().collect::<Vec<_>>())
            .field("revision", &self.revision.load(Ordering::SeqCst))
            .field("subscribers", &self.subscribers.read().len())
            .finish()
    }
}

impl SettingsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `T` so that [`reload_from_str`](Self::reload_from_str) can parse its section.
    ///
    /// Registering the same type twice is a no-op.
    pub fn register<T: Settings>(&self) -> Result<(), SettingsError> {
        let mut sections = self.sections.write();
        match sections.get(T::SECTION) {
            Some(entry) if entry.type_id == TypeId::of::<T>() => Ok(()),
            Some(_) => Err(SettingsError::DuplicateSection(T::SECTION.to_string())),
            None => {
                sections.insert(
                    T::SECTION,
                    SectionEntry {
                        type_id: TypeId::of::<T>(),
                        parse: parse_section::<T>,
                    },
                );
                debug!(section = T::SECTION, "Settings section registered");
                Ok(())
            }
        }
    }

    /// Names of all registered sections.
    pub fn sections(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sections.read().keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// The latest snapshot of `T`, if one has been published.
    pub fn get<T: Settings>(&self) -> Option<SettingsSnapshot<T>> {
        let (revision, value) = self
            .current
            .get(&TypeId::of::<T>())
            .map(|entry| (entry.0, Arc::clone(&entry.1)))?;
        value
            .downcast::<T>()
            .ok()
            .map(|settings| SettingsSnapshot { revision, settings })
    }

    /// Current revision counter; 0 before anything was published.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Replaces the snapshot of `T` and notifies every subscriber.
    pub fn publish<T: Settings>(&self, settings: T) -> PublishReport {
        self.publish_erased(T::SECTION, TypeId::of::<T>(), Arc::new(settings))
    }

    fn publish_erased(&self, section: &'static str, type_id: TypeId, value: AnySettings) -> PublishReport {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;

        // Concurrent publishes of one type may land out of order; keep the newest.
        match self.current.entry(type_id) {
            Entry::Occupied(mut entry) => {
                if entry.get().0 < revision {
                    entry.insert((revision, Arc::clone(&value)));
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((revision, Arc::clone(&value)));
            }
        }

        let change = SettingsChange {
            section,
            revision,
            value,
        };
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .read()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();

        let mut report = PublishReport {
            section,
            revision,
            ..Default::default()
        };
        for subscriber in subscribers {
            match subscriber(&change) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(section, revision, error = %e, "Settings subscriber rejected change");
                    report.failures.push(e);
                }
            }
        }
        debug!(section, revision, delivered = report.delivered, "Settings published");
        report
    }

    /// Subscribes to every published change.
    pub fn subscribe<F>(&self, subscriber: F) -> SubscriptionId
    where
        F: Fn(&SettingsChange) -> Result<(), FunctionError> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().push((id, Arc::new(subscriber)));
        id
    }

    /// Subscribes to changes of `T` only.
    pub fn subscribe_to<T, F>(&self, subscriber: F) -> SubscriptionId
    where
        T: Settings,
        F: Fn(SettingsSnapshot<T>) -> Result<(), FunctionError> + Send + Sync + 'static,
    {
        self.subscribe(move |change| match change.downcast::<T>() {
            Some(snapshot) => subscriber(snapshot),
            None => Ok(()),
        })
    }

    /// Removes a subscription. Returns `false` when it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.write();
        let before = subscribers.len();
        subscribers.retain(|(existing, _)| *existing != id);
        subscribers.len() != before
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Parses a TOML document and publishes every registered section it contains.
    ///
    /// All sections are parsed before any is published, so a document with
    /// one bad section changes nothing. Tables without a registered type are
    /// ignored; registered sections missing from the document keep their
    /// previous snapshot.
    pub fn reload_from_str(&self, document: &str) -> Result<Vec<PublishReport>, SettingsError> {
        let table: toml::Table = document
            .parse()
            .map_err(|e: toml::de::Error| SettingsError::Parse(e.to_string()))?;

        let parsed = {
            let sections = self.sections.read();
            let mut parsed = Vec::new();
            for (name, entry) in sections.iter() {
                let Some(value) = table.get(*name) else {
                    continue;
                };
                let settings = (entry.parse)(value.clone())
                    .map_err(|e| SettingsError::Parse(format!("[{name}] {e}")))?;
                parsed.push((*name, entry.type_id, settings));
            }
            parsed
        };

        let reports: Vec<PublishReport> = parsed
            .into_iter()
            .map(|(name, type_id, settings)| self.publish_erased(name, type_id, settings))
            .collect();
        info!(sections = reports.len(), "Settings reloaded");
        Ok(reports)
    }

    /// Reads `path` and reloads it with [`reload_from_str`](Self::reload_from_str).
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> Result<Vec<PublishReport>, SettingsError> {
        let path = path.as_ref();
        let document =
            std::fs::read_to_string(path).map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        self.reload_from_str(&document)
    }

    /// Parses a single section of a document without publishing it.
    pub fn parse_section<T: Settings>(document: &str) -> Result<T, SettingsError> {
        let mut table: toml::Table = document
            .parse()
            .map_err(|e: toml::de::Error| SettingsError::Parse(e.to_string()))?;
        let value = table
            .remove(T::SECTION)
            .ok_or_else(|| SettingsError::UnknownSection(T::SECTION.to_string()))?;
        value
            .try_into()
            .map_err(|e: toml::de::Error| SettingsError::Parse(format!("[{}] {e}", T::SECTION)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;
    use std::sync::atomic::AtomicUsize;
    use tempfile::NamedTempFile;

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct TeleportSettings {
        is_enabled: bool,
        #[serde(default)]
        cooldown_seconds: u32,
    }

    impl Settings for TeleportSettings {
        const SECTION: &'static str = "teleport";
        fn is_enabled(&self) -> bool {
            self.is_enabled
        }
    }

    #[derive(Debug, Clone, PartialEq, Deserialize)]
    struct VoteSettings {
        is_enabled: bool,
    }

    impl Settings for VoteSettings {
        const SECTION: &'static str = "vote";
        fn is_enabled(&self) -> bool {
            self.is_enabled
        }
    }

    #[derive(Debug, Deserialize)]
    struct ClashingSettings {}

    impl Settings for ClashingSettings {
        const SECTION: &'static str = "teleport";
        fn is_enabled(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_publish_and_get() {
        let source = SettingsSource::new();
        assert!(source.get::<TeleportSettings>().is_none());

        source.publish(TeleportSettings {
            is_enabled: true,
            cooldown_seconds: 30,
        });
        let snapshot = source.get::<TeleportSettings>().unwrap();
        assert!(snapshot.is_enabled());
        assert_eq!(snapshot.cooldown_seconds, 30);
        assert_eq!(snapshot.revision(), 1);
        assert!(source.get::<VoteSettings>().is_none());
    }

    #[test]
    fn test_snapshots_are_replaced_not_mutated() {
        let source = SettingsSource::new();
        source.publish(VoteSettings { is_enabled: true });
        let old = source.get::<VoteSettings>().unwrap();
        source.publish(VoteSettings { is_enabled: false });
        let new = source.get::<VoteSettings>().unwrap();

        assert!(old.is_enabled);
        assert!(!new.is_enabled);
        assert!(new.revision() > old.revision());
    }

    #[test]
    fn test_typed_subscription_filters_by_type() {
        let source = SettingsSource::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = Arc::clone(&seen);
        source.subscribe_to::<VoteSettings, _>(move |snapshot| {
            assert!(snapshot.is_enabled);
            s.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        source.publish(TeleportSettings {
            is_enabled: false,
            cooldown_seconds: 0,
        });
        source.publish(VoteSettings { is_enabled: true });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let source = SettingsSource::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        source.subscribe(|_| Err(FunctionError::ConfigurationMissing("broken".into())));
        let d = Arc::clone(&delivered);
        source.subscribe(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let report = source.publish(VoteSettings { is_enabled: true });
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(!report.is_clean());
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let source = SettingsSource::new();
        let id = source.subscribe(|_| Ok(()));
        assert_eq!(source.subscriber_count(), 1);
        assert!(source.unsubscribe(id));
        assert!(!source.unsubscribe(id));
        assert_eq!(source.publish(VoteSettings { is_enabled: true }).delivered, 0);
    }

    #[test]
    fn test_register_rejects_clashing_section() {
        let source = SettingsSource::new();
        source.register::<TeleportSettings>().unwrap();
        source.register::<TeleportSettings>().unwrap();
        assert!(matches!(
            source.register::<ClashingSettings>(),
            Err(SettingsError::DuplicateSection(_))
        ));
    }

    #[test]
    fn test_reload_publishes_registered_sections() {
        let source = SettingsSource::new();
        source.register::<TeleportSettings>().unwrap();
        source.register::<VoteSettings>().unwrap();
        assert_eq!(source.sections(), vec!["teleport", "vote"]);

        let reports = source
            .reload_from_str(
                r#"
[host]
tick_interval_ms = 50

[teleport]
is_enabled = true
cooldown_seconds = 10
"#,
            )
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].section, "teleport");
        assert_eq!(source.get::<TeleportSettings>().unwrap().cooldown_seconds, 10);
        assert!(source.get::<VoteSettings>().is_none());
    }

    #[test]
    fn test_reload_with_bad_section_publishes_nothing() {
        let source = SettingsSource::new();
        source.register::<TeleportSettings>().unwrap();
        source.register::<VoteSettings>().unwrap();

        let result = source.reload_from_str(
            r#"
[teleport]
is_enabled = true

[vote]
is_enabled = "yes"
"#,
        );
        assert!(matches!(result, Err(SettingsError::Parse(_))));
        assert!(source.get::<TeleportSettings>().is_none());
        assert_eq!(source.revision(), 0);
    }

    #[test]
    fn test_reload_rejects_invalid_toml() {
        let source = SettingsSource::new();
        assert!(matches!(
            source.reload_from_str("[teleport"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[vote]\nis_enabled = true").unwrap();

        let source = SettingsSource::new();
        source.register::<VoteSettings>().unwrap();
        source.load_from_file(file.path()).unwrap();
        assert!(source.get::<VoteSettings>().unwrap().is_enabled);

        let missing = source.load_from_file("/definitely/not/here.toml");
        assert!(matches!(missing, Err(SettingsError::Io(_, _))));
    }

    #[test]
    fn test_parse_section() {
        let settings: VoteSettings =
            SettingsSource::parse_section("[vote]\nis_enabled = false\n").unwrap();
        assert!(!settings.is_enabled);
        assert!(matches!(
            SettingsSource::parse_section::<TeleportSettings>("[vote]\nis_enabled = false\n"),
            Err(SettingsError::UnknownSection(_))
        ));
    }
}
