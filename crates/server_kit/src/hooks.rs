//! # Hook Registry
//!
//! Process-wide mapping from hook kind to the callbacks registered for it.
//! Functions add their callbacks when they start running and remove them when
//! they stop.
//!
//! ## Dispatch
//!
//! Callbacks run in registration order. Dispatch stops at the first callback
//! that reports the event as handled. The callback list is copied before the
//! first callback runs, so a callback may add or remove hooks (including
//! itself) without affecting the dispatch in progress.

use crate::types::{ChatMessage, PlayerBase};
use dashmap::DashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace};
use uuid::Uuid;

/// The kinds of events functions can hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    ChatMessage,
    PlayerSpawned,
    PlayerDisconnected,
    GameShutdown,
}

/// An event delivered to hooks.
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    ChatMessage(ChatMessage),
    PlayerSpawned(PlayerBase),
    PlayerDisconnected(PlayerBase),
    GameShutdown,
}

impl HookEvent {
    /// The hook kind whose callbacks receive this event.
    pub fn kind(&self) -> HookKind {
        match self {
            HookEvent::ChatMessage(_) => HookKind::ChatMessage,
            HookEvent::PlayerSpawned(_) => HookKind::PlayerSpawned,
            HookEvent::PlayerDisconnected(_) => HookKind::PlayerDisconnected,
            HookEvent::GameShutdown => HookKind::GameShutdown,
        }
    }
}

/// Identity of one registration. Removal is keyed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(Uuid);

impl HookId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for HookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A hook callback. Returns `true` when it handled the event.
///
/// Callbacks must return quickly and must not change the enabled state of
/// the function that registered them.
pub type HookCallback = Arc<dyn Fn(&HookEvent) -> bool + Send + Sync>;

#[derive(Clone)]
struct HookEntry {
    id: HookId,
    owner: Arc<str>,
    callback: HookCallback,
}

/// Result of dispatching one event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// Owner of the callback that handled the event, if any
    pub handled_by: Option<String>,
    /// Number of callbacks that were invoked
    pub invoked: usize,
}

impl DispatchOutcome {
    /// Whether some callback claimed the event.
    pub fn handled(&self) -> bool {
        self.handled_by.is_some()
    }
}

/// Registry statistics for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookRegistryStats {
    pub total_hooks: usize,
    pub events_dispatched: u64,
    pub events_handled: u64,
}

/// Thread-safe, ordered hook registry.
#[derive(Default)]
pub struct HookRegistry {
    hooks: DashMap<HookKind, Vec<HookEntry>>,
    events_dispatched: AtomicU64,
    events_handled: AtomicU64,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("hooks", &"[hooks]")
            .field("stats", &self.stats())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for `kind` on behalf of `owner`.
    ///
    /// Each call creates a new registration with a fresh [`HookId`].
    pub fn add<F>(&self, kind: HookKind, owner: &str, callback: F) -> HookId
    where
        F: Fn(&HookEvent) -> bool + Send + Sync + 'static,
    {
        self.add_callback(kind, owner, Arc::new(callback))
    }

    /// Registers an already shared callback.
    pub fn add_callback(&self, kind: HookKind, owner: &str, callback: HookCallback) -> HookId {
        let id = HookId::new();
        self.hooks.entry(kind).or_default().push(HookEntry {
            id,
            owner: Arc::from(owner),
            callback,
        });
        debug!(?kind, owner, %id, "Hook registered");
        id
    }

    /// Removes one registration. Returns `false` when it was not registered.
    pub fn remove(&self, kind: HookKind, id: HookId) -> bool {
        let Some(mut entries) = self.hooks.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if removed {
            debug!(?kind, %id, "Hook removed");
        }
        removed
    }

    /// Removes every registration made by `owner`. Returns how many were removed.
    pub fn remove_owner(&self, owner: &str) -> usize {
        let mut removed = 0;
        for mut entries in self.hooks.iter_mut() {
            let before = entries.len();
            entries.retain(|entry| &*entry.owner != owner);
            removed += before - entries.len();
        }
        if removed > 0 {
            debug!(owner, removed, "Removed hooks for owner");
        }
        removed
    }

    /// Number of callbacks registered for `kind`.
    ///
    /// A running function contributes exactly one chat callback, so for
    /// [`HookKind::ChatMessage`] this equals the number of running functions.
    pub fn count(&self, kind: HookKind) -> usize {
        self.hooks.get(&kind).map_or(0, |entries| entries.len())
    }

    /// Dispatches `event` to the callbacks registered for its kind.
    ///
    /// A callback that panics is logged and counted as not handling the
    /// event; dispatch moves on to the next one.
    ///
    /// # Returns
    ///
    /// Who handled the event, if anyone, and how many callbacks ran.
    ///
    /// # Example
    ///
    /// ```rust
    /// use server_kit::{HookKind, HookRegistry, PlayerBase};
    ///
    /// let hooks = HookRegistry::new();
    /// hooks.add(HookKind::ChatMessage, "spectator", |_| false);
    /// hooks.add(HookKind::ChatMessage, "greeter", |_| true);
    ///
    /// let outcome = hooks.dispatch_chat("/hello", PlayerBase::new("Steam_1", "Alice", 171));
    /// assert_eq!(outcome.handled_by.as_deref(), Some("greeter"));
    /// assert_eq!(outcome.invoked, 2);
    /// ```
    pub fn dispatch(&self, event: &HookEvent) -> DispatchOutcome {
        let kind = event.kind();
        // Copy out so callbacks run without holding the shard lock.
        let snapshot: Vec<HookEntry> = match self.hooks.get(&kind) {
            Some(entries) => entries.clone(),
            None => Vec::new(),
        };
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);

        let mut outcome = DispatchOutcome::default();
        for entry in snapshot {
            outcome.invoked += 1;
            let callback = Arc::clone(&entry.callback);
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(true) => {
                    trace!(?kind, owner = %entry.owner, "Hook handled event");
                    self.events_handled.fetch_add(1, Ordering::Relaxed);
                    outcome.handled_by = Some(entry.owner.to_string());
                    break;
                }
                Ok(false) => {}
                Err(_) => {
                    error!(?kind, owner = %entry.owner, id = %entry.id, "Hook callback panicked");
                }
            }
        }
        outcome
    }

    /// Dispatches a chat line typed by `player`.
    pub fn dispatch_chat(&self, text: impl Into<String>, player: PlayerBase) -> DispatchOutcome {
        self.dispatch(&HookEvent::ChatMessage(ChatMessage::new(text, player)))
    }

    /// Current registration count and dispatch counters.
    pub fn stats(&self) -> HookRegistryStats {
        HookRegistryStats {
            total_hooks: self.hooks.iter().map(|entries| entries.len()).sum(),
            events_dispatched: self.events_dispatched.load(Ordering::Relaxed),
            events_handled: self.events_handled.load(Ordering::Relaxed),
        }
    }
}
