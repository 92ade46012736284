//! # Function Lifecycle
//!
//! State machine that keeps one function's hook registration consistent with
//! its configuration.
//!
//! A function is either `Stopped` (initial) or `Running`. Settings changes
//! decide whether it should be enabled; the enable transition registers the
//! function's chat hook and the disable transition removes it. Both
//! transitions run under a guard owned by this lifecycle, so transitions of
//! one function never interleave while different functions transition
//! independently.
//!
//! Settings snapshots carry revisions. A notification older than the one
//! already applied is dropped, which makes concurrent notifications converge
//! on the newest configuration regardless of delivery order. The function's
//! own [`Function::on_settings_changed`] callback is held to the same rule:
//! it never sees a snapshot older than one it was already given.
//!
//! Once [`FunctionLifecycle::shutdown`] has run, the lifecycle is inert. A
//! publish that was already in flight when the subscription was dropped can
//! still reach it, but it neither re-enables the function nor registers hooks.

use crate::error::FunctionError;
use crate::function::{Function, FunctionContext};
use crate::hooks::{HookCallback, HookEvent, HookId, HookKind};
use crate::settings::{Settings, SettingsSnapshot, SubscriptionId};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use tracing::{debug, error, info, warn};

/// Observable state of a function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionStatus {
    pub name: String,
    pub enabled: bool,
    pub running: bool,
}

#[derive(Debug, Default)]
struct LifecycleState {
    enabled: bool,
    running: bool,
    hook: Option<HookId>,
    applied_revision: u64,
    shut_down: bool,
}

/// Drives one [`Function`] through its enable/disable transitions.
pub struct FunctionLifecycle<F: Function> {
    function: Arc<F>,
    name: String,
    ctx: FunctionContext,
    state: Mutex<LifecycleState>,
    snapshot: RwLock<Option<SettingsSnapshot<F::Settings>>>,
    // Serializes `Function::on_settings_changed`; holds the last revision delivered.
    delivered_revision: Mutex<u64>,
    // Mirrors `state.running` for hook callbacks, which must not take the guard.
    active: AtomicBool,
    initialized: AtomicBool,
    subscription: OnceLock<SubscriptionId>,
    me: Weak<Self>,
}

impl<F: Function> std::fmt::Debug for FunctionLifecycle<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLifecycle")
            .field("name", &self.name)
            // Transitions run under the guard and may format the lifecycle.
            .field(
                "state",
                &self.state.try_lock().map(|state| format!("{:?}", *state)),
            )
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .finish()
    }
}

impl<F: Function> FunctionLifecycle<F> {
    /// Wraps `function` in a lifecycle bound to `ctx`.
    ///
    /// The function starts `Stopped` and does nothing until
    /// [`initialize`](Self::initialize) subscribes it to settings changes.
    ///
    /// # Returns
    ///
    /// The lifecycle behind an `Arc`; hook and settings callbacks hold weak
    /// references to it, so dropping the last `Arc` detaches them.
    pub fn new(function: F, ctx: FunctionContext) -> Arc<Self> {
        let name = function.name().to_string();
        Arc::new_cyclic(|me| Self {
            function: Arc::new(function),
            name,
            ctx,
            state: Mutex::new(LifecycleState::default()),
            snapshot: RwLock::new(None),
            delivered_revision: Mutex::new(0),
            active: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            subscription: OnceLock::new(),
            me: me.clone(),
        })
    }

    /// Name the function reports, also used as the owner of its hooks.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The wrapped function.
    pub fn function(&self) -> &Arc<F> {
        &self.function
    }

    /// Whether the applied settings ask for the function to run.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    /// Whether the enable transition completed and the chat hook is registered.
    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Name, `enabled` and `running`, read together under the guard.
    pub fn status(&self) -> FunctionStatus {
        let state = self.state.lock();
        FunctionStatus {
            name: self.name.clone(),
            enabled: state.enabled,
            running: state.running,
        }
    }

    /// The settings snapshot currently in effect.
    ///
    /// Fails with [`FunctionError::ConfigurationMissing`] when no snapshot has
    /// been applied yet; a function never runs on default settings.
    pub fn settings(&self) -> Result<SettingsSnapshot<F::Settings>, FunctionError> {
        self.snapshot
            .read()
            .clone()
            .ok_or_else(|| FunctionError::ConfigurationMissing(self.name.clone()))
    }

    /// Subscribes to settings changes and applies the current snapshot.
    ///
    /// Runs once; later calls are ignored. When no snapshot exists yet the
    /// function stays stopped and [`FunctionError::ConfigurationMissing`] is
    /// returned, but the subscription remains so a later reload can start it.
    pub fn initialize(&self) -> Result<(), FunctionError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            warn!(function = %self.name, "Function already initialized");
            return Ok(());
        }

        // Subscribe before reading so no publish can slip between the two.
        let weak = self.me.clone();
        let id = self
            .ctx
            .settings()
            .subscribe_to::<F::Settings, _>(move |snapshot| match weak.upgrade() {
                Some(lifecycle) => lifecycle.on_settings_changed(snapshot),
                None => Ok(()),
            });
        let _ = self.subscription.set(id);

        match self.ctx.settings().get::<F::Settings>() {
            Some(snapshot) => {
                self.on_settings_changed(snapshot)?;
                info!(function = %self.name, running = self.is_running(), "Function initialized");
                Ok(())
            }
            None => {
                error!(
                    function = %self.name,
                    section = F::Settings::SECTION,
                    "No settings loaded for function"
                );
                Err(FunctionError::ConfigurationMissing(self.name.clone()))
            }
        }
    }

    /// Applies a new settings snapshot.
    ///
    /// Replaces the held snapshot, recomputes `enabled` and performs the
    /// enable or disable transition when it changed. Stale snapshots are
    /// ignored, as is everything after [`shutdown`](Self::shutdown).
    ///
    /// # Returns
    ///
    /// The transition error when enabling or disabling failed. The snapshot
    /// is still recorded in that case; only the transition is rolled back.
    pub fn on_settings_changed(
        &self,
        snapshot: SettingsSnapshot<F::Settings>,
    ) -> Result<(), FunctionError> {
        let revision = snapshot.revision();
        {
            let mut state = self.state.lock();
            if state.shut_down {
                debug!(function = %self.name, revision, "Ignoring settings after shutdown");
                return Ok(());
            }
            if revision < state.applied_revision {
                debug!(
                    function = %self.name,
                    revision,
                    applied = state.applied_revision,
                    "Ignoring stale settings"
                );
                return Ok(());
            }
            state.applied_revision = revision;
            *self.snapshot.write() = Some(snapshot.clone());
            self.apply_enabled(&mut state, snapshot.is_enabled())?;
        }

        // A newer notification may have overtaken this one since the guard was released.
        let mut delivered = self.delivered_revision.lock();
        if revision <= *delivered {
            debug!(
                function = %self.name,
                revision,
                delivered = *delivered,
                "Settings callback skipped"
            );
            return Ok(());
        }
        *delivered = revision;
        self.function.on_settings_changed(&self.ctx, &snapshot);
        Ok(())
    }

    /// Stops the function for good and drops its settings subscription.
    ///
    /// Later notifications, including one already being delivered, are
    /// ignored. Any hook still registered under the function's name is
    /// removed once the disable transition succeeds.
    ///
    /// # Returns
    ///
    /// The disable transition error, in which case the function keeps
    /// running with its hook.
    pub fn shutdown(&self) -> Result<(), FunctionError> {
        let mut state = self.state.lock();
        state.shut_down = true;
        if let Some(id) = self.subscription.get() {
            self.ctx.settings().unsubscribe(*id);
        }
        self.disable_locked(&mut state)?;
        state.enabled = false;

        let leftover = self.ctx.hooks().remove_owner(&self.name);
        if leftover > 0 {
            warn!(function = %self.name, leftover, "Removed hooks left behind at shutdown");
        }
        Ok(())
    }

    fn apply_enabled(
        &self,
        state: &mut LifecycleState,
        enabled: bool,
    ) -> Result<(), FunctionError> {
        let previous = state.enabled;
        if previous == enabled {
            return Ok(());
        }
        state.enabled = enabled;

        let result = if enabled {
            self.enable_locked(state)
        } else {
            self.disable_locked(state)
        };
        if result.is_err() {
            // No partial transition is recorded.
            state.enabled = previous;
        }
        result
    }

    fn enable_locked(&self, state: &mut LifecycleState) -> Result<(), FunctionError> {
        if state.running || !state.enabled || state.shut_down {
            debug!(function = %self.name, running = state.running, "Enable skipped");
            return Ok(());
        }

        let hooks = self.ctx.hooks();
        let hook = hooks.add_callback(HookKind::ChatMessage, &self.name, self.chat_hook());
        self.active.store(true, Ordering::SeqCst);

        if let Err(e) = self.function.on_enable(&self.ctx) {
            self.active.store(false, Ordering::SeqCst);
            hooks.remove(HookKind::ChatMessage, hook);
            error!(function = %self.name, error = %e, "Function failed to enable");
            return Err(FunctionError::TransitionFailure {
                function: self.name.clone(),
                action: "enable",
                reason: e.to_string(),
            });
        }

        state.hook = Some(hook);
        state.running = true;
        info!(function = %self.name, "Function enabled");
        Ok(())
    }

    fn disable_locked(&self, state: &mut LifecycleState) -> Result<(), FunctionError> {
        if !state.running {
            debug!(function = %self.name, "Disable skipped");
            return Ok(());
        }

        if let Err(e) = self.function.on_disable(&self.ctx) {
            error!(function = %self.name, error = %e, "Function failed to disable");
            return Err(FunctionError::TransitionFailure {
                function: self.name.clone(),
                action: "disable",
                reason: e.to_string(),
            });
        }

        self.active.store(false, Ordering::SeqCst);
        if let Some(hook) = state.hook.take() {
            if !self.ctx.hooks().remove(HookKind::ChatMessage, hook) {
                warn!(function = %self.name, %hook, "Chat hook was already removed");
            }
        }
        state.running = false;
        info!(function = %self.name, "Function disabled");
        Ok(())
    }

    fn chat_hook(&self) -> HookCallback {
        let weak = self.me.clone();
        Arc::new(move |event: &HookEvent| {
            let HookEvent::ChatMessage(message) = event else {
                return false;
            };
            let Some(lifecycle) = weak.upgrade() else {
                return false;
            };
            // A dispatch that copied the hook list before removal may still reach us.
            if !lifecycle.active.load(Ordering::SeqCst) {
                return false;
            }
            match lifecycle.settings() {
                Ok(settings) => lifecycle
                    .function
                    .on_chat_command(&lifecycle.ctx, &settings, message),
                Err(e) => {
                    error!(
                        function = %lifecycle.name,
                        error = %e,
                        "Chat hook invoked without settings"
                    );
                    false
                }
            }
        })
    }
}

/// Type-erased view of a lifecycle, used by the registry.
///
/// Lets functions with different settings types live in one list.
pub trait ManagedFunction: Send + Sync {
    fn name(&self) -> &str;
    /// Table name of the function's settings section.
    fn settings_section(&self) -> &'static str;
    fn is_enabled(&self) -> bool;
    fn is_running(&self) -> bool;
    fn initialize(&self) -> Result<(), FunctionError>;
    fn shutdown(&self) -> Result<(), FunctionError>;
    fn status(&self) -> FunctionStatus;
}

impl<F: Function> ManagedFunction for FunctionLifecycle<F> {
    fn name(&self) -> &str {
        FunctionLifecycle::name(self)
    }

    fn settings_section(&self) -> &'static str {
        F::Settings::SECTION
    }

    fn is_enabled(&self) -> bool {
        FunctionLifecycle::is_enabled(self)
    }

    fn is_running(&self) -> bool {
        FunctionLifecycle::is_running(self)
    }

    fn initialize(&self) -> Result<(), FunctionError> {
        FunctionLifecycle::initialize(self)
    }

    fn shutdown(&self) -> Result<(), FunctionError> {
        FunctionLifecycle::shutdown(self)
    }

    fn status(&self) -> FunctionStatus {
        FunctionLifecycle::status(self)
    }
}
