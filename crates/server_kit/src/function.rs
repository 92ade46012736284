//! # Functions
//!
//! A function is an independently toggleable unit of server behaviour. Each
//! concrete function implements [`Function`]; the framework wraps it in a
//! [`FunctionLifecycle`](crate::lifecycle::FunctionLifecycle) which decides
//! when it runs based on its settings.
//!
//! ## Example
//!
//! ```rust
//! use server_kit::{ChatMessage, Function, FunctionContext, Settings};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct PingSettings {
//!     is_enabled: bool,
//! }
//!
//! impl Settings for PingSettings {
//!     const SECTION: &'static str = "ping";
//!     fn is_enabled(&self) -> bool {
//!         self.is_enabled
//!     }
//! }
//!
//! struct Ping;
//!
//! impl Function for Ping {
//!     type Settings = PingSettings;
//!
//!     fn on_chat_command(
//!         &self,
//!         ctx: &FunctionContext,
//!         _settings: &PingSettings,
//!         message: &ChatMessage,
//!     ) -> bool {
//!         if message.text != "/ping" {
//!             return false;
//!         }
//!         let _ = ctx.send_message_to_player(&message.player.player_id, "pong");
//!         true
//!     }
//! }
//! ```

use crate::command::CommandExecutor;
use crate::error::{CommandError, FunctionError};
use crate::hooks::HookRegistry;
use crate::settings::{Settings, SettingsSource};
use crate::template::render_command;
use crate::types::{ChatMessage, GlobalMessage, PlayerBase, PrivateMessage};
use std::sync::Arc;

/// The capability set every function implements.
///
/// All callbacks have no-op defaults. `on_enable` and `on_disable` run while
/// the function's transition guard is held; they must not publish settings
/// that would transition the same function.
pub trait Function: Send + Sync + 'static {
    /// The function's configuration section.
    type Settings: Settings;

    /// Stable, process-unique name. Defaults to the implementing type's name.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    /// Called after the function's chat hook has been registered.
    fn on_enable(&self, _ctx: &FunctionContext) -> Result<(), FunctionError> {
        Ok(())
    }

    /// Called before the function's chat hook is removed.
    fn on_disable(&self, _ctx: &FunctionContext) -> Result<(), FunctionError> {
        Ok(())
    }

    /// Called after every applied settings change, and once at initialization.
    fn on_settings_changed(&self, _ctx: &FunctionContext, _settings: &Self::Settings) {}

    /// Called for each chat line while the function is running.
    ///
    /// Returns `true` when the line was handled; later hooks will not see it.
    fn on_chat_command(
        &self,
        _ctx: &FunctionContext,
        _settings: &Self::Settings,
        _message: &ChatMessage,
    ) -> bool {
        false
    }
}

/// Last path segment of a type name, without generic parameters.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Services shared by every function.
#[derive(Clone)]
pub struct FunctionContext {
    hooks: Arc<HookRegistry>,
    commands: Arc<CommandExecutor>,
    settings: Arc<SettingsSource>,
    server_name: Option<String>,
}

impl std::fmt::Debug for FunctionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionContext")
            .field("hooks", &self.hooks)
            .field("commands", &self.commands)
            .field("settings", &self.settings)
            .field("server_name", &self.server_name)
            .finish()
    }
}

impl FunctionContext {
    /// Builds a context from the three shared services.
    ///
    /// Every function of a process receives a clone of the same context, so
    /// they all see one hook registry, one executor and one settings source.
    pub fn new(
        hooks: Arc<HookRegistry>,
        commands: Arc<CommandExecutor>,
        settings: Arc<SettingsSource>,
    ) -> Self {
        Self {
            hooks,
            commands,
            settings,
            server_name: None,
        }
    }

    /// Sender name used for messages sent by functions.
    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    /// The process-wide hook registry.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    pub fn commands(&self) -> &Arc<CommandExecutor> {
        &self.commands
    }

    /// The settings source functions subscribe to.
    pub fn settings(&self) -> &Arc<SettingsSource> {
        &self.settings
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    /// Shorthand for [`CommandExecutor::execute`].
    pub fn execute(
        &self,
        command: &str,
        run_on_owning_thread: bool,
    ) -> Result<Vec<String>, CommandError> {
        self.commands.execute(command, run_on_owning_thread)
    }

    /// Renders a configured command line for `player`.
    pub fn format_command(&self, template: &str, player: &PlayerBase) -> String {
        render_command(template, player)
    }

    /// Sends `message` to every player, signed with the server name if one is set.
    ///
    /// # Returns
    ///
    /// The console output of the `ty-say` command, or
    /// [`CommandError::InvalidArgument`] when the message contains a quote.
    pub fn send_global_message(&self, message: &str) -> Result<Vec<String>, CommandError> {
        self.commands.send_global_message(&GlobalMessage {
            message: message.to_string(),
            sender_name: self.server_name.clone(),
        })
    }

    /// Sends `message` to one player, addressed by id or name.
    pub fn send_message_to_player(
        &self,
        player_id_or_name: &str,
        message: &str,
    ) -> Result<Vec<String>, CommandError> {
        self.commands.send_private_message(&PrivateMessage {
            target_player_id_or_name: player_id_or_name.to_string(),
            message: message.to_string(),
            sender_name: self.server_name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ConsoleCommandRunner, InlineDispatcher};
    use parking_lot::Mutex;

    struct Plain;
    struct Generic<T>(std::marker::PhantomData<T>);

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Plain>(), "Plain");
        assert_eq!(short_type_name::<Generic<Plain>>(), "Generic");
        assert_eq!(short_type_name::<u32>(), "u32");
    }

    #[test]
    fn test_context_messages_carry_server_name() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let l = Arc::clone(&log);
        let runner: Arc<dyn ConsoleCommandRunner> = Arc::new(
            move |command: &str| -> Result<Vec<String>, CommandError> {
                l.lock().push(command.to_string());
                Ok(Vec::new())
            },
        );
        let ctx = FunctionContext::new(
            Arc::new(HookRegistry::new()),
            Arc::new(CommandExecutor::new(runner, Arc::new(InlineDispatcher))),
            Arc::new(SettingsSource::new()),
        )
        .with_server_name("Wasteland");

        ctx.send_global_message("Blood moon tonight").unwrap();
        ctx.send_message_to_player("Steam_1", "hi").unwrap();
        assert_eq!(
            *log.lock(),
            vec![
                "ty-say \"Blood moon tonight\" Wasteland".to_string(),
                "ty-pm Steam_1 hi Wasteland".to_string(),
            ]
        );
    }
}
