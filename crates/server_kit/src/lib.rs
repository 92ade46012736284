//! # Server Kit
//!
//! Building blocks for adding independently toggleable functions to a live
//! game server.
//!
//! ## Core Features
//!
//! - **Function Lifecycle**: Each function starts and stops as its settings change,
//!   with per-function transition guards and stale-notification rejection
//! - **Hook Registry**: Ordered chat and player hooks with first-handler-wins dispatch
//! - **Command Dispatch**: Console commands marshalled onto the game's owning thread
//!   with a bounded wait
//! - **Typed Settings**: Immutable TOML-backed snapshots with change subscriptions
//! - **Command Builders**: Quoting and formatting for teleport and message commands
//!
//! ## Architecture Overview
//!
//! A [`FunctionRegistry`] owns one [`FunctionLifecycle`] per [`Function`].
//! Every lifecycle subscribes to the [`SettingsSource`]; when its section is
//! published the lifecycle registers or removes the function's chat hook in the
//! shared [`HookRegistry`]. Functions talk back to the server through the
//! [`CommandExecutor`], which runs commands either directly or on the thread
//! that owns the game state.
//!
//! ## Quick Start Example
//!
//! ```rust
//! use server_kit::*;
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Deserialize)]
//! struct MotdSettings {
//!     is_enabled: bool,
//!     text: String,
//! }
//!
//! impl Settings for MotdSettings {
//!     const SECTION: &'static str = "motd";
//!     fn is_enabled(&self) -> bool {
//!         self.is_enabled
//!     }
//! }
//!
//! struct Motd;
//!
//! impl Function for Motd {
//!     type Settings = MotdSettings;
//!
//!     fn on_chat_command(&self, ctx: &FunctionContext, settings: &MotdSettings, message: &ChatMessage) -> bool {
//!         if message.text != "/motd" {
//!             return false;
//!         }
//!         let _ = ctx.send_message_to_player(&message.player.player_id, &settings.text);
//!         true
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = |command: &str| -> Result<Vec<String>, CommandError> {
//!     Ok(vec![format!("ran {command}")])
//! };
//! let ctx = FunctionContext::new(
//!     Arc::new(HookRegistry::new()),
//!     Arc::new(CommandExecutor::new(Arc::new(runner), Arc::new(InlineDispatcher))),
//!     Arc::new(SettingsSource::new()),
//! );
//! let registry = FunctionRegistry::new(ctx.clone());
//! registry.register(Motd)?;
//!
//! ctx.settings().reload_from_str("[motd]\nis_enabled = true\ntext = \"Welcome\"\n")?;
//! registry.initialize_all();
//!
//! let outcome = ctx.hooks().dispatch_chat("/motd", PlayerBase::new("Steam_1", "Alice", 171));
//! assert!(outcome.handled());
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod error;
pub mod function;
pub mod hooks;
pub mod lifecycle;
pub mod registry;
pub mod settings;
pub mod template;
pub mod types;

pub use command::{
    CommandExecutor, ConsoleCommandRunner, InlineDispatcher, MainThreadHandle, MainThreadQueue,
    OwningThreadDispatcher, DEFAULT_COMMAND_TIMEOUT,
};
pub use error::{CommandError, FunctionError, SettingsError};
pub use function::{Function, FunctionContext};
pub use hooks::{DispatchOutcome, HookCallback, HookEvent, HookId, HookKind, HookRegistry};
pub use lifecycle::{FunctionLifecycle, FunctionStatus, ManagedFunction};
pub use registry::{FunctionRegistry, InitializationReport};
pub use settings::{PublishReport, Settings, SettingsSnapshot, SettingsSource};
pub use template::render_command;
pub use types::{
    days_remaining, ChatMessage, GlobalMessage, PlayerBase, Position, PrivateMessage, TeleportTarget,
};
