//! Replies to a chat trigger with a configurable greeting.

use serde::{Deserialize, Serialize};
use server_kit::{ChatMessage, Function, FunctionContext, FunctionError, Settings};
use tracing::{info, warn};

fn default_trigger() -> String {
    "/hello".to_string()
}

fn default_reply() -> String {
    "Welcome {PlayerName}!".to_string()
}

/// Settings for the [`Greeter`] function, read from the `[greeter]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GreeterSettings {
    pub is_enabled: bool,
    /// Chat line that triggers the greeting, compared case-insensitively
    #[serde(default = "default_trigger")]
    pub trigger: String,
    /// Reply text; supports the `{PlayerId}`, `{PlayerName}` and `{EntityId}` placeholders
    #[serde(default = "default_reply")]
    pub reply_template: String,
    /// Send the reply to everyone instead of only the triggering player
    #[serde(default)]
    pub broadcast: bool,
}

impl Default for GreeterSettings {
    fn default() -> Self {
        Self {
            is_enabled: true,
            trigger: default_trigger(),
            reply_template: default_reply(),
            broadcast: false,
        }
    }
}

impl Settings for GreeterSettings {
    const SECTION: &'static str = "greeter";

    fn is_enabled(&self) -> bool {
        self.is_enabled
    }
}

/// Greets players who type the configured trigger.
#[derive(Debug, Default)]
pub struct Greeter;

impl Function for Greeter {
    type Settings = GreeterSettings;

    fn on_enable(&self, _ctx: &FunctionContext) -> Result<(), FunctionError> {
        info!("👋 Greeter listening for chat triggers");
        Ok(())
    }

    fn on_settings_changed(&self, _ctx: &FunctionContext, settings: &GreeterSettings) {
        info!(
            trigger = %settings.trigger,
            broadcast = settings.broadcast,
            "Greeter settings applied"
        );
    }

    fn on_chat_command(
        &self,
        ctx: &FunctionContext,
        settings: &GreeterSettings,
        message: &ChatMessage,
    ) -> bool {
        if !message.text.trim().eq_ignore_ascii_case(&settings.trigger) {
            return false;
        }

        let reply = ctx.format_command(&settings.reply_template, &message.player);
        let result = if settings.broadcast {
            ctx.send_global_message(&reply)
        } else {
            ctx.send_message_to_player(&message.player.player_id, &reply)
        };
        if let Err(e) = result {
            warn!(player = %message.player, error = %e, "Greeting could not be sent");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use server_kit::{
        CommandError, CommandExecutor, FunctionLifecycle, HookRegistry, InlineDispatcher,
        PlayerBase, SettingsSource,
    };
    use std::sync::Arc;

    fn context() -> (FunctionContext, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&log);
        let runner = move |command: &str| -> Result<Vec<String>, CommandError> {
            recorded.lock().push(command.to_string());
            Ok(Vec::new())
        };
        let ctx = FunctionContext::new(
            Arc::new(HookRegistry::new()),
            Arc::new(CommandExecutor::new(Arc::new(runner), Arc::new(InlineDispatcher))),
            Arc::new(SettingsSource::new()),
        );
        (ctx, log)
    }

    fn alice() -> PlayerBase {
        PlayerBase::new("Steam_1", "Alice", 171)
    }

    #[test]
    fn test_replies_privately_to_trigger() {
        let (ctx, log) = context();
        ctx.settings().publish(GreeterSettings::default());
        let greeter = FunctionLifecycle::new(Greeter, ctx.clone());
        greeter.initialize().unwrap();

        assert!(ctx.hooks().dispatch_chat("/HELLO ", alice()).handled());
        assert!(!ctx.hooks().dispatch_chat("hello there", alice()).handled());
        assert_eq!(*log.lock(), vec!["ty-pm Steam_1 \"Welcome Alice!\"".to_string()]);
    }

    #[test]
    fn test_broadcast_uses_server_name() {
        let (ctx, log) = context();
        let ctx = ctx.with_server_name("Wasteland");
        ctx.settings().publish(GreeterSettings {
            broadcast: true,
            reply_template: "{PlayerName} has arrived".to_string(),
            ..GreeterSettings::default()
        });
        let greeter = FunctionLifecycle::new(Greeter, ctx.clone());
        greeter.initialize().unwrap();

        ctx.hooks().dispatch_chat("/hello", alice());
        assert_eq!(
            *log.lock(),
            vec!["ty-say \"Alice has arrived\" Wasteland".to_string()]
        );
    }

    #[test]
    fn test_unsendable_reply_is_still_handled() {
        let (ctx, log) = context();
        ctx.settings().publish(GreeterSettings {
            reply_template: "say \"hi\"".to_string(),
            ..GreeterSettings::default()
        });
        let greeter = FunctionLifecycle::new(Greeter, ctx.clone());
        greeter.initialize().unwrap();

        assert!(ctx.hooks().dispatch_chat("/hello", alice()).handled());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_disabled_greeter_ignores_trigger() {
        let (ctx, log) = context();
        ctx.settings().publish(GreeterSettings {
            is_enabled: false,
            ..GreeterSettings::default()
        });
        let greeter = FunctionLifecycle::new(Greeter, ctx.clone());
        greeter.initialize().unwrap();

        assert!(!ctx.hooks().dispatch_chat("/hello", alice()).handled());
        assert!(log.lock().is_empty());
    }
}
