//! Stdin chat simulator.
//!
//! Each input line is either a chat line in `player: text` form or a host
//! command starting with a dot:
//!
//! * `.leave <player>` disconnects a player
//! * `.status` logs the state of every function
//! * `.quit` shuts the host down

use anyhow::Result;
use server_kit::{ChatMessage, FunctionRegistry, HookEvent, PlayerBase};
use std::collections::HashMap;
use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One parsed line of simulator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    Say { player: String, text: String },
    Leave(String),
    Status,
    Quit,
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ChatInput>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(command) = line.strip_prefix('.') {
        let mut parts = command.split_whitespace();
        return match (parts.next(), parts.next()) {
            (Some("quit"), None) => Ok(Some(ChatInput::Quit)),
            (Some("status"), None) => Ok(Some(ChatInput::Status)),
            (Some("leave"), Some(player)) => Ok(Some(ChatInput::Leave(player.to_string()))),
            _ => Err(format!("Unknown host command: {line}")),
        };
    }

    match line.split_once(':') {
        Some((player, text)) if !player.trim().is_empty() && !text.trim().is_empty() => {
            Ok(Some(ChatInput::Say {
                player: player.trim().to_string(),
                text: text.trim().to_string(),
            }))
        }
        _ => Err(format!("Expected 'player: text', got: {line}")),
    }
}

/// Connected players, keyed by name.
#[derive(Debug)]
pub struct PlayerDirectory {
    players: HashMap<String, PlayerBase>,
    next_entity_id: i32,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
            next_entity_id: 171,
        }
    }

    /// Returns the player, connecting them first if needed. The flag tells
    /// whether the player just joined.
    pub fn join(&mut self, name: &str) -> (PlayerBase, bool) {
        if let Some(player) = self.players.get(name) {
            return (player.clone(), false);
        }
        let player = PlayerBase::new(format!("Local_{name}"), name, self.next_entity_id);
        self.next_entity_id += 1;
        self.players.insert(name.to_string(), player.clone());
        (player, true)
    }

    pub fn leave(&mut self, name: &str) -> Option<PlayerBase> {
        self.players.remove(name)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }
}

/// Feeds stdin into the hook registry until `.quit` or end of input.
///
/// Returns `true` when the user asked the host to quit.
pub async fn run(registry: Arc<FunctionRegistry>) -> Result<bool> {
    let mut lines = spawn_stdin_reader()?;
    let mut players = PlayerDirectory::new();
    info!("💬 Chat simulator ready. Type 'player: message', '.status' or '.quit'");

    while let Some(line) = lines.recv().await {
        let input = match parse_line(&line) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(e) => {
                warn!("{e}");
                continue;
            }
        };

        match input {
            ChatInput::Quit => return Ok(true),
            ChatInput::Status => {
                for status in registry.status() {
                    info!(
                        function = %status.name,
                        enabled = status.enabled,
                        running = status.running,
                        "📊 Function status"
                    );
                }
                info!(
                    players = players.len(),
                    hooks = ?registry.context().hooks().stats(),
                    "📊 Host status"
                );
            }
            ChatInput::Leave(name) => match players.leave(&name) {
                Some(player) => {
                    dispatch(&registry, HookEvent::PlayerDisconnected(player)).await;
                }
                None => warn!("No player named {name}"),
            },
            ChatInput::Say { player, text } => {
                let (player, joined) = players.join(&player);
                if joined {
                    dispatch(&registry, HookEvent::PlayerSpawned(player.clone())).await;
                }
                dispatch(&registry, HookEvent::ChatMessage(ChatMessage::new(text, player))).await;
            }
        }
    }

    debug!("Stdin closed; chat simulator stopped");
    Ok(false)
}

// A detached thread, so a pending read never holds up runtime shutdown.
fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        })?;
    Ok(rx)
}

// Hooks may block on the owning thread, so keep them off the async workers.
async fn dispatch(registry: &Arc<FunctionRegistry>, event: HookEvent) {
    let hooks = Arc::clone(registry.context().hooks());
    match tokio::task::spawn_blocking(move || hooks.dispatch(&event)).await {
        Ok(outcome) => match outcome.handled_by {
            Some(owner) => debug!(%owner, invoked = outcome.invoked, "Event handled"),
            None => debug!(invoked = outcome.invoked, "Event not handled"),
        },
        Err(e) => warn!(error = %e, "Hook dispatch task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_lines() {
        assert_eq!(
            parse_line("Alice: /hello").unwrap(),
            Some(ChatInput::Say {
                player: "Alice".to_string(),
                text: "/hello".to_string()
            })
        );
        assert_eq!(
            parse_line("  Bob :  time: 12:00 ").unwrap(),
            Some(ChatInput::Say {
                player: "Bob".to_string(),
                text: "time: 12:00".to_string()
            })
        );
        assert_eq!(parse_line("   ").unwrap(), None);
        assert!(parse_line("no separator").is_err());
        assert!(parse_line(": empty player").is_err());
        assert!(parse_line("Alice:").is_err());
    }

    #[test]
    fn test_parse_host_commands() {
        assert_eq!(parse_line(".quit").unwrap(), Some(ChatInput::Quit));
        assert_eq!(parse_line(".status").unwrap(), Some(ChatInput::Status));
        assert_eq!(
            parse_line(".leave Alice").unwrap(),
            Some(ChatInput::Leave("Alice".to_string()))
        );
        assert!(parse_line(".leave").is_err());
        assert!(parse_line(".dance").is_err());
    }

    #[test]
    fn test_player_directory() {
        let mut players = PlayerDirectory::new();
        let (alice, joined) = players.join("Alice");
        assert!(joined);
        assert_eq!(alice.player_id, "Local_Alice");
        assert_eq!(alice.entity_id, 171);

        let (again, joined) = players.join("Alice");
        assert!(!joined);
        assert_eq!(again, alice);

        let (bob, _) = players.join("Bob");
        assert_eq!(bob.entity_id, 172);
        assert_eq!(players.len(), 2);

        assert_eq!(players.leave("Alice"), Some(alice));
        assert!(players.leave("Alice").is_none());
    }
}
