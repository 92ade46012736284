//! Stand-in game console.
//!
//! The host has no game attached, so commands are logged and answered with
//! the lines a dedicated server console would print for them.

use parking_lot::Mutex;
use server_kit::{CommandError, ConsoleCommandRunner};
use std::collections::VecDeque;
use tracing::info;

const HISTORY_LIMIT: usize = 256;

/// Console runner that logs each command and keeps a bounded history.
#[derive(Debug, Default)]
pub struct LoggingConsole {
    history: Mutex<VecDeque<String>>,
}

impl LoggingConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent commands, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().iter().cloned().collect()
    }
}

impl ConsoleCommandRunner for LoggingConsole {
    fn run_sync(&self, command: &str) -> Result<Vec<String>, CommandError> {
        let command = command.trim();
        let Some(name) = command.split_whitespace().next() else {
            return Err(CommandError::Execution("empty command".to_string()));
        };

        info!(target: "console", "🖥️ {}", command);
        {
            let mut history = self.history.lock();
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(command.to_string());
        }

        Ok(vec![format!("Executing command '{command}'"), format!("{name}: OK")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_history_and_answers() {
        let console = LoggingConsole::new();
        let output = console.run_sync("  ty-say hello ").unwrap();
        assert_eq!(output.len(), 2);
        assert!(output[0].contains("'ty-say hello'"));
        assert_eq!(output[1], "ty-say: OK");
        assert_eq!(console.history(), vec!["ty-say hello".to_string()]);
    }

    #[test]
    fn test_empty_command_fails() {
        let console = LoggingConsole::new();
        assert!(matches!(console.run_sync("   "), Err(CommandError::Execution(_))));
        assert!(console.history().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let console = LoggingConsole::new();
        for i in 0..HISTORY_LIMIT + 10 {
            console.run_sync(&format!("say {i}")).unwrap();
        }
        let history = console.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0], "say 10");
    }
}
