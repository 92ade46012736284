//! Error types for the server kit.
//!
//! Errors are split by the component that raises them. Function errors stay
//! local to one function: a failure while one function transitions never
//! prevents another function from transitioning.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while executing or preparing console commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// An argument cannot be represented as a single command-line token.
    #[error("Invalid command argument {argument:?}: {reason}")]
    InvalidArgument {
        /// The offending argument as supplied by the caller
        argument: String,
        /// Human readable reason
        reason: &'static str,
    },
    /// The owning thread could not run the submitted command.
    #[error("Owning thread unavailable: {0}")]
    OwningThreadUnavailable(String),
    /// The underlying console reported a failure.
    #[error("Command execution failed: {0}")]
    Execution(String),
}

impl CommandError {
    pub(crate) fn embedded_quote(argument: &str) -> Self {
        Self::InvalidArgument {
            argument: argument.to_string(),
            reason: "arguments must not contain double quotes",
        }
    }
}

/// Errors raised by the settings source.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read.
    #[error("Failed to read settings file {0}: {1}")]
    Io(PathBuf, std::io::Error),
    /// The settings document is not valid TOML or a section does not match its type.
    #[error("Failed to parse settings: {0}")]
    Parse(String),
    /// No settings type is registered for the requested section.
    #[error("Unknown settings section: {0}")]
    UnknownSection(String),
    /// Two different settings types claim the same section name.
    #[error("Settings section '{0}' is already registered by another type")]
    DuplicateSection(String),
}

/// Errors raised by the function lifecycle and registry.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// The settings snapshot a function depends on is not available.
    #[error("Settings for function '{0}' are not loaded")]
    ConfigurationMissing(String),
    /// An enable or disable callback failed; the function kept its previous state.
    #[error("Function '{function}' failed to {action}: {reason}")]
    TransitionFailure {
        /// Function name
        function: String,
        /// `"enable"` or `"disable"`
        action: &'static str,
        /// Reason reported by the callback
        reason: String,
    },
    /// A function with the same name is already registered.
    #[error("Function '{0}' is already registered")]
    DuplicateFunction(String),
    /// No function with the given name is registered.
    #[error("Function '{0}' not found")]
    NotFound(String),
    /// A command issued by the function failed.
    #[error(transparent)]
    Command(#[from] CommandError),
    /// The function's settings type could not be registered or parsed.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// Any other failure reported by function code.
    #[error("Function '{function}' failed: {reason}")]
    Other {
        /// Function name
        function: String,
        /// Reason reported by the function
        reason: String,
    },
}

impl FunctionError {
    /// Convenience constructor for errors raised from inside function callbacks.
    pub fn other(function: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Other {
            function: function.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CommandError::embedded_quote("a\"b");
        assert_eq!(
            err.to_string(),
            "Invalid command argument \"a\\\"b\": arguments must not contain double quotes"
        );

        let err = FunctionError::TransitionFailure {
            function: "Greeter".to_string(),
            action: "enable",
            reason: "hook rejected".to_string(),
        };
        assert_eq!(err.to_string(), "Function 'Greeter' failed to enable: hook rejected");
    }

    #[test]
    fn test_command_error_converts_into_function_error() {
        let err: FunctionError = CommandError::OwningThreadUnavailable("closed".into()).into();
        assert!(matches!(err, FunctionError::Command(CommandError::OwningThreadUnavailable(_))));
        assert_eq!(err.to_string(), "Owning thread unavailable: closed");
    }
}
