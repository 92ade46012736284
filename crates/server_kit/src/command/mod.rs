/// Console command execution - runs commands inline or on the owning thread
mod argument;
pub mod builders;
mod dispatcher;

pub use argument::{format_argument, format_optional_argument};
pub use dispatcher::{InlineDispatcher, MainThreadHandle, MainThreadQueue, OwningThreadDispatcher, Work};

use crate::error::CommandError;
use crate::types::{GlobalMessage, PrivateMessage, TeleportTarget};
use crossbeam::channel::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default upper bound on an owning-thread hand-off.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// The console primitive that actually executes a command line.
///
/// Implementations return the output lines in emission order.
pub trait ConsoleCommandRunner: Send + Sync {
    fn run_sync(&self, command: &str) -> Result<Vec<String>, CommandError>;
}

impl<F> ConsoleCommandRunner for F
where
    F: Fn(&str) -> Result<Vec<String>, CommandError> + Send + Sync,
{
    fn run_sync(&self, command: &str) -> Result<Vec<String>, CommandError> {
        self(command)
    }
}

/// Executes console commands, marshalling onto the owning thread on request.
///
/// This is the single place that knows about thread affinity: callers only
/// say whether a command must run on the owning thread.
pub struct CommandExecutor {
    runner: Arc<dyn ConsoleCommandRunner>,
    dispatcher: Arc<dyn OwningThreadDispatcher>,
    timeout: Duration,
}

impl std::fmt::Debug for CommandExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandExecutor")
            .field("runner", &"[runner]")
            .field("dispatcher", &"[dispatcher]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CommandExecutor {
    /// Creates an executor that runs commands through `runner`.
    ///
    /// Commands asking for the owning thread are handed to `dispatcher`; the
    /// wait for them defaults to 10 seconds.
    pub fn new(
        runner: Arc<dyn ConsoleCommandRunner>,
        dispatcher: Arc<dyn OwningThreadDispatcher>,
    ) -> Self {
        Self {
            runner,
            dispatcher,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Sets how long an owning-thread hand-off may block the caller.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How long an owning-thread hand-off may block the caller.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes `command` and returns its output lines.
    ///
    /// With `run_on_owning_thread` the calling thread blocks until the owning
    /// thread has run the command, or until the configured timeout elapses.
    /// When the caller already is the owning thread the command runs inline.
    pub fn execute(
        &self,
        command: &str,
        run_on_owning_thread: bool,
    ) -> Result<Vec<String>, CommandError> {
        if !run_on_owning_thread || self.dispatcher.is_owning_thread() {
            debug!(command, "Executing console command");
            return self.runner.run_sync(command);
        }

        debug!(command, "Submitting console command to owning thread");
        let (result_tx, result_rx) = channel::bounded(1);
        let runner = Arc::clone(&self.runner);
        let owned_command = command.to_string();

        self.dispatcher.post(Box::new(move || {
            let output = runner.run_sync(&owned_command);
            if result_tx.send(output).is_err() {
                debug!(command = %owned_command, "Caller stopped waiting for command output");
            }
        }))?;

        match result_rx.recv_timeout(self.timeout) {
            Ok(output) => output,
            Err(RecvTimeoutError::Timeout) => {
                warn!(command, timeout = ?self.timeout, "Owning thread did not run command in time");
                Err(CommandError::OwningThreadUnavailable(format!(
                    "timed out after {:?} waiting for the owning thread",
                    self.timeout
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(CommandError::OwningThreadUnavailable(
                "command was dropped before it ran".to_string(),
            )),
        }
    }

    /// Teleports a player to another player or to a position.
    pub fn teleport_player(
        &self,
        origin_player_id_or_name: &str,
        target: &TeleportTarget,
    ) -> Result<Vec<String>, CommandError> {
        let command = builders::teleport_player(origin_player_id_or_name, target)?;
        self.execute(&command, false)
    }

    /// Broadcasts a message to every connected client.
    pub fn send_global_message(&self, message: &GlobalMessage) -> Result<Vec<String>, CommandError> {
        let command = builders::global_message(message)?;
        self.execute(&command, false)
    }

    /// Sends a message to a single player.
    pub fn send_private_message(&self, message: &PrivateMessage) -> Result<Vec<String>, CommandError> {
        let command = builders::private_message(message)?;
        self.execute(&command, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    fn runner<F>(f: F) -> Arc<dyn ConsoleCommandRunner>
    where
        F: Fn(&str) -> Result<Vec<String>, CommandError> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    fn echo_runner(log: Arc<Mutex<Vec<String>>>) -> Arc<dyn ConsoleCommandRunner> {
        runner(move |command| {
            log.lock().push(command.to_string());
            Ok(vec![format!("ran: {command}"), "done".to_string()])
        })
    }

    #[test]
    fn test_execute_inline() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = CommandExecutor::new(echo_runner(log.clone()), Arc::new(InlineDispatcher));

        let output = executor.execute("version", false).unwrap();
        assert_eq!(output, vec!["ran: version".to_string(), "done".to_string()]);
        assert_eq!(*log.lock(), vec!["version".to_string()]);
    }

    #[test]
    fn test_owning_thread_output_matches_direct_execution() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = CommandExecutor::new(echo_runner(log), Arc::new(InlineDispatcher));

        let direct = executor.execute("listplayers", false).unwrap();
        let marshalled = executor.execute("listplayers", true).unwrap();
        assert_eq!(direct, marshalled);
    }

    #[test]
    fn test_execute_on_owning_thread_via_queue() {
        let queue = Arc::new(MainThreadQueue::new());
        let (ready_tx, ready_rx) = channel::bounded(0);
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let owner_queue = Arc::clone(&queue);
        let owner = thread::spawn(move || {
            owner_queue.bind().unwrap();
            ready_tx.send(thread::current().id()).unwrap();
            while stop_rx.try_recv().is_err() {
                owner_queue.pump_timeout(Duration::from_millis(5));
            }
        });
        let owner_id = ready_rx.recv().unwrap();

        let ran_on = Arc::new(Mutex::new(None));
        let ran_on_clone = Arc::clone(&ran_on);
        let uppercase = runner(move |command| {
            *ran_on_clone.lock() = Some(thread::current().id());
            Ok(vec![command.to_uppercase()])
        });
        let executor = CommandExecutor::new(uppercase, Arc::new(queue.handle()));

        let output = executor.execute("gettime", true).unwrap();
        assert_eq!(output, vec!["GETTIME".to_string()]);
        assert_eq!(*ran_on.lock(), Some(owner_id));

        stop_tx.send(()).unwrap();
        owner.join().unwrap();
    }

    #[test]
    fn test_owning_thread_runs_inline_when_called_from_owner() {
        let queue = MainThreadQueue::new();
        queue.bind().unwrap();
        let executor = CommandExecutor::new(
            runner(|command| Ok(vec![command.to_string()])),
            Arc::new(queue.handle()),
        );

        // Would deadlock if it went through the queue.
        let output = executor.execute("saveworld", true).unwrap();
        assert_eq!(output, vec!["saveworld".to_string()]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_stalled_owning_thread_times_out() {
        let queue = Arc::new(MainThreadQueue::new());
        let owner_queue = Arc::clone(&queue);
        // Bound but never pumped.
        thread::spawn(move || owner_queue.bind().unwrap()).join().unwrap();

        let executor = CommandExecutor::new(
            runner(|_| Ok(Vec::new())),
            Arc::new(queue.handle()),
        )
        .with_timeout(Duration::from_millis(50));

        let result = executor.execute("shutdown", true);
        assert!(matches!(result, Err(CommandError::OwningThreadUnavailable(_))));
    }

    #[test]
    fn test_closed_queue_fails_fast() {
        let queue = Arc::new(MainThreadQueue::new());
        let owner_queue = Arc::clone(&queue);
        thread::spawn(move || owner_queue.bind().unwrap()).join().unwrap();
        queue.close();

        let executor = CommandExecutor::new(
            runner(|_| Ok(Vec::new())),
            Arc::new(queue.handle()),
        );
        let result = executor.execute("shutdown", true);
        assert!(matches!(result, Err(CommandError::OwningThreadUnavailable(_))));
    }

    #[test]
    fn test_invalid_argument_is_never_submitted() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let executor = CommandExecutor::new(echo_runner(log.clone()), Arc::new(InlineDispatcher));

        let result = executor.send_global_message(&GlobalMessage {
            message: "bad \"quote\"".into(),
            sender_name: None,
        });
        assert!(matches!(result, Err(CommandError::InvalidArgument { .. })));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_runner_errors_propagate() {
        let executor = CommandExecutor::new(
            runner(|_| Err(CommandError::Execution("unknown command".into()))),
            Arc::new(InlineDispatcher),
        );
        assert_eq!(
            executor.execute("nope", true),
            Err(CommandError::Execution("unknown command".into()))
        );
    }
}
