//! Signal handling for shutdown and configuration reload.

use anyhow::Result;
use tracing::info;

/// What the host should do in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    /// SIGINT or SIGTERM (Ctrl+C on Windows)
    Shutdown,
    /// SIGHUP
    Reload,
}

/// Listens for process signals.
///
/// Handlers are installed once in [`SignalListener::new`] so no signal is
/// lost between calls to [`recv`](SignalListener::recv).
pub struct SignalListener {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sighup: tokio::signal::unix::Signal,
}

impl SignalListener {
    /// Installs the signal handlers.
    ///
    /// # Platform Support
    ///
    /// * **Unix platforms**: SIGINT and SIGTERM request shutdown, SIGHUP a reload
    /// * **Other platforms**: Ctrl+C requests shutdown; there is no reload signal
    ///
    /// # Returns
    ///
    /// The listener, or an error if a handler could not be installed.
    #[cfg(unix)]
    pub fn new() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
            sighup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    pub fn new() -> Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next signal.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let mut signals = SignalListener::new()?;
    /// loop {
    ///     match signals.recv().await? {
    ///         HostSignal::Shutdown => break,
    ///         HostSignal::Reload => reload_config().await?,
    ///     }
    /// }
    /// ```
    #[cfg(unix)]
    pub async fn recv(&mut self) -> Result<HostSignal> {
        tokio::select! {
            _ = self.sigint.recv() => {
                info!("📡 Received SIGINT");
                Ok(HostSignal::Shutdown)
            }
            _ = self.sigterm.recv() => {
                info!("📡 Received SIGTERM");
                Ok(HostSignal::Shutdown)
            }
            _ = self.sighup.recv() => {
                info!("📡 Received SIGHUP");
                Ok(HostSignal::Reload)
            }
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> Result<HostSignal> {
        tokio::signal::ctrl_c().await?;
        info!("📡 Received Ctrl+C");
        Ok(HostSignal::Shutdown)
    }
}
