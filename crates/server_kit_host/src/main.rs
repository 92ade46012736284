//! Main application entry point for the server kit host
//!
//! Loads configuration, starts the owning thread, registers the bundled
//! functions and runs until a shutdown signal or `.quit` arrives. SIGHUP
//! reloads the configuration file and republishes every function section.

mod chat;
mod cli;
mod config;
mod console;
mod functions;
mod logging;
mod owning_thread;
mod signals;

use anyhow::{Context, Result};
use server_kit::{
    CommandExecutor, FunctionContext, FunctionRegistry, HookEvent, HookRegistry, SettingsSource,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use cli::CliArgs;
use config::AppConfig;
use console::LoggingConsole;
use owning_thread::OwningThread;
use signals::{HostSignal, SignalListener};

/// Main application struct
pub struct Application {
    config_path: PathBuf,
    config: AppConfig,
    registry: Arc<FunctionRegistry>,
    console: Arc<LoggingConsole>,
    owning_thread: OwningThread,
}

impl Application {
    pub async fn new(args: CliArgs) -> Result<Self> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config.validate().context("Configuration validation failed")?;
        logging::setup_logging(&config.logging)?;

        let owning_thread = OwningThread::spawn(config.tick_interval())?;
        let console = Arc::new(LoggingConsole::new());
        let commands = CommandExecutor::new(console.clone(), Arc::new(owning_thread.dispatcher()))
            .with_timeout(config.command_timeout());

        let mut ctx = FunctionContext::new(
            Arc::new(HookRegistry::new()),
            Arc::new(commands),
            Arc::new(SettingsSource::new()),
        );
        if let Some(server_name) = &config.host.server_name {
            ctx = ctx.with_server_name(server_name.clone());
        }

        let registry = Arc::new(FunctionRegistry::new(ctx));
        functions::register_all(&registry)?;

        info!(
            "📂 Config: {} | Functions: {}",
            args.config_path.display(),
            registry.names().join(", ")
        );

        Ok(Self {
            config_path: args.config_path,
            config,
            registry,
            console,
            owning_thread,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        self.publish_settings()?;
        let report = self.registry.initialize_all();
        for (name, e) in &report.failed {
            warn!(function = %name, error = %e, "Function not started");
        }

        let mut signals = SignalListener::new()?;
        let mut chat = tokio::spawn(chat::run(Arc::clone(&self.registry)));
        let mut chat_open = true;

        info!("✅ Server kit host is running");
        info!(
            "🛑 Press Ctrl+C to shut down, send SIGHUP to reload {}",
            self.config_path.display()
        );

        loop {
            tokio::select! {
                signal = signals.recv() => match signal? {
                    HostSignal::Shutdown => break,
                    HostSignal::Reload => {
                        if let Err(e) = self.reload().await {
                            error!("❌ Reload failed, keeping previous settings: {e:#}");
                        }
                    }
                },
                result = &mut chat, if chat_open => {
                    chat_open = false;
                    match result {
                        Ok(Ok(true)) => break,
                        Ok(Ok(false)) => {}
                        Ok(Err(e)) => warn!("Chat simulator stopped: {e:#}"),
                        Err(e) => warn!("Chat simulator task failed: {e}"),
                    }
                }
            }
        }

        info!("🛑 Shutting down");
        if chat_open {
            chat.abort();
        }
        self.shutdown().await;
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        let config = AppConfig::load_from_file(&self.config_path).await?;
        config.validate()?;
        self.config.functions = config.functions;
        self.publish_settings()?;
        if config.host.tick_interval_ms != self.config.host.tick_interval_ms
            || config.host.command_timeout_ms != self.config.host.command_timeout_ms
        {
            warn!("[host] changes take effect after a restart");
        }
        Ok(())
    }

    fn publish_settings(&self) -> Result<()> {
        let document = self.config.functions_document()?;
        let reports = self.registry.context().settings().reload_from_str(&document)?;
        for report in reports.iter().filter(|report| !report.is_clean()) {
            for e in &report.failures {
                warn!(section = report.section, error = %e, "Settings change not applied");
            }
        }
        Ok(())
    }

    async fn shutdown(mut self) {
        let registry = Arc::clone(&self.registry);
        let result = tokio::task::spawn_blocking(move || {
            registry.context().hooks().dispatch(&HookEvent::GameShutdown);
            registry.shutdown_all()
        })
        .await;
        match result {
            Ok(failures) => {
                for (name, e) in failures {
                    warn!(function = %name, error = %e, "Function did not stop cleanly");
                }
            }
            Err(e) => error!("❌ Shutdown task failed: {e}"),
        }
        self.owning_thread.stop();
        info!(
            commands = self.console.history().len(),
            "✅ Server kit host shutdown complete"
        );
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {e:#}");
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}
