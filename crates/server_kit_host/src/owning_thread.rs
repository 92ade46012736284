//! The thread that owns world state.
//!
//! Binds a [`MainThreadQueue`] and drains it once per tick until stopped.

use anyhow::{anyhow, Context, Result};
use crossbeam::channel;
use server_kit::{MainThreadHandle, MainThreadQueue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handle to the running owning thread.
///
/// Dropping it stops the thread; work still queued then fails with
/// `OwningThreadUnavailable`.
pub struct OwningThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    dispatcher: MainThreadHandle,
}

impl OwningThread {
    /// Starts the thread and waits until its queue is bound.
    pub fn spawn(tick_interval: Duration) -> Result<Self> {
        let queue = MainThreadQueue::new();
        let dispatcher = queue.handle();
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = channel::bounded(1);

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("owning-thread".to_string())
            .spawn(move || {
                let bound = queue.bind();
                let ok = bound.is_ok();
                let _ = ready_tx.send(bound);
                if !ok {
                    return;
                }

                let mut ticks: u64 = 0;
                while thread_running.load(Ordering::SeqCst) {
                    let executed = queue.pump_timeout(tick_interval);
                    ticks += 1;
                    if executed > 0 {
                        debug!(executed, ticks, "Owning thread ran queued work");
                    }
                }
                // Dropping the queue fails everything still pending.
                if queue.pending() > 0 {
                    warn!(pending = queue.pending(), "Owning thread stopping with queued work");
                }
            })
            .context("Failed to spawn owning thread")?;

        ready_rx
            .recv()
            .map_err(|_| anyhow!("Owning thread exited before binding"))??;
        info!(tick_ms = tick_interval.as_millis() as u64, "🧵 Owning thread started");

        Ok(Self {
            handle: Some(handle),
            running,
            dispatcher,
        })
    }

    /// A handle for posting work to this thread.
    pub fn dispatcher(&self) -> MainThreadHandle {
        self.dispatcher.clone()
    }

    /// Stops the loop and joins the thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Owning thread panicked");
            } else {
                info!("🧵 Owning thread stopped");
            }
        }
    }
}

impl Drop for OwningThread {
    fn drop(&mut self) {
        self.stop();
    }
}
