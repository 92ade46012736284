/// Owning-thread dispatch
///
/// Some console commands touch world state that may only be mutated from the
/// owning thread. Work for that thread is posted through an
/// [`OwningThreadDispatcher`]; the owning thread drains it with
/// [`MainThreadQueue::pump`] once per tick.
use crate::error::CommandError;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tracing::{debug, error, warn};

/// A unit of work for the owning thread.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Submits work to the single thread that owns world state.
pub trait OwningThreadDispatcher: Send + Sync {
    /// Queues `work` for execution on the owning thread.
    ///
    /// Returns immediately; it does not wait for the work to run.
    fn post(&self, work: Work) -> Result<(), CommandError>;

    /// Whether the calling thread is the owning thread.
    fn is_owning_thread(&self) -> bool;
}

/// Runs posted work immediately on the posting thread.
///
/// Useful in tests and in hosts that have no thread affinity rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl OwningThreadDispatcher for InlineDispatcher {
    fn post(&self, work: Work) -> Result<(), CommandError> {
        work();
        Ok(())
    }

    fn is_owning_thread(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
struct QueueState {
    owner: OnceLock<ThreadId>,
    closed: AtomicBool,
}

/// Work queue drained by the owning thread.
///
/// The queue is created by the host, bound on the owning thread, and pumped
/// from that thread's loop. Clones of [`MainThreadHandle`] are given to
/// everything that needs to post work.
pub struct MainThreadQueue {
    sender: Sender<Work>,
    receiver: Receiver<Work>,
    state: Arc<QueueState>,
}

impl MainThreadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            sender,
            receiver,
            state: Arc::new(QueueState::default()),
        }
    }

    /// Returns a dispatcher that posts into this queue.
    pub fn handle(&self) -> MainThreadHandle {
        MainThreadHandle {
            sender: self.sender.clone(),
            state: Arc::clone(&self.state),
        }
    }

    /// Marks the calling thread as the owning thread.
    ///
    /// Binding is permanent. Binding again from the same thread is a no-op;
    /// binding from a different thread fails.
    pub fn bind(&self) -> Result<(), CommandError> {
        let current = thread::current().id();
        let owner = *self.state.owner.get_or_init(|| current);
        if owner == current {
            Ok(())
        } else {
            Err(CommandError::OwningThreadUnavailable(format!(
                "queue already bound to {owner:?}"
            )))
        }
    }

    /// Runs every queued item without blocking. Returns how many ran.
    pub fn pump(&self) -> usize {
        let mut executed = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(work) => {
                    run_work(work);
                    executed += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        executed
    }

    /// Waits up to `timeout` for work to arrive, then drains the queue.
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        match self.receiver.recv_timeout(timeout) {
            Ok(work) => {
                run_work(work);
                1 + self.pump()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Number of items waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Rejects further posts and drops pending work.
    ///
    /// Callers blocked on dropped work observe
    /// [`CommandError::OwningThreadUnavailable`].
    pub fn close(&self) {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut dropped = 0;
        while let Ok(work) = self.receiver.try_recv() {
            drop(work);
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "Owning-thread queue closed with pending work");
        } else {
            debug!("Owning-thread queue closed");
        }
    }

    /// Whether [`close`](Self::close) has run; posts then fail immediately.
    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Default for MainThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MainThreadQueue {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_work(work: Work) {
    if panic::catch_unwind(AssertUnwindSafe(work)).is_err() {
        error!("Owning-thread work panicked");
    }
}

/// Cloneable dispatcher for a [`MainThreadQueue`].
#[derive(Clone)]
pub struct MainThreadHandle {
    sender: Sender<Work>,
    state: Arc<QueueState>,
}

impl std::fmt::Debug for MainThreadHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadHandle")
            .field("owner", &self.state.owner.get())
            .field("closed", &self.state.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl OwningThreadDispatcher for MainThreadHandle {
    fn post(&self, work: Work) -> Result<(), CommandError> {
        if self.state.closed.load(Ordering::SeqCst) {
            return Err(CommandError::OwningThreadUnavailable(
                "owning-thread queue is closed".to_string(),
            ));
        }
        if self.state.owner.get().is_none() {
            return Err(CommandError::OwningThreadUnavailable(
                "owning thread has not started".to_string(),
            ));
        }
        self.sender.send(work).map_err(|_| {
            CommandError::OwningThreadUnavailable("owning-thread queue was dropped".to_string())
        })
    }

    fn is_owning_thread(&self) -> bool {
        self.state.owner.get() == Some(&thread::current().id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_inline_dispatcher_runs_immediately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        InlineDispatcher
            .post(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!InlineDispatcher.is_owning_thread());
    }

    #[test]
    fn test_post_before_bind_is_rejected() {
        let queue = MainThreadQueue::new();
        let result = queue.handle().post(Box::new(|| {}));
        assert!(matches!(result, Err(CommandError::OwningThreadUnavailable(_))));
    }

    #[test]
    fn test_pump_runs_work_in_order() {
        let queue = MainThreadQueue::new();
        queue.bind().unwrap();
        let handle = queue.handle();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            handle.post(Box::new(move || seen.lock().push(i))).unwrap();
        }

        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.pump(), 3);
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
        assert!(handle.is_owning_thread());
    }

    #[test]
    fn test_bind_from_other_thread_fails() {
        let queue = Arc::new(MainThreadQueue::new());
        queue.bind().unwrap();
        let q = Arc::clone(&queue);
        let result = std::thread::spawn(move || q.bind()).join().unwrap();
        assert!(result.is_err());
        assert!(queue.bind().is_ok());
    }

    #[test]
    fn test_close_rejects_new_work() {
        let queue = MainThreadQueue::new();
        queue.bind().unwrap();
        let handle = queue.handle();
        handle.post(Box::new(|| {})).unwrap();
        queue.close();
        assert!(queue.is_closed());
        assert_eq!(queue.pending(), 0);
        assert!(handle.post(Box::new(|| {})).is_err());
    }

    #[test]
    fn test_panicking_work_does_not_stop_pump() {
        let queue = MainThreadQueue::new();
        queue.bind().unwrap();
        let handle = queue.handle();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        handle.post(Box::new(|| panic!("boom"))).unwrap();
        handle
            .post(Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        assert_eq!(queue.pump(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
