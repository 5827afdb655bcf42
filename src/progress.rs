//! Progress notification for long-running training and inference phases.
//!
//! Listeners are held behind a mutex so worker threads can report without
//! external synchronization; the registry is passed into each long-running
//! call rather than living as ambient state on the classifier.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Callback invoked with `(current, max, message)` from worker threads.
pub type ProgressListener = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Handle identifying a registered listener, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A thread-safe progress listener registry.
///
/// `Progress::default()` has no listeners and emits nothing. Delivery order
/// across listeners is unspecified.
#[derive(Default)]
pub struct Progress {
    listeners: Mutex<Vec<(ListenerId, ProgressListener)>>,
    next_id: AtomicU64,
}

impl Progress {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and return its removal handle.
    pub fn add_listener(
        &self,
        listener: impl Fn(usize, usize, &str) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .expect("progress listener lock poisoned")
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a previously registered listener. Unknown ids are ignored.
    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners
            .lock()
            .expect("progress listener lock poisoned")
            .retain(|(listener_id, _)| *listener_id != id);
    }

    /// Deliver a progress event to every registered listener.
    pub fn emit(&self, current: usize, max: usize, message: &str) {
        let listeners = self
            .listeners
            .lock()
            .expect("progress listener lock poisoned");
        for (_, listener) in listeners.iter() {
            listener(current, max, message);
        }
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.listeners.lock().map(|l| l.len()).unwrap_or(0);
        f.debug_struct("Progress").field("listeners", &count).finish()
    }
}
