//! Subscription handles and the bookkeeping behind them.

use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tokio::task::AbortHandle;
use tracing::{debug, error};

use crate::store::Query;

/// Release hook of the underlying store listener.
pub(crate) type Release = Box<dyn FnOnce() + Send>;

/// Serializes callback delivery against unsubscribe.
///
/// Delivery holds the (reentrant) lock for the duration of the callback, so
/// once `close` returns no callback is running on another thread and none
/// will start. A callback may close its own gate.
pub(crate) struct Gate {
    open: ReentrantMutex<Cell<bool>>,
    release: Mutex<Option<Release>>,
}

impl Gate {
    pub(crate) fn new(release: Option<Release>) -> Self {
        Self {
            open: ReentrantMutex::new(Cell::new(true)),
            release: Mutex::new(release),
        }
    }

    /// Run `callback` if the gate is still open. Returns false once closed.
    pub(crate) fn deliver(&self, subscription: u64, callback: impl FnOnce()) -> bool {
        let open = self.open.lock();
        if !open.get() {
            return false;
        }
        if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
            error!(subscription, "subscription callback panicked");
        }
        true
    }

    /// Close the gate and release the store listener. Returns whether it was open.
    pub(crate) fn close(&self) -> bool {
        let was_open = self.open.lock().replace(false);
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
        }
        was_open
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.lock().get()
    }
}

/// Live subscriptions of one manager, keyed by subscription id.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: AtomicU64,
    active: Mutex<HashMap<u64, Query>>,
}

impl Registry {
    pub(crate) fn register(&self, query: &Query) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.active.lock().insert(id, query.clone());
        id
    }

    pub(crate) fn release(&self, id: u64) -> bool {
        self.active.lock().remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.active.lock().len()
    }
}

/// Handle to a live subscription.
///
/// [`unsubscribe`](Self::unsubscribe) stops every further callback and
/// releases the store listener. Dropping the handle does the same.
#[must_use = "dropping a SubscriptionHandle unsubscribes immediately"]
pub struct SubscriptionHandle {
    id: u64,
    gate: Arc<Gate>,
    task: AbortHandle,
    registry: Arc<Registry>,
}

impl SubscriptionHandle {
    pub(crate) fn new(
        id: u64,
        gate: Arc<Gate>,
        task: AbortHandle,
        registry: Arc<Registry>,
    ) -> Self {
        Self {
            id,
            gate,
            task,
            registry,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// False after unsubscribing or after the subscription ended with an error.
    pub fn is_active(&self) -> bool {
        self.gate.is_open()
    }

    /// Stop the subscription. Returns false if it had already stopped;
    /// calling it again is a no-op.
    pub fn unsubscribe(&self) -> bool {
        let was_open = self.gate.close();
        self.task.abort();
        self.registry.release(self.id);
        if was_open {
            debug!(subscription = self.id, "unsubscribed");
        }
        was_open
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
