//! Query Subscription Manager - live, owner-scoped snapshots of movie records.
//!
//! Each subscription owns one store listener and one delivery task. Every
//! change batch is materialized into the complete current list, sorted
//! newest first, and handed to the caller's callback. Callbacks for one
//! subscription never overlap and arrive in the store's event order.
//!
//! ## Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new(store, &SyncConfig::default());
//!
//! let handle = manager.subscribe(
//!     "u1",
//!     |movies| render(movies),
//!     |err| show_retry_banner(err),
//! );
//!
//! // later
//! handle.unsubscribe();
//! ```
//!
//! A store error is delivered once through `on_error` and ends the
//! subscription; there is no automatic reconnect.

mod handle;
mod stream;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::record::{field, materialize, Movie};
use crate::store::{Query, QuerySnapshot, RecordStore};

use handle::{Gate, Registry};

pub use handle::SubscriptionHandle;
pub use stream::SnapshotStream;

/// Opens and tracks live queries against one collection.
pub struct SubscriptionManager<S> {
    store: Arc<S>,
    collection: String,
    registry: Arc<Registry>,
}

impl<S> Clone for SubscriptionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S: RecordStore> SubscriptionManager<S> {
    pub fn new(store: Arc<S>, config: &SyncConfig) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
            registry: Arc::new(Registry::default()),
        }
    }

    /// Subscribe to every movie owned by `owner_id`.
    ///
    /// Returns immediately; the first snapshot (possibly empty) and every
    /// later one arrive through `on_change`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe<F, E>(&self, owner_id: &str, on_change: F, on_error: E) -> SubscriptionHandle
    where
        F: Fn(Vec<Movie>) + Send + Sync + 'static,
        E: Fn(SyncError) + Send + Sync + 'static,
    {
        let query = Query::field_equals(&self.collection, field::OWNER, owner_id);
        self.open(query, move |docs| on_change(materialize(&docs)), on_error)
    }

    /// Subscribe to a single movie, e.g. for a detail view.
    ///
    /// `on_change` receives `None` while the record does not exist, including
    /// after it is deleted.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn subscribe_record<F, E>(&self, id: &str, on_change: F, on_error: E) -> SubscriptionHandle
    where
        F: Fn(Option<Movie>) + Send + Sync + 'static,
        E: Fn(SyncError) + Send + Sync + 'static,
    {
        let query = Query::document(&self.collection, id);
        self.open(
            query,
            move |docs| on_change(materialize(&docs).into_iter().next()),
            on_error,
        )
    }

    /// Stream rendition of [`subscribe`](Self::subscribe).
    ///
    /// The stream ends after yielding an error, and unsubscribes when dropped.
    pub fn watch(&self, owner_id: &str) -> SnapshotStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let errors = sender.clone();

        let handle = self.subscribe(
            owner_id,
            move |movies| {
                let _ = sender.send(Ok(movies));
            },
            move |err| {
                let _ = errors.send(Err(err));
            },
        );

        SnapshotStream::new(receiver, handle)
    }

    /// Number of subscriptions that have not been unsubscribed or failed.
    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    fn open<D, E>(&self, query: Query, deliver: D, on_error: E) -> SubscriptionHandle
    where
        D: Fn(QuerySnapshot) + Send + Sync + 'static,
        E: Fn(SyncError) + Send + Sync + 'static,
    {
        let id = self.registry.register(&query);
        debug!(
            subscription = id,
            collection = %query.collection,
            filter = ?query.filter,
            "subscribing"
        );

        // Registered with the store before returning, so later writes are seen.
        let mut listener = self.store.listen(query);
        let gate = Arc::new(Gate::new(listener.take_detach()));

        let task_gate = Arc::clone(&gate);
        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(async move {
            while let Some(batch) = listener.next().await {
                match batch {
                    Ok(docs) => {
                        if !task_gate.deliver(id, || deliver(docs)) {
                            break;
                        }
                    }
                    Err(err) => {
                        let err = SyncError::from(err);
                        warn!(subscription = id, error = %err, "live query failed");
                        task_gate.deliver(id, || on_error(err));
                        break;
                    }
                }
            }
            task_gate.close();
            registry.release(id);
        });

        SubscriptionHandle::new(id, gate, task.abort_handle(), Arc::clone(&self.registry))
    }
}
