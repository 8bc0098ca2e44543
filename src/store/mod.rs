//! Record Store - the document database contract the sync layer runs on.
//!
//! The store owns persisted state. The sync layer only needs four things
//! from it:
//!
//! - filtered live queries that deliver the complete current result set on
//!   every change,
//! - single-document add / update / delete with last-write-wins semantics,
//! - server-side timestamp generation ([`FieldValue::ServerTimestamp`]),
//! - a stable id assigned to each document when it is created.
//!
//! ## Example
//!
//! ```ignore
//! use reelsync::store::{DocumentWrite, InMemoryRecordStore, Query, RecordStore};
//!
//! let store = InMemoryRecordStore::new();
//! let id = store
//!     .add("movies", DocumentWrite::new().set("title", "Dune").server_timestamp("createdAt"))
//!     .await?;
//!
//! let mut listener = store.listen(Query::document("movies", &id));
//! let snapshot = listener.next().await;
//! ```

#[cfg(feature = "memory")]
mod in_memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

#[cfg(feature = "memory")]
pub use in_memory::InMemoryRecordStore;

/// Field mapping of a stored document.
pub type DocumentData = serde_json::Map<String, Value>;

/// The complete result set of a live query at one point in time.
pub type QuerySnapshot = Vec<Document>;

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored document and the id the store assigned to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: DocumentData,
}

impl Document {
    pub fn new(id: impl Into<String>, data: DocumentData) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// What a write does to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Set(Value),
    /// Remove the field from the document.
    Delete,
    /// Replaced by the store's clock when the write is committed.
    ServerTimestamp,
}

/// A single-document write: an ordered map of field transforms.
///
/// On `add` the resulting document holds exactly the `Set` and
/// `ServerTimestamp` fields. On `update` the transforms are merged into the
/// existing document; fields not named are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentWrite {
    fields: BTreeMap<String, FieldValue>,
}

impl DocumentWrite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), FieldValue::Set(value.into()));
        self
    }

    pub fn delete(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::Delete);
        self
    }

    pub fn server_timestamp(mut self, field: impl Into<String>) -> Self {
        self.fields.insert(field.into(), FieldValue::ServerTimestamp);
        self
    }

    /// Set the field when `value` is present, otherwise delete it.
    pub fn set_or_delete<V: Into<Value>>(self, field: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.set(field, value),
            None => self.delete(field),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Predicate of a live query.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Documents whose `field` equals `value`.
    FieldEquals { field: String, value: Value },
    /// The single document with this id.
    DocumentId(String),
}

/// A live query over one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: Filter,
}

impl Query {
    pub fn field_equals(
        collection: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::FieldEquals {
                field: field.into(),
                value: value.into(),
            },
        }
    }

    pub fn document(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: Filter::DocumentId(id.into()),
        }
    }

    /// Whether `doc` (assumed to live in this query's collection) matches.
    pub fn matches(&self, doc: &Document) -> bool {
        match &self.filter {
            Filter::FieldEquals { field, value } => doc.data.get(field) == Some(value),
            Filter::DocumentId(id) => &doc.id == id,
        }
    }
}

/// Failures reported by a record store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// e.g. the query needs a composite index that does not exist.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },
    /// Network or backend outage.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("document serialization error: {0}")]
    Serde(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Receiving end of a live query registration.
///
/// Every item is either the complete current result set or the error that
/// terminated the query. Dropping the listener (or calling [`detach`])
/// releases the registration held by the store.
///
/// [`detach`]: SnapshotListener::detach
pub struct SnapshotListener {
    receiver: mpsc::UnboundedReceiver<StoreResult<QuerySnapshot>>,
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl SnapshotListener {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<StoreResult<QuerySnapshot>>,
        detach: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            detach: Some(Box::new(detach)),
        }
    }

    /// A listener that yields `err` once and then ends.
    pub fn failed(err: StoreError) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive, send cannot fail.
        let _ = sender.send(Err(err));
        Self {
            receiver,
            detach: None,
        }
    }

    /// Wait for the next snapshot. `None` once the store closed the query.
    pub async fn next(&mut self) -> Option<StoreResult<QuerySnapshot>> {
        self.receiver.recv().await
    }

    /// Take over releasing the store registration, e.g. to release it from
    /// another thread. The listener no longer releases it on drop.
    pub fn take_detach(&mut self) -> Option<Box<dyn FnOnce() + Send>> {
        self.detach.take()
    }

    /// Release the store registration. Safe to call more than once.
    pub fn detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
        self.receiver.close();
    }
}

impl Drop for SnapshotListener {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Abstract document database.
///
/// Implementations provide last-write-wins semantics without version checks.
/// `listen` must register the query before returning and queue the initial
/// snapshot, so that any write committed afterwards is observed.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Create a document with a fresh id and return that id.
    async fn add(&self, collection: &str, write: DocumentWrite) -> StoreResult<String>;

    /// Merge `write` into an existing document. All-or-nothing.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> StoreResult<()>;

    /// Hard-delete a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;

    /// Read a single document.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Open a live query.
    fn listen(&self, query: Query) -> SnapshotListener;
}
