//! InMemoryRecordStore - HashMap-backed record store for testing and development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    Document, DocumentData, DocumentWrite, FieldValue, Query, QuerySnapshot, RecordStore,
    SnapshotListener, StoreError, StoreResult,
};

/// A live query registered against the store.
struct Registration {
    id: u64,
    query: Query,
    sender: mpsc::UnboundedSender<StoreResult<QuerySnapshot>>,
}

#[derive(Default)]
struct State {
    documents: HashMap<String, Document>,
    listeners: Vec<Registration>,
    next_listener_id: u64,
    last_timestamp: Option<DateTime<Utc>>,
    write_failure: Option<StoreError>,
    listen_failure: Option<StoreError>,
}

impl State {
    /// Wall clock, forced strictly monotonic across writes.
    fn server_now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn check_writable(&self) -> StoreResult<()> {
        match &self.write_failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn snapshot(&self, query: &Query) -> QuerySnapshot {
        let prefix = format!("{}:", query.collection);
        let mut docs: Vec<Document> = self
            .documents
            .iter()
            .filter(|(key, doc)| key.starts_with(&prefix) && query.matches(doc))
            .map(|(_, doc)| doc.clone())
            .collect();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        docs
    }

    /// Push fresh snapshots to every listener the write touched.
    ///
    /// Runs under the state lock, so listeners see writes in commit order.
    fn notify(&mut self, collection: &str, before: Option<&Document>, after: Option<&Document>) {
        let mut closed = Vec::new();

        for registration in &self.listeners {
            if registration.query.collection != collection {
                continue;
            }
            let touched = before.is_some_and(|doc| registration.query.matches(doc))
                || after.is_some_and(|doc| registration.query.matches(doc));
            if !touched {
                continue;
            }

            let snapshot = self.snapshot(&registration.query);
            if registration.sender.send(Ok(snapshot)).is_err() {
                closed.push(registration.id);
            }
        }

        if !closed.is_empty() {
            self.listeners.retain(|r| !closed.contains(&r.id));
        }
    }
}

/// Resolve the transforms of `write` on top of `data`.
fn apply_write(
    mut data: DocumentData,
    write: &DocumentWrite,
    now: DateTime<Utc>,
) -> StoreResult<DocumentData> {
    let stamp = serde_json::to_value(now).map_err(|e| StoreError::Serde(e.to_string()))?;

    for (field, value) in write.iter() {
        match value {
            FieldValue::Set(value) => {
                data.insert(field.clone(), value.clone());
            }
            FieldValue::Delete => {
                data.remove(field);
            }
            FieldValue::ServerTimestamp => {
                data.insert(field.clone(), stamp.clone());
            }
        }
    }

    Ok(data)
}

/// In-memory record store backed by a HashMap.
///
/// Storage key is `"collection:id"`. Clone-friendly via Arc; clones share
/// documents and listeners.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn make_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))
    }

    /// Make every subsequent write fail with `failure` (`None` restores writes).
    pub fn fail_writes(&self, failure: Option<StoreError>) -> StoreResult<()> {
        self.lock()?.write_failure = failure;
        Ok(())
    }

    /// Make every subsequent `listen` fail with `failure` (`None` restores listens).
    pub fn fail_listens(&self, failure: Option<StoreError>) -> StoreResult<()> {
        self.lock()?.listen_failure = failure;
        Ok(())
    }

    /// Terminate every active listener with `err`.
    pub fn reject_listeners(&self, err: StoreError) -> StoreResult<()> {
        let mut state = self.lock()?;
        for registration in state.listeners.drain(..) {
            let _ = registration.sender.send(Err(err.clone()));
        }
        Ok(())
    }

    /// Number of documents across all collections.
    pub fn document_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.documents.len())
    }

    /// Number of live query registrations.
    pub fn listener_count(&self) -> StoreResult<usize> {
        Ok(self.lock()?.listeners.len())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn add(&self, collection: &str, write: DocumentWrite) -> StoreResult<String> {
        let mut state = self.lock()?;
        state.check_writable()?;

        let id = Uuid::new_v4().simple().to_string();
        let now = state.server_now();
        let doc = Document::new(id.clone(), apply_write(DocumentData::new(), &write, now)?);

        state
            .documents
            .insert(Self::make_key(collection, &id), doc.clone());
        state.notify(collection, None, Some(&doc));

        Ok(id)
    }

    async fn update(&self, collection: &str, id: &str, write: DocumentWrite) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.check_writable()?;

        let key = Self::make_key(collection, id);
        let existing = state
            .documents
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        let now = state.server_now();
        let doc = Document::new(id, apply_write(existing.data.clone(), &write, now)?);

        state.documents.insert(key, doc.clone());
        state.notify(collection, Some(&existing), Some(&doc));

        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut state = self.lock()?;
        state.check_writable()?;

        if let Some(existing) = state.documents.remove(&Self::make_key(collection, id)) {
            state.notify(collection, Some(&existing), None);
        }

        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let state = self.lock()?;
        Ok(state.documents.get(&Self::make_key(collection, id)).cloned())
    }

    fn listen(&self, query: Query) -> SnapshotListener {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(err) => return SnapshotListener::failed(err),
        };
        if let Some(err) = state.listen_failure.clone() {
            return SnapshotListener::failed(err);
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = state.next_listener_id;
        state.next_listener_id += 1;

        let _ = sender.send(Ok(state.snapshot(&query)));
        state.listeners.push(Registration { id, query, sender });

        let shared = Arc::downgrade(&self.state);
        SnapshotListener::new(receiver, move || {
            if let Some(shared) = shared.upgrade() {
                if let Ok(mut state) = shared.lock() {
                    state.listeners.retain(|r| r.id != id);
                }
            }
        })
    }
}
