//! MutationGateway - validated, normalized writes into the record store.
//!
//! Validation happens before anything is sent to the store, so a
//! `VALIDATION` error never costs a round trip. Timestamps are always
//! written as [`FieldValue::ServerTimestamp`](crate::store::FieldValue) and
//! resolved by the store. Nothing here retries; the caller decides.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::record::{
    field, normalize_text, normalize_title, parse_rating, parse_year, MovieDraft, MoviePatch,
};
use crate::store::{DocumentWrite, RecordStore, StoreError};

/// Set `field` only when `value` is present.
fn set_some<V: Into<Value>>(write: DocumentWrite, field: &str, value: Option<V>) -> DocumentWrite {
    match value {
        Some(value) => write.set(field, value),
        None => write,
    }
}

/// Build the document for a new movie.
pub(crate) fn create_write(owner_id: &str, draft: &MovieDraft) -> Result<DocumentWrite> {
    if owner_id.trim().is_empty() {
        return Err(SyncError::validation("owner id is required"));
    }
    let title = normalize_title(&draft.title)?;

    let write = DocumentWrite::new()
        .set(field::OWNER, owner_id)
        .set(field::TITLE, title);
    let write = set_some(write, field::YEAR, draft.year.as_ref().and_then(parse_year));
    let write = set_some(write, field::RATING, draft.rating.as_ref().and_then(parse_rating));
    let write = set_some(write, field::GENRE, draft.genre.as_deref().and_then(normalize_text));
    let write = set_some(
        write,
        field::POSTER_URL,
        draft.poster_url.as_deref().and_then(normalize_text),
    );
    let write = set_some(
        write,
        field::DESCRIPTION,
        draft.description.as_deref().and_then(normalize_text),
    );

    Ok(write
        .set(field::WATCHED, draft.watched.unwrap_or(false))
        .server_timestamp(field::CREATED_AT)
        .server_timestamp(field::UPDATED_AT))
}

/// Build the merge for a partial update. Only fields present in the patch are touched.
pub(crate) fn update_write(patch: &MoviePatch) -> Result<DocumentWrite> {
    let mut write = DocumentWrite::new();

    if let Some(title) = &patch.title {
        let title = title
            .as_deref()
            .ok_or_else(|| SyncError::validation("title cannot be cleared"))?;
        write = write.set(field::TITLE, normalize_title(title)?);
    }
    if let Some(year) = &patch.year {
        write = write.set_or_delete(field::YEAR, year.as_ref().and_then(parse_year));
    }
    if let Some(rating) = &patch.rating {
        write = write.set_or_delete(field::RATING, rating.as_ref().and_then(parse_rating));
    }
    if let Some(genre) = &patch.genre {
        write = write.set_or_delete(field::GENRE, genre.as_deref().and_then(normalize_text));
    }
    if let Some(poster_url) = &patch.poster_url {
        write = write.set_or_delete(
            field::POSTER_URL,
            poster_url.as_deref().and_then(normalize_text),
        );
    }
    if let Some(description) = &patch.description {
        write = write.set_or_delete(
            field::DESCRIPTION,
            description.as_deref().and_then(normalize_text),
        );
    }
    if let Some(watched) = patch.watched {
        write = write.set(field::WATCHED, watched);
    }

    Ok(write.server_timestamp(field::UPDATED_AT))
}

/// Create / update / delete for movie records.
pub struct MutationGateway<S> {
    store: Arc<S>,
    collection: String,
}

impl<S> Clone for MutationGateway<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection.clone(),
        }
    }
}

impl<S: RecordStore> MutationGateway<S> {
    pub fn new(store: Arc<S>, config: &SyncConfig) -> Self {
        Self {
            store,
            collection: config.collection.clone(),
        }
    }

    /// Create a movie owned by `owner_id` and return its new id.
    pub async fn create(&self, owner_id: &str, draft: MovieDraft) -> Result<String> {
        let write = create_write(owner_id, &draft)?;

        let id = self
            .store
            .add(&self.collection, write)
            .await
            .map_err(|err| {
                warn!(collection = %self.collection, owner_id, error = %err, "create failed");
                SyncError::from(err)
            })?;

        debug!(collection = %self.collection, id = %id, owner_id, "movie created");
        Ok(id)
    }

    /// Apply a partial update and re-stamp `updatedAt`.
    ///
    /// Fails with `NOT_FOUND` when the record does not exist. A failed
    /// update leaves the stored record untouched.
    pub async fn update(&self, id: &str, patch: MoviePatch) -> Result<()> {
        let write = update_write(&patch)?;

        self.store
            .update(&self.collection, id, write)
            .await
            .map_err(|err| {
                warn!(collection = %self.collection, id, error = %err, "update failed");
                SyncError::from(err)
            })?;

        debug!(collection = %self.collection, id, "movie updated");
        Ok(())
    }

    /// Hard-delete a movie. Deleting a record that does not exist succeeds.
    pub async fn delete(&self, id: &str) -> Result<()> {
        match self.store.delete(&self.collection, id).await {
            Ok(()) => {
                debug!(collection = %self.collection, id, "movie deleted");
                Ok(())
            }
            Err(StoreError::NotFound { .. }) => {
                debug!(collection = %self.collection, id, "movie already gone");
                Ok(())
            }
            Err(err) => {
                warn!(collection = %self.collection, id, error = %err, "delete failed");
                Err(err.into())
            }
        }
    }

    /// Flip the watched flag without touching anything else.
    pub async fn set_watched(&self, id: &str, watched: bool) -> Result<()> {
        self.update(id, MoviePatch::new().watched(watched)).await
    }
}
