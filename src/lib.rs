//! Live collection sync for a personal movie list.
//!
//! - [`SubscriptionManager`] pushes the complete, ordered list of an owner's
//!   movies to a callback (or a [`SnapshotStream`]) on every change.
//! - [`MutationGateway`] validates and normalizes create / update / delete
//!   and lets the store stamp timestamps.
//! - [`RecordStore`] is the document database underneath;
//!   [`InMemoryRecordStore`] implements it for tests and local development.
//!
//! ```ignore
//! use std::sync::Arc;
//! use reelsync::{InMemoryRecordStore, LiveCollection, MovieDraft, SyncConfig};
//!
//! let movies = LiveCollection::new(Arc::new(InMemoryRecordStore::new()), SyncConfig::default());
//! let handle = movies.subscriptions().subscribe(
//!     "u1",
//!     |list| println!("{} movies", list.len()),
//!     |err| eprintln!("{err}"),
//! );
//! let id = movies.gateway().create("u1", MovieDraft::new("Dune").rating("8.5")).await?;
//! ```

mod collection;
mod config;
mod error;
mod gateway;
pub mod record;
pub mod store;
mod subscription;

pub use collection::LiveCollection;
pub use config::{ConfigError, SyncConfig, DEFAULT_COLLECTION};
pub use error::{ErrorKind, Result, SyncError};
pub use gateway::MutationGateway;
pub use record::{Movie, MovieDraft, MoviePatch, NumberInput};
#[cfg(feature = "memory")]
pub use store::InMemoryRecordStore;
pub use store::{
    Document, DocumentData, DocumentWrite, FieldValue, Filter, Query, QuerySnapshot, RecordStore,
    SnapshotListener, StoreError, StoreResult,
};
pub use subscription::{SnapshotStream, SubscriptionHandle, SubscriptionManager};
