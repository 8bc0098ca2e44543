//! LiveCollection - wires the gateway and the subscription manager to one store.
//!
//! The store handle is passed in explicitly; nothing in this crate reaches
//! for process-wide clients.

use std::sync::Arc;

use tracing::debug;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::gateway::MutationGateway;
use crate::record::Movie;
use crate::store::RecordStore;
use crate::subscription::SubscriptionManager;

/// Gateway, subscriptions and single-record reads over one collection.
pub struct LiveCollection<S> {
    store: Arc<S>,
    config: SyncConfig,
    gateway: MutationGateway<S>,
    subscriptions: SubscriptionManager<S>,
}

impl<S> Clone for LiveCollection<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            gateway: self.gateway.clone(),
            subscriptions: self.subscriptions.clone(),
        }
    }
}

impl<S: RecordStore> LiveCollection<S> {
    pub fn new(store: Arc<S>, config: SyncConfig) -> Self {
        debug!(collection = %config.collection, "opening live collection");
        Self {
            gateway: MutationGateway::new(Arc::clone(&store), &config),
            subscriptions: SubscriptionManager::new(Arc::clone(&store), &config),
            store,
            config,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn gateway(&self) -> &MutationGateway<S> {
        &self.gateway
    }

    pub fn subscriptions(&self) -> &SubscriptionManager<S> {
        &self.subscriptions
    }

    /// Read one movie by id. `None` when it does not exist.
    pub async fn fetch(&self, id: &str) -> Result<Option<Movie>> {
        let doc = self.store.get(&self.config.collection, id).await?;
        Ok(doc.as_ref().map(Movie::from_document).transpose()?)
    }
}
