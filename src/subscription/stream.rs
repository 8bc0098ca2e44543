//! SnapshotStream - owner-scoped snapshots consumed as a `futures::Stream`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::SubscriptionHandle;
use crate::error::Result;
use crate::record::Movie;

/// Snapshots of an owner's movies as a [`Stream`].
///
/// Yields the complete ordered list on every change. After a store error
/// the stream yields that error and ends.
pub struct SnapshotStream {
    receiver: mpsc::UnboundedReceiver<Result<Vec<Movie>>>,
    handle: SubscriptionHandle,
}

impl SnapshotStream {
    pub(crate) fn new(
        receiver: mpsc::UnboundedReceiver<Result<Vec<Movie>>>,
        handle: SubscriptionHandle,
    ) -> Self {
        Self { receiver, handle }
    }

    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Wait for the next snapshot.
    pub async fn recv(&mut self) -> Option<Result<Vec<Movie>>> {
        self.receiver.recv().await
    }

    /// Stop the underlying subscription. Already-queued snapshots can still be read.
    pub fn unsubscribe(&self) -> bool {
        self.handle.unsubscribe()
    }
}

impl Stream for SnapshotStream {
    type Item = Result<Vec<Movie>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
