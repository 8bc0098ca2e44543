use futures::StreamExt;
use reelsync::{ErrorKind, MovieDraft, StoreError};
use tokio::time::timeout;

use crate::support::{collection, WAIT};

#[tokio::test]
async fn watch_yields_snapshots() {
    let (_store, movies) = collection();
    let mut stream = movies.subscriptions().watch("u1");

    let initial = timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();
    assert!(initial.is_empty());

    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien"))
        .await
        .unwrap();
    let changed = timeout(WAIT, stream.recv()).await.unwrap().unwrap().unwrap();
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].id, id);

    assert!(stream.handle().is_active());
    assert!(stream.unsubscribe());
    assert!(!stream.handle().is_active());
}

#[tokio::test]
async fn stream_ends_after_an_error() {
    let (store, movies) = collection();
    let mut stream = movies.subscriptions().watch("u1");
    timeout(WAIT, stream.next()).await.unwrap().unwrap().unwrap();

    store
        .reject_listeners(StoreError::Unavailable("backend restarting".into()))
        .unwrap();

    let err = timeout(WAIT, stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(timeout(WAIT, stream.next()).await.unwrap().is_none());
    assert!(!stream.handle().is_active());
}

#[tokio::test]
async fn dropping_the_stream_unsubscribes() {
    let (store, movies) = collection();
    let stream = movies.subscriptions().watch("u1");
    assert_eq!(store.listener_count().unwrap(), 1);

    drop(stream);
    assert_eq!(store.listener_count().unwrap(), 0);
    assert_eq!(movies.subscriptions().active_count(), 0);
}
