use std::sync::Arc;

use reelsync::{
    ErrorKind, InMemoryRecordStore, LiveCollection, Movie, MovieDraft, MoviePatch, NumberInput,
    RecordStore, StoreError, SyncConfig, DEFAULT_COLLECTION,
};
use serde_json::json;

use crate::support::{collection, ids, next_snapshot, recorder};

#[tokio::test]
async fn create_then_fetch_returns_normalized_record() {
    let (_store, movies) = collection();

    let draft = MovieDraft::new("  Arrival ")
        .year("2016")
        .rating(NumberInput::Number(8.0))
        .genre(" Sci-Fi ")
        .poster_url("  ")
        .description(" First contact. ");
    let id = movies.gateway().create("u1", draft).await.unwrap();
    assert!(!id.is_empty());

    let movie = movies.fetch(&id).await.unwrap().unwrap();
    assert_eq!(movie.id, id);
    assert_eq!(movie.owner_id, "u1");
    assert_eq!(movie.title, "Arrival");
    assert_eq!(movie.year, Some(2016));
    assert_eq!(movie.rating, Some(8.0));
    assert_eq!(movie.genre.as_deref(), Some("Sci-Fi"));
    assert_eq!(movie.poster_url, None);
    assert_eq!(movie.description.as_deref(), Some("First contact."));
    assert!(!movie.watched);
    assert!(movie.created_at.is_some());
    assert_eq!(movie.created_at, movie.updated_at);
}

#[tokio::test]
async fn dune_with_out_of_range_rating() {
    let (_store, movies) = collection();

    let id = movies
        .gateway()
        .create("u1", MovieDraft::new(" Dune ").rating("15"))
        .await
        .unwrap();

    let movie = movies.fetch(&id).await.unwrap().unwrap();
    assert_eq!(movie.title, "Dune");
    assert_eq!(movie.rating, None);
    assert_eq!(movie.owner_id, "u1");
}

#[tokio::test]
async fn invalid_ratings_are_stored_absent() {
    let (_store, movies) = collection();
    let invalid: Vec<NumberInput> = vec![
        "15".into(),
        "-1".into(),
        "ten".into(),
        NumberInput::Number(10.5),
        NumberInput::Other(json!(true)),
    ];

    for rating in invalid {
        // Through create.
        let id = movies
            .gateway()
            .create("u1", MovieDraft::new("Heat").rating(rating.clone()))
            .await
            .unwrap();
        assert_eq!(movies.fetch(&id).await.unwrap().unwrap().rating, None);

        // Through update, over a previously valid rating.
        movies
            .gateway()
            .update(&id, MoviePatch::new().rating("7"))
            .await
            .unwrap();
        assert_eq!(movies.fetch(&id).await.unwrap().unwrap().rating, Some(7.0));

        movies
            .gateway()
            .update(&id, MoviePatch::new().rating(rating))
            .await
            .unwrap();
        assert_eq!(movies.fetch(&id).await.unwrap().unwrap().rating, None);
    }
}

#[tokio::test]
async fn updating_title_leaves_everything_else_alone() {
    let (_store, movies) = collection();

    let id = movies
        .gateway()
        .create(
            "u1",
            MovieDraft::new("Blade Runner")
                .year(1982)
                .rating("9")
                .genre("Sci-Fi")
                .poster_url("https://img.example/br.jpg")
                .description("Replicants."),
        )
        .await
        .unwrap();
    let before = movies.fetch(&id).await.unwrap().unwrap();

    movies
        .gateway()
        .update(&id, MoviePatch::new().title(" Blade Runner: Final Cut "))
        .await
        .unwrap();
    let after = movies.fetch(&id).await.unwrap().unwrap();

    assert_eq!(after.title, "Blade Runner: Final Cut");
    assert_eq!(after.genre, before.genre);
    assert_eq!(after.year, before.year);
    assert_eq!(after.poster_url, before.poster_url);
    assert_eq!(after.description, before.description);
    assert_eq!(after.rating, before.rating);
    assert_eq!(after.watched, before.watched);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.owner_id, before.owner_id);
    assert!(after.updated_at > before.updated_at);
    assert!(after.created_at <= after.updated_at);
}

#[tokio::test]
async fn patch_fields_cannot_move_ownership_or_creation_time() {
    let (_store, movies) = collection();
    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien"))
        .await
        .unwrap();
    let before = movies.fetch(&id).await.unwrap().unwrap();

    let fields = json!({
        "id": "other-id",
        "userId": "u2",
        "ownerId": "u2",
        "createdAt": "1999-01-01T00:00:00Z",
        "genre": "Horror"
    });
    let patch = MoviePatch::from_fields(fields.as_object().unwrap().clone()).unwrap();
    movies.gateway().update(&id, patch).await.unwrap();

    let after = movies.fetch(&id).await.unwrap().unwrap();
    assert_eq!(after.id, id);
    assert_eq!(after.owner_id, "u1");
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.genre.as_deref(), Some("Horror"));
}

#[tokio::test]
async fn clearing_optional_fields() {
    let (_store, movies) = collection();
    let id = movies
        .gateway()
        .create(
            "u1",
            MovieDraft::new("Brazil").year(1985).genre("Satire").description("Ducts."),
        )
        .await
        .unwrap();

    movies
        .gateway()
        .update(
            &id,
            MoviePatch::new().clear_year().genre("   ").description("Tuttle."),
        )
        .await
        .unwrap();

    let movie = movies.fetch(&id).await.unwrap().unwrap();
    assert_eq!(movie.year, None);
    assert_eq!(movie.genre, None);
    assert_eq!(movie.description.as_deref(), Some("Tuttle."));
}

#[tokio::test]
async fn set_watched_flips_only_the_flag() {
    let (_store, movies) = collection();
    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Ran").rating("9.5"))
        .await
        .unwrap();

    movies.gateway().set_watched(&id, true).await.unwrap();

    let movie = movies.fetch(&id).await.unwrap().unwrap();
    assert!(movie.watched);
    assert_eq!(movie.title, "Ran");
    assert_eq!(movie.rating, Some(9.5));
}

#[tokio::test]
async fn validation_errors_never_reach_the_store() {
    let (store, movies) = collection();

    let err = movies
        .gateway()
        .create("u1", MovieDraft::new("   "))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(store.document_count().unwrap(), 0);

    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien"))
        .await
        .unwrap();
    let err = movies
        .gateway()
        .update(&id, MoviePatch::new().title(" ").genre("Horror"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let movie = movies.fetch(&id).await.unwrap().unwrap();
    assert_eq!(movie.title, "Alien");
    assert_eq!(movie.genre, None);
}

#[tokio::test]
async fn update_of_missing_record_is_not_found() {
    let (_store, movies) = collection();
    let err = movies
        .gateway()
        .update("does-not-exist", MoviePatch::new().title("Alien"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn failed_update_changes_nothing() {
    let (store, movies) = collection();
    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien").genre("Horror"))
        .await
        .unwrap();
    let before = movies.fetch(&id).await.unwrap().unwrap();

    store
        .fail_writes(Some(StoreError::Unavailable("connection reset".into())))
        .unwrap();
    let err = movies
        .gateway()
        .update(&id, MoviePatch::new().title("Aliens").clear_genre())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unknown);
    assert!(err.is_retryable());

    store.fail_writes(None).unwrap();
    assert_eq!(movies.fetch(&id).await.unwrap().unwrap(), before);
}

#[tokio::test]
async fn rejected_writes_surface_their_kind() {
    let (store, movies) = collection();
    store
        .fail_writes(Some(StoreError::PermissionDenied("missing rules".into())))
        .unwrap();

    let err = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(!err.is_retryable());

    let err = movies.gateway().delete("any").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let (store, movies) = collection();
    let id = movies
        .gateway()
        .create("u1", MovieDraft::new("Alien"))
        .await
        .unwrap();

    movies.gateway().delete(&id).await.unwrap();
    movies.gateway().delete(&id).await.unwrap();

    assert!(movies.fetch(&id).await.unwrap().is_none());
    assert!(store
        .get(DEFAULT_COLLECTION, &id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn configured_collection_is_used_for_writes_reads_and_subscriptions() {
    let store = InMemoryRecordStore::new();
    let films = LiveCollection::new(
        Arc::new(store.clone()),
        SyncConfig::default().with_collection("films"),
    );
    assert_eq!(films.config().collection, "films");

    let (on_change, on_error, mut events) = recorder::<Vec<Movie>>();
    let _handle = films.subscriptions().subscribe("u1", on_change, on_error);
    assert!(next_snapshot(&mut events).await.is_empty());

    let id = films
        .gateway()
        .create("u1", MovieDraft::new("Dune"))
        .await
        .unwrap();
    assert_eq!(ids(&next_snapshot(&mut events).await), vec![id.clone()]);

    assert!(films.store().get("films", &id).await.unwrap().is_some());
    assert!(store.get(DEFAULT_COLLECTION, &id).await.unwrap().is_none());
    assert_eq!(films.fetch(&id).await.unwrap().unwrap().title, "Dune");
}
