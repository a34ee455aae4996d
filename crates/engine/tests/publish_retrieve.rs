//! End-to-end publish/retrieve behavior.

mod common;

use common::{seeded_bytes, stack};
use tokio_util::sync::CancellationToken;
use weft_engine::EngineError;

#[tokio::test]
async fn round_trips_small_content() {
    let stack = stack().await;
    let cancel = CancellationToken::new();
    let data = b"hello mesh".to_vec();

    let outcome = stack
        .engine
        .publish(&data, Some("greeting".to_string()), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.content_id, "greeting");
    assert_eq!(outcome.version, 1);
    assert_eq!(outcome.num_chunks, 1);

    let restored = stack.engine.retrieve("greeting", &cancel).await.unwrap();
    assert_eq!(restored.as_ref(), data.as_slice());
}

#[tokio::test]
async fn splits_600_kib_into_three_chunks() {
    let stack = stack().await;
    let cancel = CancellationToken::new();
    let data = seeded_bytes(42, 600 * 1024);

    let outcome = stack
        .engine
        .publish(&data, Some("large".to_string()), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.num_chunks, 3);

    let manifest = stack.engine.manifest("large").await.unwrap().unwrap();
    assert_eq!(manifest.expected_chunk_size(0), Some(256 * 1024));
    assert_eq!(manifest.expected_chunk_size(1), Some(256 * 1024));
    assert_eq!(manifest.expected_chunk_size(2), Some(88 * 1024));

    let restored = stack.engine.retrieve("large", &cancel).await.unwrap();
    assert_eq!(restored.len(), 600 * 1024);
    assert_eq!(restored.as_ref(), data.as_slice());
}

#[tokio::test]
async fn empty_content_yields_zero_chunk_manifest() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    let outcome = stack
        .engine
        .publish(b"", Some("empty".to_string()), &cancel)
        .await
        .unwrap();
    assert_eq!(outcome.num_chunks, 0);
    assert!(outcome.placements.is_empty());

    let restored = stack.engine.retrieve("empty", &cancel).await.unwrap();
    assert!(restored.is_empty());
}

#[tokio::test]
async fn missing_content_id_gets_generated() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    let outcome = stack.engine.publish(b"anon", None, &cancel).await.unwrap();
    assert!(!outcome.content_id.is_empty());

    let restored = stack
        .engine
        .retrieve(&outcome.content_id, &cancel)
        .await
        .unwrap();
    assert_eq!(restored.as_ref(), b"anon".as_slice());
}

#[tokio::test]
async fn republish_creates_next_version() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    let v1 = stack
        .engine
        .publish(b"first edition", Some("doc".to_string()), &cancel)
        .await
        .unwrap();
    assert_eq!(v1.version, 1);

    let v2 = stack
        .engine
        .publish(b"second edition", Some("doc".to_string()), &cancel)
        .await
        .unwrap();
    assert_eq!(v2.version, 2);

    // Retrieve returns the latest version.
    let restored = stack.engine.retrieve("doc", &cancel).await.unwrap();
    assert_eq!(restored.as_ref(), b"second edition".as_slice());
}

#[tokio::test]
async fn unknown_content_is_not_found() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    match stack.engine.retrieve("no-such-id", &cancel).await {
        Err(EngineError::ContentNotFound(id)) => assert_eq!(id, "no-such-id"),
        other => panic!("expected ContentNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_publish_records_no_manifest() {
    let stack = stack().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = stack
        .engine
        .publish(&seeded_bytes(7, 512 * 1024), Some("cancelled".to_string()), &cancel)
        .await;
    assert!(matches!(result, Err(EngineError::Cancelled)));

    assert!(stack.engine.manifest("cancelled").await.unwrap().is_none());
}

#[tokio::test]
async fn cancelled_retrieve_stops_at_chunk_boundary() {
    let stack = stack().await;
    let cancel = CancellationToken::new();

    stack
        .engine
        .publish(b"some bytes", Some("doc".to_string()), &cancel)
        .await
        .unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    assert!(matches!(
        stack.engine.retrieve("doc", &cancelled).await,
        Err(EngineError::Cancelled)
    ));
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancellationToken::new();
    let data = seeded_bytes(99, 300 * 1024);

    let mut config = weft_core::AppConfig::for_testing();
    config.store.db_path = dir.path().join("weft.db");

    {
        let engine = weft_engine::Engine::from_config(&config).await.unwrap();
        engine
            .publish(&data, Some("durable".to_string()), &cancel)
            .await
            .unwrap();
    }

    // A fresh engine over the same database sees the content.
    let engine = weft_engine::Engine::from_config(&config).await.unwrap();
    let restored = engine.retrieve("durable", &cancel).await.unwrap();
    assert_eq!(restored.as_ref(), data.as_slice());
}
