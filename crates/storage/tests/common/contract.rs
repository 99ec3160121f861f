//! Behaviour every `ObjectStore` must share.

use bytes::Bytes;
use futures::StreamExt;
use stowage_storage::{ByteStream, ObjectStore, StorageError, StorageResult};

/// Build a stream from static chunks.
pub fn stream_of(chunks: &[&'static str]) -> ByteStream {
    let items: Vec<StorageResult<Bytes>> = chunks
        .iter()
        .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
        .collect();
    Box::pin(futures::stream::iter(items))
}

/// Drain a stream into memory.
pub async fn collect_stream(mut stream: ByteStream) -> Vec<u8> {
    let mut collected = Vec::new();
    while let Some(chunk) = stream.next().await {
        collected.extend_from_slice(&chunk.unwrap());
    }
    collected
}

#[allow(dead_code)]
pub async fn put_get_exists_remove(store: &dyn ObjectStore) {
    let key = "images/abc/json";
    let content = Bytes::from_static(br#"{"id":"abc"}"#);

    assert!(!store.exists(key).await.unwrap());
    store.put(key, content.clone()).await.unwrap();
    assert!(store.exists(key).await.unwrap());
    assert_eq!(store.get(key).await.unwrap(), content);

    // Overwrites silently.
    store.put(key, Bytes::from_static(b"{}")).await.unwrap();
    assert_eq!(store.get(key).await.unwrap(), Bytes::from_static(b"{}"));

    store.remove(key).await.unwrap();
    assert!(!store.exists(key).await.unwrap());
    assert!(matches!(store.get(key).await, Err(StorageError::NotFound(_))));
    assert!(matches!(store.remove(key).await, Err(StorageError::NotFound(_))));
}

#[allow(dead_code)]
pub async fn stream_roundtrip(store: &dyn ObjectStore) {
    let key = "images/abc/layer";
    let written = store
        .put_stream(key, stream_of(&["first chunk, ", "second chunk"]))
        .await
        .unwrap();
    assert_eq!(written, 25);

    let read = collect_stream(store.get_stream(key).await.unwrap()).await;
    assert_eq!(read, b"first chunk, second chunk");

    assert!(matches!(
        store.get_stream("images/missing/layer").await,
        Err(StorageError::NotFound(_))
    ));
}

#[allow(dead_code)]
pub async fn list_one_level(store: &dyn ObjectStore) {
    for key in [
        "repositories/ns/repo/tag_latest",
        "repositories/ns/repo/tag_v1",
        "repositories/ns/repo/images",
        "repositories/ns/other/tag_latest",
    ] {
        store.put(key, Bytes::from_static(b"\"abc\"")).await.unwrap();
    }

    assert_eq!(
        store.list("repositories/ns/repo").await.unwrap(),
        vec![
            "repositories/ns/repo/images",
            "repositories/ns/repo/tag_latest",
            "repositories/ns/repo/tag_v1",
        ]
    );
    assert_eq!(
        store.list("/repositories/ns/").await.unwrap(),
        vec!["repositories/ns/other", "repositories/ns/repo"]
    );
    assert!(store.list("repositories/none").await.unwrap().is_empty());
}

#[allow(dead_code)]
pub async fn remove_all_nested(store: &dyn ObjectStore) {
    for key in [
        "repositories/ns/repo/tag_latest",
        "repositories/ns/repo/images",
        "repositories/ns/repo/nested/deeper/object",
        "repositories/ns/keep/tag_latest",
    ] {
        store.put(key, Bytes::from_static(b"x")).await.unwrap();
    }

    store.remove_all("repositories/ns/repo").await.unwrap();
    assert!(store.list("repositories/ns/repo").await.unwrap().is_empty());
    assert!(
        store
            .exists("repositories/ns/keep/tag_latest")
            .await
            .unwrap()
    );

    store.remove_all("").await.unwrap();
    assert!(store.list("").await.unwrap().is_empty());

    // The backend stays usable after clearing the root.
    store.put("images/a/json", Bytes::from_static(b"{}")).await.unwrap();
    assert!(store.exists("images/a/json").await.unwrap());
}
