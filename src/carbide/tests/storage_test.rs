//! Unit tests for blob storage
//!
//! Tests for filesystem and in-memory stores, key sanitization and
//! concurrent writers of the same content-addressed key.

use carbide::cache::{BlobStore, FsBlobStore, MemoryBlobStore};
use std::sync::Arc;
use tempfile::TempDir;

const KEY: &str = "k3s_sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

#[tokio::test]
async fn test_fs_store_put_get() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap();

    store.put(KEY, b"hello").await.unwrap();
    assert_eq!(store.get(KEY).await.unwrap(), Some(b"hello".to_vec()));
    assert!(store.blob_path(KEY).exists());
}

#[tokio::test]
async fn test_fs_store_missing_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap();

    assert_eq!(store.get("rancher_sha256:missing").await.unwrap(), None);
}

#[tokio::test]
async fn test_fs_store_overwrites() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap();

    store.put(KEY, b"first").await.unwrap();
    store.put(KEY, b"second").await.unwrap();
    assert_eq!(store.get(KEY).await.unwrap(), Some(b"second".to_vec()));
}

#[test]
fn test_fs_store_sanitizes_keys() {
    let temp_dir = TempDir::new().unwrap();
    let store = FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap();

    let path = store.blob_path("a/b_sha256:abc");
    assert_eq!(path, temp_dir.path().join("blobs").join("a-b_sha256_abc"));
}

#[tokio::test]
async fn test_fs_store_concurrent_identical_puts() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(FsBlobStore::new(temp_dir.path().to_path_buf()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.put(KEY, b"same bytes").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.get(KEY).await.unwrap(), Some(b"same bytes".to_vec()));

    // No temp files left behind
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path().join("blobs"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_memory_store() {
    let store = MemoryBlobStore::new();
    assert!(store.is_empty().await);

    store.put(KEY, b"hello").await.unwrap();
    store.put(KEY, b"hello").await.unwrap();
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get(KEY).await.unwrap(), Some(b"hello".to_vec()));
    assert_eq!(store.get("other").await.unwrap(), None);
}
