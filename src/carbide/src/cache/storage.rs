use crate::error::{CarbideError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::RwLock;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Key/value backend holding serialized bundles.
///
/// Keys are content-addressed (`<project>_sha256:<hex>`), so concurrent puts
/// of the same key always carry identical bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Read the value stored under `key`, `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
}

/// Blob store backed by one file per key
pub struct FsBlobStore {
    blobs_dir: PathBuf,
}

impl FsBlobStore {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let blobs_dir = base_dir.join("blobs");
        std::fs::create_dir_all(&blobs_dir)
            .map_err(|e| CarbideError::Storage(format!("Failed to create blobs dir: {}", e)))?;

        Ok(Self { blobs_dir })
    }

    /// Get blob path for a key. `:` and `/` are not portable in file names.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| match c {
                ':' => '_',
                '/' | '\\' => '-',
                c => c,
            })
            .collect();
        self.blobs_dir.join(file_name)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    /// Atomic write: temp file, sync, then rename over the target
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                CarbideError::Storage(format!("Failed to create blob dir: {}", e))
            })?;
        }

        // Unique per writer so concurrent identical puts never share a temp file
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, data)
            .await
            .map_err(|e| CarbideError::Storage(format!("Failed to write blob {}: {}", key, e)))?;

        if let Ok(file) = fs::File::open(&temp_path).await {
            let _ = file.sync_all().await;
        }

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CarbideError::Storage(format!("Failed to rename blob {}: {}", key, e)))?;

        tracing::debug!(key = %key, size = data.len(), "Stored blob");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key);
        match fs::read(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CarbideError::Storage(format!(
                "Failed to read blob {}: {}",
                key, e
            ))),
        }
    }
}

/// Process-local blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }
}
