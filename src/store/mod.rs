//! Key-value blob persistence.
//!
//! Snapshot lists are written through [`BlobStore`]. Two implementations
//! ship with the crate: [`MemoryBlobStore`] for tests and ephemeral use,
//! and [`FileBlobStore`], which keeps one file per key under a directory.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::{MizanError, Result};

/// Byte store keyed by string.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store name for logging/debugging.
    fn name(&self) -> &str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Insert or overwrite.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Keys starting with `prefix`, in ascending order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Blob store held in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs.get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let mut blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let blobs = self.blobs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(blobs
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Blob store with one file per key under a root directory.
///
/// Keys are percent-encoded into file names, so `snapshots/u1` becomes
/// `snapshots%2Fu1`. Each write goes to its own uniquely named temporary file
/// that is then renamed over the target, so readers never see a partial blob
/// and concurrent writers to one key never share a file.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

// Encoded keys never start with a dot, so temp files cannot be mistaken for blobs.
const TMP_PREFIX: &str = ".";
const TMP_SUFFIX: &str = ".tmp";

impl FileBlobStore {
    /// Use `root`, creating it if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| MizanError::Persistence(format!("failed to create {root:?}: {e}")))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(encode_key(key))
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MizanError::Persistence(format!(
                "failed to read {path:?}: {e}"
            ))),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let root = self.root.clone();
        let path = self.path_for(key);
        let len = bytes.len();

        tokio::task::spawn_blocking(move || write_replacing(&root, &path, &bytes))
            .await
            .map_err(|e| MizanError::Persistence(format!("blob write task failed: {e}")))??;

        debug!(key, bytes = len, "blob written");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut dir = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            MizanError::Persistence(format!("failed to list {:?}: {e}", self.root))
        })?;

        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| MizanError::Persistence(format!("failed to list {:?}: {e}", self.root)))?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if name.starts_with(TMP_PREFIX) || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            if let Some(key) = decode_key(name) {
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Write `bytes` to a fresh temp file in `root` and rename it over `path`.
fn write_replacing(root: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::Builder::new()
        .prefix(TMP_PREFIX)
        .suffix(TMP_SUFFIX)
        .tempfile_in(root)
        .map_err(|e| MizanError::Persistence(format!("failed to create temp file in {root:?}: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| MizanError::Persistence(format!("failed to write {:?}: {e}", tmp.path())))?;
    tmp.persist(path).map_err(|e| {
        MizanError::Persistence(format!("failed to replace {path:?}: {}", e.error))
    })?;
    Ok(())
}

/// Percent-encode a key into a single file name.
///
/// `.` is escaped too, so a name is never `.`, `..` or dot-prefixed.
fn encode_key(key: &str) -> String {
    urlencoding::encode(key).replace('.', "%2E")
}

/// Inverse of [`encode_key`]. `None` for names this store did not write.
fn decode_key(name: &str) -> Option<String> {
    let key = urlencoding::decode(name).ok()?.into_owned();
    (encode_key(&key) == name).then_some(key)
}
