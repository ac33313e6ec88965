//! JSON-file storage that survives process restarts.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use tokio::sync::Mutex;

use crate::{SessionStore, StoreError};

/// Stores every entry in one JSON object file.
///
/// Writes go to a uniquely named sibling temp file that is then renamed
/// over the real one, so a crash mid-write leaves either the old or the
/// new contents.
///
/// Operations on one `FileStore` are serialized by an async lock. Separate
/// instances on the same path (for example two processes) are not: each
/// write replaces the whole file, so concurrent writers are
/// last-writer-wins per file and one may lose the other's key update.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

type Entries = BTreeMap<String, String>;

impl FileStore {
    /// Uses `path` as the backing file. The file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<path>.<pid>-<random>.tmp`, distinct per write and per process.
    fn temp_path(&self) -> PathBuf {
        let nonce: u64 = rand::rng().random();
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}-{nonce:016x}.tmp", std::process::id()));
        PathBuf::from(tmp)
    }

    async fn load(&self) -> Result<Entries, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(Entries::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save(&self, entries: &Entries) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries).map_err(StoreError::Corrupt)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.temp_path();
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        tracing::trace!(path = %self.path.display(), entries = entries.len(), "store file written");
        Ok(())
    }
}

impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        entries.insert(key.to_owned(), value.to_owned());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries).await
    }
}
