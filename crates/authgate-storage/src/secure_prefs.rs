//! On-disk secure preferences for native shells.
//!
//! One JSON document maps full keys to encoded [`StoredItem`]s. Each value is
//! decoded on its own, so one corrupt entry never hides the others. Writes go
//! through a temp file and a rename; on Unix the file is owner-only.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::adapter::{AdapterKind, Namespace, SetOptions, StorageAdapter};
use crate::error::StorageError;
use crate::item::{now_ms, StoredItem};

type Document = BTreeMap<String, String>;

pub struct SecurePrefsAdapter {
    path: PathBuf,
    namespace: Namespace,
    // Serialises read-modify-write cycles on the document.
    lock: Mutex<()>,
}

impl SecurePrefsAdapter {
    pub fn new(path: impl Into<PathBuf>, prefix: &str) -> Self {
        Self {
            path: path.into(),
            namespace: Namespace::new(prefix),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => match serde_json::from_slice::<Document>(&bytes) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    warn!("Secure prefs at {:?} are corrupt, starting empty: {}", self.path, e);
                    Ok(Document::new())
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::new()),
            Err(e) => Err(StorageError::Unavailable(format!(
                "cannot read {:?}: {}",
                self.path, e
            ))),
        }
    }

    async fn store(&self, doc: &Document) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::Unavailable(format!("cannot create {:?}: {}", parent, e))
                })?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        restrict_permissions(&tmp).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await?;
    Ok(())
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[async_trait]
impl StorageAdapter for SecurePrefsAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::SecurePreferences
    }

    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let raw = StoredItem::new(value, options.ttl, now_ms()).encode()?;
        doc.insert(self.namespace.qualify(key), raw);
        self.store(&doc).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let full_key = self.namespace.qualify(key);
        let Some(raw) = doc.get(&full_key) else {
            return Ok(None);
        };
        let Some(item) = StoredItem::decode(&full_key, raw) else {
            return Ok(None);
        };
        if item.is_expired(now_ms()) {
            debug!("Secure pref '{}' expired, evicting", full_key);
            doc.remove(&full_key);
            self.store(&doc).await?;
            return Ok(None);
        }
        Ok(Some(item.value))
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        if doc.remove(&self.namespace.qualify(key)).is_some() {
            self.store(&doc).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let before = doc.len();
        doc.retain(|full_key, _| !self.namespace.owns(full_key));
        if doc.len() != before {
            self.store(&doc).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        Ok(doc
            .keys()
            .filter_map(|k| self.namespace.strip(k).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_roundtrip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs/secure.json");

        let first = SecurePrefsAdapter::new(&path, "id");
        first.set("token", "a.b.c", SetOptions::default()).await.unwrap();

        let second = SecurePrefsAdapter::new(&path, "id");
        assert_eq!(second.get("token").await.unwrap().as_deref(), Some("a.b.c"));
        assert!(second.is_persistent());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secure.json");
        let adapter = SecurePrefsAdapter::new(&path, "id");
        adapter.set("token", "t", SetOptions::default()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_zero_ttl_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = SecurePrefsAdapter::new(dir.path().join("s.json"), "id");
        adapter.set("token", "t", SetOptions::ttl_secs(0)).await.unwrap();
        assert_eq!(adapter.get("token").await.unwrap(), None);
        assert!(adapter.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_spares_other_prefix_in_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let indonesia = SecurePrefsAdapter::new(&path, "id");
        let malaysia = SecurePrefsAdapter::new(&path, "my");
        indonesia.set("token", "id-token", SetOptions::default()).await.unwrap();
        malaysia.set("token", "my-token", SetOptions::default()).await.unwrap();

        indonesia.clear().await.unwrap();

        assert_eq!(indonesia.get("token").await.unwrap(), None);
        assert_eq!(malaysia.get("token").await.unwrap().as_deref(), Some("my-token"));
    }

    #[tokio::test]
    async fn test_corrupt_entry_does_not_break_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let adapter = SecurePrefsAdapter::new(&path, "id");
        adapter.set("user", "alice", SetOptions::default()).await.unwrap();

        let mut doc: Document = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        doc.insert("id:token".into(), "{broken".into());
        std::fs::write(&path, serde_json::to_vec(&doc).unwrap()).unwrap();

        assert_eq!(adapter.get("token").await.unwrap(), None);
        assert_eq!(adapter.get("user").await.unwrap().as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_corrupt_document_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, b"not json at all").unwrap();
        let adapter = SecurePrefsAdapter::new(&path, "id");
        assert_eq!(adapter.get("token").await.unwrap(), None);
    }
}
