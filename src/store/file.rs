//! JSON-file store: one `<user>.json` document per user under a data directory.
//!
//! File stems are the percent-encoded user id, or `~` plus its SHA-256 when the
//! encoded form would exceed `MAX_STEM_LEN`.
//!
//! Writes go through a temp file in the same directory and are renamed into place.
//! A process-wide async mutex serializes the read-compare-write of `save`.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use super::{INITIAL_VERSION, StoreError, UserStore, check_version, stamped};
use crate::domain::{User, UserId};

const EXTENSION: &str = "json";
/// Longest stem kept verbatim; leaves room for the extension and temp-file names.
const MAX_STEM_LEN: usize = 200;

#[derive(Debug)]
pub struct FileUserStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileUserStore {
    /// Opens (and creates if needed) the data directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &UserId) -> PathBuf {
        self.root
            .join(format!("{}.{}", encode_file_stem(id.as_str()), EXTENSION))
    }

    async fn read_document(path: &Path) -> Result<Option<User>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, path: PathBuf, user: User) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(&user)?;
        let dir = self.root.clone();
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(bytes)?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

/// Keeps `[A-Za-z0-9_-]`, percent-encodes every other byte.
///
/// `~` is always encoded, so the digest form never collides with an encoded id.
fn encode_file_stem(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for byte in id.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    if out.len() > MAX_STEM_LEN {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        return format!("~{:x}", hasher.finalize());
    }
    out
}

#[async_trait]
impl UserStore for FileUserStore {
    async fn load_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Self::read_document(&self.path_for(id)).await
    }

    async fn load_by_external_ref(&self, reference: &str) -> Result<Option<User>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match Self::read_document(&path).await {
                Ok(Some(user)) if user.billing_customer_ref() == Some(reference) => {
                    return Ok(Some(user));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable user document"
                    );
                }
            }
        }
        Ok(None)
    }

    async fn insert(&self, user: &User) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(user.id());
        if tokio::fs::try_exists(&path).await? {
            return Err(StoreError::AlreadyExists(user.id().clone()));
        }
        self.write_document(path, stamped(user, INITIAL_VERSION))
            .await?;
        tracing::debug!(user_id = %user.id(), "user document created");
        Ok(INITIAL_VERSION)
    }

    async fn save(&self, user: &User) -> Result<u64, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.path_for(user.id());
        let stored = Self::read_document(&path)
            .await?
            .ok_or_else(|| StoreError::NotFound(user.id().clone()))?;
        let next = check_version(user, stored.version())?;
        self.write_document(path, stamped(user, next)).await?;
        tracing::debug!(user_id = %user.id(), version = next, "user document saved");
        Ok(next)
    }

    fn name(&self) -> &str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    #[test]
    fn test_encode_file_stem() {
        assert_eq!(encode_file_stem("user-1_a"), "user-1_a");
        assert_eq!(encode_file_stem("a/b.c"), "a%2Fb%2Ec");
        assert_eq!(encode_file_stem("../x"), "%2E%2E%2Fx");
        assert_eq!(encode_file_stem("~"), "%7E");
    }

    #[test]
    fn test_long_ids_use_digest_stem() {
        let id = "用".repeat(42);
        let stem = encode_file_stem(&id);
        assert!(stem.starts_with('~'));
        assert_eq!(stem.len(), 65);
        assert_eq!(stem, encode_file_stem(&id));
        assert_ne!(stem, encode_file_stem(&"用".repeat(41)));

        let exact = "a".repeat(MAX_STEM_LEN);
        assert_eq!(encode_file_stem(&exact), exact);
    }

    #[tokio::test]
    async fn test_longest_non_ascii_id_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = FileUserStore::open(dir.path()).unwrap();
        // 42 three-byte characters plus two ASCII bytes: exactly 128 bytes.
        let id = UserId::new(format!("{}ab", "用".repeat(42))).unwrap();
        assert_eq!(id.as_str().len(), 128);

        let user = User::new(id.clone(), "river").with_billing_customer_ref("cus_long");
        assert_eq!(store.insert(&user).await.unwrap(), 1);
        assert_matches!(
            store.insert(&user).await,
            Err(StoreError::AlreadyExists(_))
        );

        let loaded = store.load_by_id(&id).await.unwrap().unwrap();
        assert_eq!(store.save(&loaded).await.unwrap(), 2);
        let by_ref = store.load_by_external_ref("cus_long").await.unwrap();
        assert_eq!(by_ref.map(|u| u.id().clone()), Some(id));
    }

    #[tokio::test]
    async fn test_lookup_skips_foreign_documents() {
        let dir = TempDir::new().unwrap();
        let store = FileUserStore::open(dir.path()).unwrap();
        let user = User::new(UserId::new("a").unwrap(), "a").with_billing_customer_ref("cus_1");
        store.insert(&user).await.unwrap();
        std::fs::write(dir.path().join("zz-notes.json"), b"[]").unwrap();
        std::fs::write(dir.path().join("0-broken.json"), b"{not json").unwrap();

        let found = store.load_by_external_ref("cus_1").await.unwrap();
        assert_eq!(found.map(|u| u.id().as_str().to_string()), Some("a".to_string()));
        assert!(store.load_by_external_ref("cus_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_round_trip_and_conflict() {
        let dir = TempDir::new().unwrap();
        let store = FileUserStore::open(dir.path()).unwrap();
        let id = UserId::new("river@example.com").unwrap();
        store.insert(&User::new(id.clone(), "river")).await.unwrap();

        let first = store.load_by_id(&id).await.unwrap().unwrap();
        let stale = first.clone();
        assert_eq!(store.save(&first).await.unwrap(), 2);
        assert_matches!(store.save(&stale).await, Err(StoreError::Conflict { .. }));

        let reloaded = store.load_by_id(&id).await.unwrap().unwrap();
        assert_eq!(reloaded.version(), 2);
    }

    #[tokio::test]
    async fn test_missing_user_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileUserStore::open(dir.path()).unwrap();
        assert!(
            store
                .load_by_id(&UserId::new("nobody").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let dir = TempDir::new().unwrap();
        let store = FileUserStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        assert_matches!(
            store.load_by_id(&UserId::new("bad").unwrap()).await,
            Err(StoreError::Serialization(_))
        );
    }
}
