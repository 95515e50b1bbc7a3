//! User persistence
//!
//! One document per user aggregate. Stores provide optimistic concurrency: every
//! document carries a version stamp, and [`UserStore::save`] only succeeds when the
//! caller's aggregate was loaded at the version currently stored.
//!
//! ```text
//! load_by_id ──► User{version: n} ──► mutate ──► save ──► Ok(n + 1)
//!                                                   └──► Err(Conflict{expected: n, found: m})
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{User, UserId};

mod file;
mod memory;

pub use file::FileUserStore;
pub use memory::InMemoryUserStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(UserId),

    #[error("user {0} already exists")]
    AlreadyExists(UserId),

    #[error("stale user document (expected version {expected}, found {found})")]
    Conflict { expected: u64, found: u64 },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("user document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// Lookup by billing customer reference.
    async fn load_by_external_ref(&self, reference: &str) -> Result<Option<User>, StoreError>;

    /// Creates a new document. Returns the stored version.
    async fn insert(&self, user: &User) -> Result<u64, StoreError>;

    /// Writes `user` if its version matches the stored one. Returns the new version.
    async fn save(&self, user: &User) -> Result<u64, StoreError>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Version stamped on a document by the first insert.
pub const INITIAL_VERSION: u64 = 1;

fn check_version(user: &User, stored: u64) -> Result<u64, StoreError> {
    if user.version() != stored {
        return Err(StoreError::Conflict {
            expected: user.version(),
            found: stored,
        });
    }
    Ok(stored + 1)
}

/// Copy of `user` stamped with `version`.
fn stamped(user: &User, version: u64) -> User {
    let mut doc = user.clone();
    doc.set_version(version);
    doc
}
