//! In-memory store for tests and ephemeral runs.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{INITIAL_VERSION, StoreError, UserStore, check_version, stamped};
use crate::domain::{User, UserId};

#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.read().is_empty()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn load_by_id(&self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().get(id).cloned())
    }

    async fn load_by_external_ref(&self, reference: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .users
            .read()
            .values()
            .find(|user| user.billing_customer_ref() == Some(reference))
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<u64, StoreError> {
        let mut users = self.users.write();
        if users.contains_key(user.id()) {
            return Err(StoreError::AlreadyExists(user.id().clone()));
        }
        users.insert(user.id().clone(), stamped(user, INITIAL_VERSION));
        Ok(INITIAL_VERSION)
    }

    async fn save(&self, user: &User) -> Result<u64, StoreError> {
        let mut users = self.users.write();
        let stored = users
            .get(user.id())
            .ok_or_else(|| StoreError::NotFound(user.id().clone()))?;
        let next = check_version(user, stored.version())?;
        users.insert(user.id().clone(), stamped(user, next));
        Ok(next)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn user(id: &str) -> User {
        User::new(UserId::new(id).unwrap(), "river")
    }

    #[tokio::test]
    async fn test_insert_then_load() {
        let store = InMemoryUserStore::new();
        assert_eq!(store.insert(&user("a")).await.unwrap(), INITIAL_VERSION);
        let loaded = store
            .load_by_id(&UserId::new("a").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.version(), INITIAL_VERSION);
        assert_matches!(
            store.insert(&user("a")).await,
            Err(StoreError::AlreadyExists(_))
        );
    }

    #[tokio::test]
    async fn test_stale_save_conflicts() {
        let store = InMemoryUserStore::new();
        store.insert(&user("a")).await.unwrap();
        let id = UserId::new("a").unwrap();

        let first = store.load_by_id(&id).await.unwrap().unwrap();
        let second = store.load_by_id(&id).await.unwrap().unwrap();

        assert_eq!(store.save(&first).await.unwrap(), 2);
        assert_matches!(
            store.save(&second).await,
            Err(StoreError::Conflict {
                expected: 1,
                found: 2
            })
        );
    }

    #[tokio::test]
    async fn test_save_unknown_user() {
        let store = InMemoryUserStore::new();
        assert_matches!(store.save(&user("ghost")).await, Err(StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_by_external_ref() {
        let store = InMemoryUserStore::new();
        store
            .insert(&user("a").with_billing_customer_ref("cus_123"))
            .await
            .unwrap();
        store.insert(&user("b")).await.unwrap();
        let found = store.load_by_external_ref("cus_123").await.unwrap().unwrap();
        assert_eq!(found.id().as_str(), "a");
        assert!(store.load_by_external_ref("cus_999").await.unwrap().is_none());
    }
}
