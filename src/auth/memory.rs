use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo::{StoreError, UserStore};
use crate::auth::repo_types::{NewUser, User};

/// In-process user store for demo mode and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser, now: OffsetDateTime) -> Result<User, StoreError> {
        let email = new.email.to_lowercase();
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::DuplicateEmail);
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email,
            password_hash: new.password_hash,
            avatar: String::new(),
            reset_code: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let email = email.to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.write().await;
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name;
        }
        if let Some(avatar) = avatar {
            user.avatar = avatar;
        }
        user.updated_at = now;
        Ok(Some(user.clone()))
    }

    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.reset_code = Some(code.to_string());
            user.reset_expires_at = Some(expires_at);
            user.updated_at = now;
        }
        Ok(())
    }

    async fn clear_reset_code(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.reset_code = None;
            user.reset_expires_at = None;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.reset_code = None;
            user.reset_expires_at = None;
            user.updated_at = now;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada".into(),
            email: email.into(),
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn email_uniqueness_is_case_insensitive() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        store.create(new_user("Ada@Example.com"), now).await.unwrap();
        let err = store
            .create(new_user("ada@example.COM"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail));
    }

    #[tokio::test]
    async fn lookup_by_email_ignores_case() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        let created = store.create(new_user("grace@example.com"), now).await.unwrap();
        let found = store
            .find_by_email("GRACE@example.com")
            .await
            .unwrap()
            .expect("user should be found");
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn delete_reports_absence() {
        let store = MemoryUserStore::new();
        let now = OffsetDateTime::now_utc();
        let user = store.create(new_user("x@example.com"), now).await.unwrap();
        assert!(store.delete(user.id).await.unwrap());
        assert!(!store.delete(user.id).await.unwrap());
        assert!(store.find_by_id(user.id).await.unwrap().is_none());
    }
}
