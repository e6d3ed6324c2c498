use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::applications::{
    query::ApplicationFilter,
    repo::ApplicationStore,
    repo_types::{Application, ApplicationPatch, NewApplication},
};

/// In-process application store for demo mode and tests.
#[derive(Default)]
pub struct MemoryApplicationStore {
    apps: RwLock<HashMap<Uuid, Application>>,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewApplication,
        now: OffsetDateTime,
    ) -> anyhow::Result<Application> {
        let app = Application::from_new(Uuid::new_v4(), user_id, new, now);
        self.apps.write().await.insert(app.id, app.clone());
        Ok(app)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Vec<Application>> {
        let apps = self.apps.read().await;
        Ok(filter.apply(apps.values().filter(|a| a.user_id == user_id).cloned()))
    }

    async fn get_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Application>> {
        let apps = self.apps.read().await;
        Ok(apps.get(&id).filter(|a| a.user_id == user_id).cloned())
    }

    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: ApplicationPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Application>> {
        let mut apps = self.apps.write().await;
        let Some(app) = apps.get_mut(&id).filter(|a| a.user_id == user_id) else {
            return Ok(None);
        };
        app.apply(patch, now);
        Ok(Some(app.clone()))
    }

    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut apps = self.apps.write().await;
        if apps.get(&id).is_some_and(|a| a.user_id == user_id) {
            apps.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut apps = self.apps.write().await;
        let before = apps.len();
        apps.retain(|_, a| a.user_id != user_id);
        Ok((before - apps.len()) as u64)
    }
}
