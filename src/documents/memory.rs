use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::documents::{
    query::DocumentFilter,
    repo::DocumentStore,
    repo_types::{Document, DocumentPatch, NewDocument},
};

#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: RwLock<HashMap<Uuid, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewDocument,
        now: OffsetDateTime,
    ) -> anyhow::Result<Document> {
        let doc = Document::from_new(Uuid::new_v4(), user_id, new, now);
        self.docs.write().await.insert(doc.id, doc.clone());
        Ok(doc)
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &DocumentFilter,
    ) -> anyhow::Result<Vec<Document>> {
        let docs = self.docs.read().await;
        Ok(filter.apply(docs.values().filter(|d| d.user_id == user_id).cloned()))
    }

    async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Document>> {
        let docs = self.docs.read().await;
        Ok(docs.get(&id).filter(|d| d.user_id == user_id).cloned())
    }

    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: DocumentPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Document>> {
        let mut docs = self.docs.write().await;
        let Some(doc) = docs.get_mut(&id).filter(|d| d.user_id == user_id) else {
            return Ok(None);
        };
        doc.apply(patch, now);
        Ok(Some(doc.clone()))
    }

    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut docs = self.docs.write().await;
        if docs.get(&id).is_some_and(|d| d.user_id == user_id) {
            docs.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let mut docs = self.docs.write().await;
        let before = docs.len();
        docs.retain(|_, d| d.user_id != user_id);
        Ok((before - docs.len()) as u64)
    }

    async fn detach_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let mut docs = self.docs.write().await;
        let changed = docs
            .values_mut()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.detach(application_id, now))
            .filter(|changed| *changed)
            .count();
        Ok(changed as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::repo_types::{fixtures::new_document, DocumentKind};

    #[tokio::test]
    async fn detach_is_scoped_to_the_owner() {
        let store = MemoryDocumentStore::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let app = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        for owner in [alice, bob] {
            let mut new = new_document("LOR", DocumentKind::Lor);
            new.related_applications = vec![app];
            store.insert(owner, new, now).await.unwrap();
        }

        assert_eq!(store.detach_application(alice, app, now).await.unwrap(), 1);
        let bobs = store
            .list_by_user(bob, &DocumentFilter::default())
            .await
            .unwrap();
        assert_eq!(bobs[0].related_applications, vec![app]);
    }
}
