use std::sync::Arc;

use axum::extract::FromRef;
use uuid::Uuid;

use crate::{
    applications::{repo::ApplicationStore, repo_types::now_micros},
    documents::{
        query::DocumentFilter,
        repo::DocumentStore,
        repo_types::{Document, DocumentPatch, NewDocument},
    },
    error::{ApiError, ApiResult},
    state::AppState,
    validation::Violations,
};

/// Owner-scoped document operations. Linked applications must belong to the same owner.
#[derive(Clone)]
pub struct Documents {
    store: Arc<dyn DocumentStore>,
    applications: Arc<dyn ApplicationStore>,
}

impl FromRef<AppState> for Documents {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.documents.clone(), state.applications.clone())
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Document")
}

impl Documents {
    pub fn new(store: Arc<dyn DocumentStore>, applications: Arc<dyn ApplicationStore>) -> Self {
        Self {
            store,
            applications,
        }
    }

    /// Foreign and missing application ids are reported alike.
    async fn check_links(&self, user_id: Uuid, ids: &[Uuid]) -> ApiResult<()> {
        let mut v = Violations::new();
        for id in ids {
            if self
                .applications
                .get_by_id_for_user(*id, user_id)
                .await?
                .is_none()
            {
                v.push("relatedApplications", format!("Unknown application {id}"));
            }
        }
        v.finish()
    }

    pub async fn create(&self, user_id: Uuid, new: NewDocument) -> ApiResult<Document> {
        self.check_links(user_id, &new.related_applications).await?;
        Ok(self.store.insert(user_id, new, now_micros()).await?)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &DocumentFilter,
    ) -> ApiResult<Vec<Document>> {
        Ok(self.store.list_by_user(user_id, filter).await?)
    }

    pub async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<Document> {
        self.store
            .get_by_id_for_user(id, user_id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: DocumentPatch,
    ) -> ApiResult<Document> {
        if let Some(ids) = &patch.related_applications {
            self.check_links(user_id, ids).await?;
        }
        self.store
            .update_by_id_for_user(id, user_id, patch, now_micros())
            .await?
            .ok_or_else(not_found)
    }

    pub async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        if self.store.delete_by_id_for_user(id, user_id).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        applications::{memory::MemoryApplicationStore, repo_types::fixtures::new_application},
        documents::{
            memory::MemoryDocumentStore,
            repo_types::{fixtures::new_document, DocumentKind, DocumentStatus},
        },
    };

    fn service() -> (Documents, Arc<dyn ApplicationStore>) {
        let apps: Arc<dyn ApplicationStore> = Arc::new(MemoryApplicationStore::new());
        (
            Documents::new(Arc::new(MemoryDocumentStore::new()), apps.clone()),
            apps,
        )
    }

    fn fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn links_must_name_the_callers_applications() {
        let (svc, apps) = service();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let mine = apps
            .insert(alice, new_application("TUM"), now_micros())
            .await
            .unwrap();
        let theirs = apps
            .insert(bob, new_application("ETH"), now_micros())
            .await
            .unwrap();

        let mut new = new_document("SOP", DocumentKind::Sop);
        new.related_applications = vec![mine.id, theirs.id, Uuid::new_v4()];
        let errs = fields(svc.create(alice, new).await.unwrap_err());
        assert_eq!(errs, vec!["relatedApplications", "relatedApplications"]);

        let mut new = new_document("SOP", DocumentKind::Sop);
        new.related_applications = vec![mine.id];
        let doc = svc.create(alice, new).await.unwrap();
        assert_eq!(doc.related_applications, vec![mine.id]);

        let relink = DocumentPatch {
            related_applications: Some(vec![theirs.id]),
            ..Default::default()
        };
        assert!(svc.update_by_id_for_user(doc.id, alice, relink).await.is_err());
    }

    #[tokio::test]
    async fn foreign_documents_read_as_missing() {
        let (svc, _) = service();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let doc = svc
            .create(alice, new_document("CV", DocumentKind::Cv))
            .await
            .unwrap();

        let err = svc.get_by_id_for_user(doc.id, bob).await.unwrap_err();
        assert_eq!(err.to_string(), "Document not found");
        let patch = DocumentPatch {
            status: Some(DocumentStatus::Ready),
            ..Default::default()
        };
        assert!(svc.update_by_id_for_user(doc.id, bob, patch).await.is_err());
        assert!(svc.delete_by_id_for_user(doc.id, bob).await.is_err());
        assert!(svc.delete_by_id_for_user(doc.id, alice).await.is_ok());
    }
}
