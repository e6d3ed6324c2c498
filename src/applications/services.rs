use std::{collections::BTreeMap, sync::Arc};

use axum::extract::FromRef;
use time::{Date, Duration};
use uuid::Uuid;

use crate::{
    applications::{
        dto::StatsResponse,
        query::{ApplicationFilter, SortField, SortOrder},
        repo::ApplicationStore,
        repo_types::{now_micros, Application, ApplicationPatch, NewApplication, Status},
    },
    documents::repo::DocumentStore,
    error::{ApiError, ApiResult},
    state::AppState,
    validation::Violations,
};

pub const DEFAULT_STATS_DAYS: i64 = 7;
pub const MAX_STATS_DAYS: i64 = 365;

/// Owner-scoped application operations. Missing and foreign records both surface as 404.
#[derive(Clone)]
pub struct Applications {
    store: Arc<dyn ApplicationStore>,
    documents: Arc<dyn DocumentStore>,
}

impl FromRef<AppState> for Applications {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.applications.clone(), state.documents.clone())
    }
}

fn not_found() -> ApiError {
    ApiError::NotFound("Application")
}

impl Applications {
    pub fn new(store: Arc<dyn ApplicationStore>, documents: Arc<dyn DocumentStore>) -> Self {
        Self { store, documents }
    }

    pub async fn create(&self, user_id: Uuid, new: NewApplication) -> ApiResult<Application> {
        Ok(self.store.insert(user_id, new, now_micros()).await?)
    }

    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &ApplicationFilter,
    ) -> ApiResult<Vec<Application>> {
        Ok(self.store.list_by_user(user_id, filter).await?)
    }

    pub async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<Application> {
        self.store
            .get_by_id_for_user(id, user_id)
            .await?
            .ok_or_else(not_found)
    }

    pub async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: ApplicationPatch,
    ) -> ApiResult<Application> {
        self.store
            .update_by_id_for_user(id, user_id, patch, now_micros())
            .await?
            .ok_or_else(not_found)
    }

    /// Unlinks the application from the owner's documents first, so a failed
    /// delete can simply be retried.
    pub async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> ApiResult<()> {
        self.get_by_id_for_user(id, user_id).await?;
        self.documents
            .detach_application(user_id, id, now_micros())
            .await?;
        if self.store.delete_by_id_for_user(id, user_id).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    /// Dashboard summary relative to `today`. Overdue counts only Draft and In Progress records.
    pub async fn stats(
        &self,
        user_id: Uuid,
        days: Option<i64>,
        today: Date,
    ) -> ApiResult<StatsResponse> {
        let days = days.unwrap_or(DEFAULT_STATS_DAYS);
        if !(1..=MAX_STATS_DAYS).contains(&days) {
            let mut v = Violations::new();
            v.push("days", format!("days must be between 1 and {MAX_STATS_DAYS}"));
            v.finish()?;
        }

        let filter = ApplicationFilter {
            sort_by: SortField::Deadline,
            sort_order: SortOrder::Asc,
            ..Default::default()
        };
        let apps = self.store.list_by_user(user_id, &filter).await?;

        let mut by_status: BTreeMap<&'static str, usize> =
            Status::ALL.into_iter().map(|s| (s.as_str(), 0)).collect();
        for app in &apps {
            *by_status.entry(app.status.as_str()).or_default() += 1;
        }

        let overdue = apps
            .iter()
            .filter(|a| a.status.is_open() && a.deadline < today)
            .count();
        let horizon = today.saturating_add(Duration::days(days));
        let total = apps.len();
        let upcoming_deadlines = apps
            .into_iter()
            .filter(|a| a.deadline >= today && a.deadline <= horizon)
            .collect();

        Ok(StatsResponse {
            total,
            by_status,
            overdue,
            upcoming_deadlines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        applications::{memory::MemoryApplicationStore, repo_types::fixtures::new_application},
        documents::{
            memory::MemoryDocumentStore,
            query::DocumentFilter,
            repo_types::{fixtures::new_document, DocumentKind},
        },
    };
    use time::macros::date;

    fn service() -> Applications {
        Applications::new(
            Arc::new(MemoryApplicationStore::new()),
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    #[tokio::test]
    async fn foreign_and_missing_records_are_both_not_found() {
        let svc = service();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let app = svc.create(alice, new_application("TUM")).await.unwrap();

        let foreign = svc.get_by_id_for_user(app.id, bob).await.unwrap_err();
        let missing = svc.get_by_id_for_user(Uuid::new_v4(), alice).await.unwrap_err();
        assert_eq!(foreign.to_string(), "Application not found");
        assert_eq!(missing.to_string(), foreign.to_string());
        assert!(svc.delete_by_id_for_user(app.id, bob).await.is_err());
    }

    #[tokio::test]
    async fn create_stamps_equal_timestamps_and_update_advances() {
        let svc = service();
        let user = Uuid::new_v4();
        let app = svc.create(user, new_application("ETH")).await.unwrap();
        assert_eq!(app.created_at, app.updated_at);
        assert_eq!(app.user_id, user);

        let mut prev = app.updated_at;
        for status in [Status::InProgress, Status::Submitted, Status::Accepted] {
            let patch = ApplicationPatch {
                status: Some(status),
                ..Default::default()
            };
            let updated = svc.update_by_id_for_user(app.id, user, patch).await.unwrap();
            assert!(updated.updated_at > prev);
            assert_eq!(updated.created_at, app.created_at);
            assert_eq!(updated.status, status);
            prev = updated.updated_at;
        }
    }

    #[tokio::test]
    async fn stats_counts_and_windows() {
        let svc = service();
        let user = Uuid::new_v4();
        let today = date!(2025 - 01 - 10);
        for (deadline, status) in [
            (date!(2025 - 01 - 05), Status::Draft),
            (date!(2025 - 01 - 06), Status::Submitted),
            (date!(2025 - 01 - 17), Status::InProgress),
            (date!(2025 - 01 - 10), Status::Draft),
            (date!(2025 - 01 - 18), Status::Draft),
        ] {
            let mut new = new_application("U");
            new.deadline = deadline;
            new.status = status;
            svc.create(user, new).await.unwrap();
        }

        let stats = svc.stats(user, None, today).await.unwrap();
        assert_eq!(stats.total, 5);
        assert_eq!(stats.by_status["Draft"], 3);
        assert_eq!(stats.by_status["Accepted"], 0);
        assert_eq!(stats.overdue, 1);
        let upcoming: Vec<_> = stats.upcoming_deadlines.iter().map(|a| a.deadline).collect();
        assert_eq!(upcoming, vec![date!(2025 - 01 - 10), date!(2025 - 01 - 17)]);
    }

    #[tokio::test]
    async fn deleting_an_application_unlinks_its_documents() {
        let docs = Arc::new(MemoryDocumentStore::new());
        let svc = Applications::new(Arc::new(MemoryApplicationStore::new()), docs.clone());
        let user = Uuid::new_v4();
        let (tum, eth) = (
            svc.create(user, new_application("TUM")).await.unwrap(),
            svc.create(user, new_application("ETH")).await.unwrap(),
        );
        let mut sop = new_document("SOP", DocumentKind::Sop);
        sop.related_applications = vec![tum.id, eth.id];
        let sop = docs.insert(user, sop, now_micros()).await.unwrap();

        svc.delete_by_id_for_user(tum.id, user).await.unwrap();

        let left = docs
            .list_by_user(user, &DocumentFilter::default())
            .await
            .unwrap();
        assert_eq!(left[0].related_applications, vec![eth.id]);
        assert!(left[0].updated_at > sop.updated_at);
    }

    #[tokio::test]
    async fn stats_rejects_out_of_range_window() {
        let svc = service();
        let today = date!(2025 - 01 - 10);
        assert!(svc.stats(Uuid::new_v4(), Some(0), today).await.is_err());
        assert!(svc.stats(Uuid::new_v4(), Some(366), today).await.is_err());
        assert!(svc.stats(Uuid::new_v4(), Some(365), today).await.is_ok());
    }
}
