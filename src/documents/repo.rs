use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::documents::{
    query::DocumentFilter,
    repo_types::{Document, DocumentPatch, DocumentRow, NewDocument},
};

/// Durable document records, scoped by owner like applications.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewDocument,
        now: OffsetDateTime,
    ) -> anyhow::Result<Document>;
    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &DocumentFilter,
    ) -> anyhow::Result<Vec<Document>>;
    async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Document>>;
    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: DocumentPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Document>>;
    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64>;
    /// Removes `application_id` from every document of `user_id` that links it.
    async fn detach_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64>;
}

const DOCUMENT_COLUMNS: &str =
    "id, user_id, kind, name, status, related_applications, notes, created_at, updated_at";

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, new), fields(kind = %new.kind))]
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewDocument,
        now: OffsetDateTime,
    ) -> anyhow::Result<Document> {
        let sql = format!(
            r#"
            INSERT INTO documents (
                id, user_id, kind, name, status, related_applications, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            RETURNING {DOCUMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(new.kind.as_str())
            .bind(&new.name)
            .bind(new.status.as_str())
            .bind(&new.related_applications)
            .bind(&new.notes)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    #[instrument(skip(self))]
    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &DocumentFilter,
    ) -> anyhow::Result<Vec<Document>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = "
        ));
        qb.push_bind(user_id);
        if let Some(k) = filter.kind {
            qb.push(" AND kind = ").push_bind(k.as_str());
        }
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(s.as_str());
        }
        if let Some(app) = filter.application_id {
            qb.push(" AND ")
                .push_bind(app)
                .push(" = ANY(related_applications)");
        }
        qb.push(" ORDER BY created_at DESC, id ASC");

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Document::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<Option<Document>> {
        let sql =
            format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, DocumentRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Document::try_from).transpose()
    }

    #[instrument(skip(self, patch))]
    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: DocumentPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Document>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE documents SET updated_at = GREATEST(");
        qb.push_bind(now)
            .push(", updated_at + interval '1 microsecond')");
        if let Some(v) = patch.kind {
            qb.push(", kind = ").push_bind(v.as_str());
        }
        if let Some(v) = patch.name {
            qb.push(", name = ").push_bind(v);
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        if let Some(v) = patch.related_applications {
            qb.push(", related_applications = ").push_bind(v);
        }
        if let Some(v) = patch.notes {
            qb.push(", notes = ").push_bind(v);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(DOCUMENT_COLUMNS);

        let row = qb
            .build_query_as::<DocumentRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(Document::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM documents WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM documents WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    #[instrument(skip(self))]
    async fn detach_application(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE documents
            SET related_applications = array_remove(related_applications, $2),
                updated_at = GREATEST($3, updated_at + interval '1 microsecond')
            WHERE user_id = $1 AND $2 = ANY(related_applications)
            "#,
        )
        .bind(user_id)
        .bind(application_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }
}
