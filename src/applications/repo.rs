use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::applications::{
    query::{like_pattern, ApplicationFilter},
    repo_types::{Application, ApplicationPatch, ApplicationRow, NewApplication},
};

/// Durable application records. Every lookup is scoped by owner; a record
/// belonging to someone else is indistinguishable from a missing one.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewApplication,
        now: OffsetDateTime,
    ) -> anyhow::Result<Application>;
    async fn list_by_user(
        &self,
        user_id: Uuid,
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Vec<Application>>;
    async fn get_by_id_for_user(&self, id: Uuid, user_id: Uuid)
        -> anyhow::Result<Option<Application>>;
    /// Atomic per record; `updated_at` always moves strictly forward.
    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: ApplicationPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Application>>;
    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;
    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64>;
}

const APPLICATION_COLUMNS: &str = "id, user_id, university_name, degree, priority, \
     number_of_semesters, application_portal, city, country, location, starting_semester, \
     tuition_fees, living_expenses, documents_required, status, deadline, notes, \
     created_at, updated_at";

fn into_applications(rows: Vec<ApplicationRow>) -> anyhow::Result<Vec<Application>> {
    rows.into_iter().map(Application::try_from).collect()
}

#[derive(Clone)]
pub struct PgApplicationStore {
    pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    #[instrument(skip(self, new), fields(university = %new.university_name))]
    async fn insert(
        &self,
        user_id: Uuid,
        new: NewApplication,
        now: OffsetDateTime,
    ) -> anyhow::Result<Application> {
        let sql = format!(
            r#"
            INSERT INTO applications (
                id, user_id, university_name, degree, priority, number_of_semesters,
                application_portal, city, country, location, starting_semester,
                tuition_fees, living_expenses, documents_required, status, deadline, notes,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            RETURNING {APPLICATION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(&new.university_name)
            .bind(&new.degree)
            .bind(new.priority.as_str())
            .bind(new.number_of_semesters)
            .bind(&new.application_portal)
            .bind(&new.city)
            .bind(&new.country)
            .bind(&new.location)
            .bind(&new.starting_semester)
            .bind(new.tuition_fees)
            .bind(new.living_expenses)
            .bind(&new.documents_required)
            .bind(new.status.as_str())
            .bind(new.deadline)
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
        filter: &ApplicationFilter,
    ) -> anyhow::Result<Vec<Application>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {APPLICATION_COLUMNS} FROM applications WHERE user_id = "
        ));
        qb.push_bind(user_id);

        if let Some(p) = filter.priority {
            qb.push(" AND priority = ").push_bind(p.as_str());
        }
        if let Some(s) = filter.status {
            qb.push(" AND status = ").push_bind(s.as_str());
        }
        if let Some(c) = &filter.country {
            qb.push(" AND country ILIKE ").push_bind(like_pattern(c));
        }
        if let Some(s) = &filter.starting_semester {
            qb.push(" AND starting_semester ILIKE ")
                .push_bind(like_pattern(s));
        }
        if let Some(d) = filter.deadline_from {
            qb.push(" AND deadline >= ").push_bind(d);
        }
        if let Some(d) = filter.deadline_to {
            qb.push(" AND deadline <= ").push_bind(d);
        }

        qb.push(" ORDER BY ")
            .push(filter.sort_by.sql())
            .push(" ")
            .push(filter.sort_order.sql())
            .push(", created_at DESC, id ASC");

        let rows = qb
            .build_query_as::<ApplicationRow>()
            .fetch_all(&self.pool)
            .await?;
        into_applications(rows)
    }

    #[instrument(skip(self))]
    async fn get_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<Option<Application>> {
        let sql =
            format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = $1 AND user_id = $2");
        let row = sqlx::query_as::<_, ApplicationRow>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Application::try_from).transpose()
    }

    #[instrument(skip(self, patch))]
    async fn update_by_id_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: ApplicationPatch,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Application>> {
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE applications SET updated_at = GREATEST(");
        qb.push_bind(now)
            .push(", updated_at + interval '1 microsecond')");

        if let Some(v) = patch.university_name {
            qb.push(", university_name = ").push_bind(v);
        }
        if let Some(v) = patch.degree {
            qb.push(", degree = ").push_bind(v);
        }
        if let Some(v) = patch.priority {
            qb.push(", priority = ").push_bind(v.as_str());
        }
        if let Some(v) = patch.number_of_semesters {
            qb.push(", number_of_semesters = ").push_bind(v);
        }
        if let Some(v) = patch.application_portal {
            qb.push(", application_portal = ").push_bind(v);
        }
        if let Some(v) = patch.city {
            qb.push(", city = ").push_bind(v);
        }
        if let Some(v) = patch.country {
            qb.push(", country = ").push_bind(v);
        }
        if let Some(v) = patch.location {
            qb.push(", location = ").push_bind(v);
        }
        if let Some(v) = patch.starting_semester {
            qb.push(", starting_semester = ").push_bind(v);
        }
        if let Some(v) = patch.tuition_fees {
            qb.push(", tuition_fees = ").push_bind(v);
        }
        if let Some(v) = patch.living_expenses {
            qb.push(", living_expenses = ").push_bind(v);
        }
        if let Some(v) = patch.documents_required {
            qb.push(", documents_required = ").push_bind(v);
        }
        if let Some(v) = patch.status {
            qb.push(", status = ").push_bind(v.as_str());
        }
        if let Some(v) = patch.deadline {
            qb.push(", deadline = ").push_bind(v);
        }
        if let Some(v) = patch.notes {
            qb.push(", notes = ").push_bind(v);
        }

        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(user_id)
            .push(" RETURNING ")
            .push(APPLICATION_COLUMNS);

        let row = qb
            .build_query_as::<ApplicationRow>()
            .fetch_optional(&self.pool)
            .await?;
        row.map(Application::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_by_id_for_user(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM applications WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_all_for_user(&self, user_id: Uuid) -> anyhow::Result<u64> {
        let res = sqlx::query("DELETE FROM applications WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}
