use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable identity records. Email lookups are case-insensitive.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, new: NewUser, now: OffsetDateTime) -> Result<User, StoreError>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>>;
    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()>;
    async fn clear_reset_code(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<()>;
    /// Also clears any pending reset code.
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<()>;
    /// Returns `false` when no such user existed.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar, reset_code, \
                            reset_expires_at, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    #[instrument(skip(self, new), fields(email = %new.email))]
    async fn create(&self, new: NewUser, now: OffsetDateTime) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (id, name, email, password_hash, created_at, updated_at) \
             VALUES ($1, $2, lower($3), $4, $5, $5) \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.password_hash)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e.as_database_error() {
                Some(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
                _ => StoreError::Other(anyhow::Error::new(e).context("insert user")),
            })
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, name, avatar))]
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        avatar: Option<String>,
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<User>> {
        let sql = format!(
            "UPDATE users \
             SET name = COALESCE($2, name), avatar = COALESCE($3, avatar), updated_at = $4 \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(name)
            .bind(avatar)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, code))]
    async fn set_reset_code(
        &self,
        id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = $2, reset_expires_at = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(expires_at)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_reset_code(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_code = NULL, reset_expires_at = NULL, updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, reset_code = NULL, reset_expires_at = NULL, updated_at = $3
            WHERE id = $1
            "#,
        )
            .bind(id)
            .bind(password_hash)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
