use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRef;
use rand::{rngs::OsRng, Rng};
use time::{Duration, OffsetDateTime};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    auth::{
        dto::RegisterRequest,
        password::{hash_password, verify_password, MIN_PASSWORD_LEN},
        repo::{StoreError, UserStore},
        repo_types::{NewUser, User},
    },
    error::ApiError,
    state::AppState,
    validation::{is_http_url, is_valid_email, Violations},
};

pub const NAME_MAX: usize = 50;
pub const AVATAR_MAX: usize = 500;

/// Produces a 6-digit numeric one-time code.
pub fn generate_reset_code() -> String {
    OsRng.gen_range(100_000..1_000_000u32).to_string()
}

/// Hands a reset code to the user out-of-band.
#[async_trait]
pub trait ResetCodeDelivery: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()>;
}

/// Default delivery: records issuance; the code itself only at debug level.
pub struct LogDelivery;

#[async_trait]
impl ResetCodeDelivery for LogDelivery {
    async fn deliver(&self, email: &str, code: &str) -> anyhow::Result<()> {
        info!(%email, "password reset code issued");
        debug!(%email, %code, "password reset code");
        Ok(())
    }
}

/// Identity operations on top of a [`UserStore`]: hashing, authentication, reset codes.
#[derive(Clone)]
pub struct Credentials {
    store: Arc<dyn UserStore>,
    reset_ttl: Duration,
}

impl FromRef<AppState> for Credentials {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.users.clone(),
            Duration::minutes(state.config.reset_code_ttl_minutes),
        )
    }
}

impl Credentials {
    pub fn new(store: Arc<dyn UserStore>, reset_ttl: Duration) -> Self {
        Self { store, reset_ttl }
    }

    pub async fn create(
        &self,
        email: &str,
        raw_password: &str,
        name: &str,
    ) -> Result<User, StoreError> {
        let password_hash = hash_password(raw_password)?;
        let new = NewUser {
            name: name.to_string(),
            email: email.trim().to_lowercase(),
            password_hash,
        };
        self.store.create(new, OffsetDateTime::now_utc()).await
    }

    pub async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.store.find_by_email(email.trim()).await
    }

    pub async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.store.find_by_id(id).await
    }

    /// Returns the user when the email exists and the password matches.
    pub async fn authenticate(&self, email: &str, password: &str) -> anyhow::Result<Option<User>> {
        let user = self.find_by_email(email).await?;
        let stored = user.as_ref().map(|u| u.password_hash.as_str());
        if verify_password(password, stored)? {
            Ok(user)
        } else {
            Ok(None)
        }
    }

    pub async fn check_password(&self, id: Uuid, password: &str) -> anyhow::Result<bool> {
        let user = self.store.find_by_id(id).await?;
        verify_password(password, user.as_ref().map(|u| u.password_hash.as_str()))
    }

    pub async fn generate_reset_code(
        &self,
        id: Uuid,
        now: OffsetDateTime,
    ) -> anyhow::Result<String> {
        let code = generate_reset_code();
        let expires_at = now + self.reset_ttl;
        self.store.set_reset_code(id, &code, expires_at, now).await?;
        Ok(code)
    }

    /// True only if `code` matches and `now` is strictly before the expiry.
    pub async fn verify_reset_code(
        &self,
        id: Uuid,
        code: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        let Some(user) = self.store.find_by_id(id).await? else {
            return Ok(false);
        };
        let ok = match (&user.reset_code, user.reset_expires_at) {
            (Some(stored), Some(expires_at)) => stored == code.trim() && now < expires_at,
            _ => false,
        };
        Ok(ok)
    }

    pub async fn consume_reset_code(&self, id: Uuid, now: OffsetDateTime) -> anyhow::Result<()> {
        self.store.clear_reset_code(id, now).await
    }

    /// Re-hashes and stores the password. Any pending reset code is cleared in the same write.
    pub async fn update_password(
        &self,
        id: Uuid,
        new_raw_password: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        let hash = hash_password(new_raw_password)?;
        self.store.update_password_hash(id, &hash, now).await
    }
}

pub fn check_new_password(v: &mut Violations, field: &str, password: &str) {
    if password.chars().count() < MIN_PASSWORD_LEN {
        v.push(
            field,
            format!("Password must be at least {MIN_PASSWORD_LEN} characters long"),
        );
    }
}

/// Validated registration input: (name, email, password).
pub fn validate_registration(req: &RegisterRequest) -> Result<(String, String, String), ApiError> {
    let mut v = Violations::new();
    let name = v.text("name", "Name", &req.name, NAME_MAX);
    let email = req.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        v.push("email", "Please enter a valid email");
    }
    check_new_password(&mut v, "password", &req.password);
    v.finish()?;
    Ok((name.unwrap_or_default(), email, req.password.clone()))
}

/// Validated profile changes: (name, avatar), each only if supplied.
pub fn validate_profile(
    name: Option<&str>,
    avatar: Option<&str>,
) -> Result<(Option<String>, Option<String>), ApiError> {
    let mut v = Violations::new();
    let name = name.and_then(|n| v.text("name", "Name", n, NAME_MAX));
    let avatar = match avatar.map(str::trim) {
        None => None,
        Some("") => Some(String::new()),
        Some(a) if a.chars().count() > AVATAR_MAX => {
            v.push("avatar", format!("Avatar cannot be more than {AVATAR_MAX} characters"));
            None
        }
        Some(a) if !is_http_url(a) => {
            v.push("avatar", "Avatar must be a valid URL");
            None
        }
        Some(a) => Some(a.to_string()),
    };
    v.finish()?;
    Ok((name, avatar))
}
