use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{auth::claims::Claims, config::JwtConfig, error::ApiError, state::AppState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token expired")]
    Expired,
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid => ApiError::InvalidToken,
            TokenError::Expired => ApiError::TokenExpired,
        }
    }
}

/// Signs and verifies bearer tokens with the server-held secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            ttl: Duration::minutes(cfg.ttl_minutes),
        }
    }

    pub fn issue(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    /// Signs a token as if issued at `now`; expiry is `now + ttl`.
    pub fn issue_at(&self, user_id: Uuid, now: OffsetDateTime) -> anyhow::Result<String> {
        let exp = now + self.ttl;
        let claims = Claims {
            sub: user_id,
            iat: now.unix_timestamp().max(0) as usize,
            exp: exp.unix_timestamp().max(0) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?;
        debug!(user_id = %user_id, "jwt signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Uuid, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;
        debug!(user_id = %data.claims.sub, "jwt verified");
        Ok(data.claims.sub)
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// Authenticated caller. Extracting it validates the bearer token and
/// checks that the user still exists.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Access denied. No token provided."))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Access denied. No token provided."))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let keys = JwtKeys::from_ref(state);
        let user_id = keys.verify(token).map_err(|e| {
            warn!(error = %e, "bearer token rejected");
            ApiError::from(e)
        })?;

        if state.users.find_by_id(user_id).await?.is_none() {
            warn!(%user_id, "token for unknown user");
            return Err(ApiError::unauthorized("Token is not valid. User not found."));
        }

        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(secret: &str, issuer: &str, audience: &str) -> JwtKeys {
        JwtKeys::from_config(&JwtConfig {
            secret: secret.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl_minutes: 60 * 24 * 30,
        })
    }

    #[test]
    fn issue_and_verify() {
        let keys = keys("dev-secret", "iss", "aud");
        let user_id = Uuid::new_v4();
        let token = keys.issue(user_id).expect("sign");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn expired_token_is_distinguished() {
        let keys = keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::days(31);
        let token = keys.issue_at(Uuid::new_v4(), issued).expect("sign");
        assert_eq!(keys.verify(&token), Err(TokenError::Expired));
    }

    #[test]
    fn token_just_inside_window_is_accepted() {
        let keys = keys("dev-secret", "iss", "aud");
        let issued = OffsetDateTime::now_utc() - Duration::days(29);
        let user_id = Uuid::new_v4();
        let token = keys.issue_at(user_id, issued).expect("sign");
        assert_eq!(keys.verify(&token), Ok(user_id));
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let good = keys("secret-a", "iss", "aud");
        let bad = keys("secret-b", "iss", "aud");
        let token = good.issue(Uuid::new_v4()).unwrap();
        assert_eq!(bad.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn wrong_issuer_or_audience_is_invalid() {
        let good = keys("same", "good-iss", "good-aud");
        let token = good.issue(Uuid::new_v4()).unwrap();
        assert_eq!(
            keys("same", "bad-iss", "good-aud").verify(&token),
            Err(TokenError::Invalid)
        );
        assert_eq!(
            keys("same", "good-iss", "bad-aud").verify(&token),
            Err(TokenError::Invalid)
        );
    }

    #[test]
    fn malformed_token_is_invalid() {
        let keys = keys("dev-secret", "iss", "aud");
        assert_eq!(keys.verify("not.a.jwt"), Err(TokenError::Invalid));
        assert_eq!(keys.verify(""), Err(TokenError::Invalid));
    }
}
