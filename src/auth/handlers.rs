use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, ForgotPasswordRequest, LoginRequest,
            RegisterRequest, ResetPasswordRequest, TokenResponse, UpdateProfileRequest,
            UserResponse,
        },
        jwt::{AuthUser, JwtKeys},
        repo::StoreError,
        services::{check_new_password, validate_profile, validate_registration, Credentials},
    },
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
    validation::Violations,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(get_me))
        .route("/auth/profile", put(update_profile))
        .route("/auth/change-password", post(change_password))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/account", delete(delete_account))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let Json(payload) = payload?;
    let (name, email, password) = validate_registration(&payload).map_err(|e| {
        warn!("registration rejected by validation");
        e
    })?;

    let creds = Credentials::from_ref(&state);
    let user = match creds.create(&email, &password, &name).await {
        Ok(u) => u,
        Err(StoreError::DuplicateEmail) => {
            warn!(email = %email, "email already registered");
            return Err(ApiError::DuplicateEmail);
        }
        Err(StoreError::Other(e)) => {
            error!(error = %e, "create user failed");
            return Err(ApiError::Internal(e));
        }
    };

    let token = JwtKeys::from_ref(&state).issue(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(ApiResponse::created(AuthResponse {
        user: user.into(),
        token,
    })
    .with_message("User registered successfully"))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<AuthResponse>> {
    let Json(payload) = payload?;
    let creds = Credentials::from_ref(&state);

    let Some(user) = creds.authenticate(&payload.email, &payload.password).await? else {
        warn!("login rejected");
        return Err(ApiError::unauthorized("Invalid credentials"));
    };

    let token = JwtKeys::from_ref(&state).issue(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(ApiResponse::ok(AuthResponse {
        user: user.into(),
        token,
    })
    .with_message("Login successful"))
}

const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account with that email exists, a password reset code has been sent";

/// Always answers 200 whether or not the email is registered.
#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    let creds = Credentials::from_ref(&state);

    if let Some(user) = creds.find_by_email(&payload.email).await? {
        let code = creds
            .generate_reset_code(user.id, OffsetDateTime::now_utc())
            .await?;
        if let Err(e) = state.reset_delivery.deliver(&user.email, &code).await {
            error!(error = %e, user_id = %user.id, "reset code delivery failed");
            creds
                .consume_reset_code(user.id, OffsetDateTime::now_utc())
                .await?;
        }
    } else {
        info!("password reset requested for unknown email");
    }

    Ok(ApiResponse::message(FORGOT_PASSWORD_MESSAGE))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    let mut v = Violations::new();
    check_new_password(&mut v, "newPassword", &payload.new_password);
    v.finish()?;

    let creds = Credentials::from_ref(&state);
    let now = OffsetDateTime::now_utc();
    let invalid = || ApiError::bad_request("Invalid or expired OTP");

    let user = creds.find_by_email(&payload.email).await?.ok_or_else(invalid)?;
    if !creds.verify_reset_code(user.id, &payload.otp, now).await? {
        warn!(user_id = %user.id, "reset code rejected");
        return Err(invalid());
    }

    creds.update_password(user.id, &payload.new_password, now).await?;
    info!(user_id = %user.id, "password reset");
    Ok(ApiResponse::message("Password reset successfully"))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<()>> {
    let Json(payload) = payload?;
    let mut v = Violations::new();
    check_new_password(&mut v, "newPassword", &payload.new_password);
    v.finish()?;

    let creds = Credentials::from_ref(&state);
    if !creds.check_password(user_id, &payload.current_password).await? {
        warn!(%user_id, "change password with wrong current password");
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    creds
        .update_password(user_id, &payload.new_password, OffsetDateTime::now_utc())
        .await?;
    info!(%user_id, "password changed");
    Ok(ApiResponse::message("Password changed successfully"))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<UserResponse>> {
    let user = Credentials::from_ref(&state)
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Token is not valid. User not found."))?;
    Ok(ApiResponse::ok(UserResponse { user: user.into() }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<UserResponse>> {
    let Json(payload) = payload?;
    let (name, avatar) = validate_profile(payload.name.as_deref(), payload.avatar.as_deref())?;

    let user = state
        .users
        .update_profile(user_id, name, avatar, OffsetDateTime::now_utc())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Token is not valid. User not found."))?;
    info!(%user_id, "profile updated");
    Ok(ApiResponse::ok(UserResponse { user: user.into() }).with_message("Profile updated"))
}

/// Tokens are stateless; the client discards its copy.
#[instrument]
pub async fn logout(AuthUser(user_id): AuthUser) -> ApiResponse<()> {
    info!(%user_id, "user logged out");
    ApiResponse::message("Logged out successfully")
}

#[instrument(skip(state))]
pub async fn refresh(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<TokenResponse>> {
    let token = JwtKeys::from_ref(&state).issue(user_id)?;
    Ok(ApiResponse::ok(TokenResponse { token }))
}

#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<ApiResponse<()>> {
    let documents = state.documents.delete_all_for_user(user_id).await?;
    let applications = state.applications.delete_all_for_user(user_id).await?;
    if !state.users.delete(user_id).await? {
        return Err(ApiError::NotFound("User"));
    }
    info!(%user_id, applications, documents, "account deleted");
    Ok(ApiResponse::message("Account deleted successfully"))
}
