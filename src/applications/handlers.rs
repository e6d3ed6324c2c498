use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{get, post, put},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    applications::{
        dto::{
            ApplicationListResponse, ApplicationRequest, ApplicationResponse, StatsQuery,
            StatsResponse,
        },
        query::ApplicationFilter,
        services::Applications,
        validate::{validate_new, validate_patch},
    },
    auth::jwt::AuthUser,
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications))
        .route("/applications/stats", get(stats))
        .route("/applications/:id", get(get_application))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/applications", post(create_application))
        .route(
            "/applications/:id",
            put(update_application)
                .patch(update_application)
                .delete(delete_application),
        )
}

/// Ids that do not parse cannot name any record, so they read as missing.
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Application"))
}

#[instrument(skip(apps, query))]
pub async fn list_applications(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<ApiResponse<ApplicationListResponse>> {
    let Query(query) = query?;
    let filter = ApplicationFilter::from_query(&query)?;
    let applications = apps.list_by_user(user_id, &filter).await?;
    Ok(ApiResponse::ok(ApplicationListResponse {
        count: applications.len(),
        applications,
    }))
}

#[instrument(skip(apps, payload))]
pub async fn create_application(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<ApplicationRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<ApplicationResponse>> {
    let Json(payload) = payload?;
    let new = validate_new(&payload)?;
    let application = apps.create(user_id, new).await?;
    info!(%user_id, application_id = %application.id, "application created");
    Ok(ApiResponse::created(ApplicationResponse { application })
        .with_message("Application created successfully"))
}

#[instrument(skip(apps))]
pub async fn get_application(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<ApplicationResponse>> {
    let id = parse_id(&id)?;
    let application = apps.get_by_id_for_user(id, user_id).await?;
    Ok(ApiResponse::ok(ApplicationResponse { application }))
}

#[instrument(skip(apps, payload))]
pub async fn update_application(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<ApplicationRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<ApplicationResponse>> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let patch = validate_patch(&payload)?;
    let application = apps.update_by_id_for_user(id, user_id, patch).await?;
    info!(%user_id, application_id = %application.id, status = %application.status, "application updated");
    Ok(ApiResponse::ok(ApplicationResponse { application })
        .with_message("Application updated successfully"))
}

#[instrument(skip(apps))]
pub async fn delete_application(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = parse_id(&id)?;
    apps.delete_by_id_for_user(id, user_id).await?;
    info!(%user_id, application_id = %id, "application deleted");
    Ok(ApiResponse::message("Application deleted successfully"))
}

#[instrument(skip(apps, query))]
pub async fn stats(
    State(apps): State<Applications>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<StatsQuery>, QueryRejection>,
) -> ApiResult<ApiResponse<StatsResponse>> {
    let Query(query) = query?;
    let today = OffsetDateTime::now_utc().date();
    let stats = apps.stats(user_id, query.days, today).await?;
    Ok(ApiResponse::ok(stats))
}
