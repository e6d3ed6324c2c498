use std::collections::HashMap;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::jwt::AuthUser,
    documents::{
        dto::{DocumentListResponse, DocumentRequest, DocumentResponse},
        query::DocumentFilter,
        services::Documents,
        validate::{validate_new, validate_patch},
    },
    error::{ApiError, ApiResult},
    response::ApiResponse,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents", get(list_documents).post(create_document))
        .route(
            "/documents/:id",
            get(get_document)
                .put(update_document)
                .patch(update_document)
                .delete(delete_document),
        )
}

fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound("Document"))
}

#[instrument(skip(docs, query))]
pub async fn list_documents(
    State(docs): State<Documents>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> ApiResult<ApiResponse<DocumentListResponse>> {
    let Query(query) = query?;
    let filter = DocumentFilter::from_query(&query)?;
    let documents = docs.list_by_user(user_id, &filter).await?;
    Ok(ApiResponse::ok(DocumentListResponse {
        count: documents.len(),
        documents,
    }))
}

#[instrument(skip(docs, payload))]
pub async fn create_document(
    State(docs): State<Documents>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<DocumentResponse>> {
    let Json(payload) = payload?;
    let new = validate_new(&payload)?;
    let document = docs.create(user_id, new).await?;
    info!(%user_id, document_id = %document.id, kind = %document.kind, "document created");
    Ok(ApiResponse::created(DocumentResponse { document })
        .with_message("Document created successfully"))
}

#[instrument(skip(docs))]
pub async fn get_document(
    State(docs): State<Documents>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<DocumentResponse>> {
    let id = parse_id(&id)?;
    let document = docs.get_by_id_for_user(id, user_id).await?;
    Ok(ApiResponse::ok(DocumentResponse { document }))
}

#[instrument(skip(docs, payload))]
pub async fn update_document(
    State(docs): State<Documents>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
    payload: Result<Json<DocumentRequest>, JsonRejection>,
) -> ApiResult<ApiResponse<DocumentResponse>> {
    let id = parse_id(&id)?;
    let Json(payload) = payload?;
    let patch = validate_patch(&payload)?;
    let document = docs.update_by_id_for_user(id, user_id, patch).await?;
    info!(%user_id, document_id = %document.id, status = %document.status, "document updated");
    Ok(ApiResponse::ok(DocumentResponse { document })
        .with_message("Document updated successfully"))
}

#[instrument(skip(docs))]
pub async fn delete_document(
    State(docs): State<Documents>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    let id = parse_id(&id)?;
    docs.delete_by_id_for_user(id, user_id).await?;
    info!(%user_id, document_id = %id, "document deleted");
    Ok(ApiResponse::message("Document deleted successfully"))
}
