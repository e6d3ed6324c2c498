use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::documents::repo_types::Document;

/// Body of `POST /documents` and `PUT`/`PATCH /documents/:id`, kept as raw
/// JSON so type errors are reported per field.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRequest {
    #[serde(rename = "type")]
    pub kind: Option<Value>,
    pub name: Option<Value>,
    pub status: Option<Value>,
    pub related_applications: Option<Value>,
    pub notes: Option<Value>,

    pub user_id: Option<Value>,
    #[serde(rename = "_id")]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document: Document,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub count: usize,
    pub documents: Vec<Document>,
}
