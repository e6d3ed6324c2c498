use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::applications::repo_types::Application;

/// Body of `POST /applications` and `PUT`/`PATCH /applications/:id`.
///
/// Every field is taken as raw JSON so a wrong type becomes a field-level
/// violation instead of rejecting the whole body.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    #[serde(alias = "university")]
    pub university_name: Option<Value>,
    pub degree: Option<Value>,
    pub priority: Option<Value>,
    pub number_of_semesters: Option<Value>,
    pub application_portal: Option<Value>,
    pub city: Option<Value>,
    pub country: Option<Value>,
    pub location: Option<Value>,
    pub starting_semester: Option<Value>,
    pub tuition_fees: Option<Value>,
    pub living_expenses: Option<Value>,
    pub documents_required: Option<Value>,
    pub status: Option<Value>,
    pub deadline: Option<Value>,
    pub notes: Option<Value>,

    /// Owner and id are fixed; present only so attempts can be reported.
    pub user_id: Option<Value>,
    #[serde(rename = "_id")]
    pub id: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub application: Application,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub count: usize,
    pub applications: Vec<Application>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
    pub overdue: usize,
    pub upcoming_deadlines: Vec<Application>,
}
