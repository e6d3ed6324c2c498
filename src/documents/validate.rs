use serde_json::Value;
use uuid::Uuid;

use crate::{
    documents::{
        dto::DocumentRequest,
        repo_types::{DocumentKind, DocumentPatch, DocumentStatus, NewDocument},
    },
    error::ApiError,
    validation::Violations,
};

pub const NAME_MAX: usize = 100;
pub const NOTES_MAX: usize = 1000;
pub const RELATED_MAX: usize = 50;

fn kind(v: &mut Violations, raw: &str) -> Option<DocumentKind> {
    let parsed = raw.trim().parse::<DocumentKind>().ok();
    if parsed.is_none() {
        v.push(
            "type",
            "Type must be SOP, CV, Transcript, LOR, IELTS, TOEFL, GRE, Portfolio, or Other",
        );
    }
    parsed
}

fn status(v: &mut Violations, raw: &str) -> Option<DocumentStatus> {
    let parsed = raw.trim().parse::<DocumentStatus>().ok();
    if parsed.is_none() {
        v.push("status", "Status must be Draft, Ready, or Uploaded");
    }
    parsed
}

fn notes(v: &mut Violations, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.chars().count() > NOTES_MAX {
        v.push("notes", format!("Notes cannot be more than {NOTES_MAX} characters"));
        return None;
    }
    Some(trimmed.to_string())
}

/// Application ids in first-seen order, duplicates removed. Ownership is checked by the service.
fn related(v: &mut Violations, raw: &Value) -> Option<Vec<Uuid>> {
    const FIELD: &str = "relatedApplications";
    let Value::Array(items) = raw else {
        v.push(FIELD, "Related applications must be a list of application ids");
        return None;
    };
    if items.len() > RELATED_MAX {
        v.push(
            FIELD,
            format!("At most {RELATED_MAX} applications can be linked"),
        );
        return None;
    }
    let mut out: Vec<Uuid> = Vec::with_capacity(items.len());
    let mut ok = true;
    for item in items {
        match item.as_str().and_then(|s| Uuid::parse_str(s.trim()).ok()) {
            Some(id) if !out.contains(&id) => out.push(id),
            Some(_) => {}
            None => {
                v.push(FIELD, format!("{item} is not a valid application id"));
                ok = false;
            }
        }
    }
    ok.then_some(out)
}

fn reject_identity_fields(v: &mut Violations, req: &DocumentRequest) {
    if req.user_id.is_some() {
        v.push("userId", "userId cannot be set or changed");
    }
    if req.id.is_some() {
        v.push("_id", "_id cannot be set or changed");
    }
}

pub fn validate_new(req: &DocumentRequest) -> Result<NewDocument, ApiError> {
    let mut v = Violations::new();
    reject_identity_fields(&mut v, req);

    let kind = match v.parsed("type", "Type", &req.kind, kind) {
        Some(kind) => kind,
        None => {
            v.push("type", "Type is required");
            None
        }
    };
    let name = v.required_string("name", "Name", &req.name, NAME_MAX);
    let status = v
        .parsed("status", "Status", &req.status, status)
        .unwrap_or(Some(DocumentStatus::default()));
    let related_applications = match &req.related_applications {
        Some(raw) => related(&mut v, raw),
        None => Some(Vec::new()),
    };
    let notes = v
        .parsed("notes", "Notes", &req.notes, notes)
        .unwrap_or(Some(String::new()));

    v.finish()?;

    match (kind, name, status, related_applications, notes) {
        (Some(kind), Some(name), Some(status), Some(related_applications), Some(notes)) => {
            Ok(NewDocument {
                kind,
                name,
                status,
                related_applications,
                notes,
            })
        }
        _ => Err(ApiError::internal(anyhow::anyhow!(
            "document validation accepted incomplete input"
        ))),
    }
}

pub fn validate_patch(req: &DocumentRequest) -> Result<DocumentPatch, ApiError> {
    let mut v = Violations::new();
    reject_identity_fields(&mut v, req);

    let patch = DocumentPatch {
        kind: v.parsed("type", "Type", &req.kind, kind).flatten(),
        name: v.optional_string("name", "Name", &req.name, NAME_MAX),
        status: v.parsed("status", "Status", &req.status, status).flatten(),
        related_applications: req
            .related_applications
            .as_ref()
            .and_then(|raw| related(&mut v, raw)),
        notes: v.parsed("notes", "Notes", &req.notes, notes).flatten(),
    };

    v.finish()?;
    Ok(patch)
}
