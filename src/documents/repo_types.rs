use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::applications::repo_types::next_updated_at;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "SOP")]
    Sop,
    #[serde(rename = "CV")]
    Cv,
    Transcript,
    #[serde(rename = "LOR")]
    Lor,
    #[serde(rename = "IELTS")]
    Ielts,
    #[serde(rename = "TOEFL")]
    Toefl,
    #[serde(rename = "GRE")]
    Gre,
    Portfolio,
    Other,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 9] = [
        DocumentKind::Sop,
        DocumentKind::Cv,
        DocumentKind::Transcript,
        DocumentKind::Lor,
        DocumentKind::Ielts,
        DocumentKind::Toefl,
        DocumentKind::Gre,
        DocumentKind::Portfolio,
        DocumentKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Sop => "SOP",
            DocumentKind::Cv => "CV",
            DocumentKind::Transcript => "Transcript",
            DocumentKind::Lor => "LOR",
            DocumentKind::Ielts => "IELTS",
            DocumentKind::Toefl => "TOEFL",
            DocumentKind::Gre => "GRE",
            DocumentKind::Portfolio => "Portfolio",
            DocumentKind::Other => "Other",
        }
    }
}

impl FromStr for DocumentKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Draft -> Ready -> Uploaded; any state may be set by an explicit edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    #[default]
    Draft,
    Ready,
    Uploaded,
}

impl DocumentStatus {
    pub const ALL: [DocumentStatus; 3] = [
        DocumentStatus::Draft,
        DocumentStatus::Ready,
        DocumentStatus::Uploaded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentStatus::Draft => "Draft",
            DocumentStatus::Ready => "Ready",
            DocumentStatus::Uploaded => "Uploaded",
        }
    }
}

impl FromStr for DocumentStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocumentStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supporting document (SOP, transcript, test score...) owned by one user,
/// optionally linked to some of that user's applications.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub name: String,
    pub status: DocumentStatus,
    pub related_applications: Vec<Uuid>,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub name: String,
    pub status: DocumentStatus,
    pub related_applications: Vec<Uuid>,
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentPatch {
    pub kind: Option<DocumentKind>,
    pub name: Option<String>,
    pub status: Option<DocumentStatus>,
    pub related_applications: Option<Vec<Uuid>>,
    pub notes: Option<String>,
}

impl Document {
    pub fn from_new(id: Uuid, user_id: Uuid, new: NewDocument, now: OffsetDateTime) -> Self {
        Self {
            id,
            user_id,
            kind: new.kind,
            name: new.name,
            status: new.status,
            related_applications: new.related_applications,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: DocumentPatch, now: OffsetDateTime) {
        if let Some(v) = patch.kind {
            self.kind = v;
        }
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.related_applications {
            self.related_applications = v;
        }
        if let Some(v) = patch.notes {
            self.notes = v;
        }
        self.updated_at = next_updated_at(self.updated_at, now);
    }

    /// Drops a link to a removed application. Returns whether anything changed.
    pub fn detach(&mut self, application_id: Uuid, now: OffsetDateTime) -> bool {
        let before = self.related_applications.len();
        self.related_applications.retain(|id| *id != application_id);
        if self.related_applications.len() == before {
            return false;
        }
        self.updated_at = next_updated_at(self.updated_at, now);
        true
    }
}

#[derive(Debug, FromRow)]
pub struct DocumentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub name: String,
    pub status: String,
    pub related_applications: Vec<Uuid>,
    pub notes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<DocumentRow> for Document {
    type Error = anyhow::Error;

    fn try_from(r: DocumentRow) -> Result<Self, Self::Error> {
        let kind = r
            .kind
            .parse::<DocumentKind>()
            .map_err(|_| anyhow::anyhow!("unknown document type {:?} in row {}", r.kind, r.id))?;
        let status = r
            .status
            .parse::<DocumentStatus>()
            .map_err(|_| anyhow::anyhow!("unknown document status {:?} in row {}", r.status, r.id))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            kind,
            name: r.name,
            status,
            related_applications: r.related_applications,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn new_document(name: &str, kind: DocumentKind) -> NewDocument {
        NewDocument {
            kind,
            name: name.into(),
            status: DocumentStatus::Draft,
            related_applications: Vec::new(),
            notes: String::new(),
        }
    }
}
