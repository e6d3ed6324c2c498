use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    documents::repo_types::{Document, DocumentKind, DocumentStatus},
    error::ApiError,
    validation::Violations,
};

/// List options for documents: `type`, `status` and `applicationId`. Results
/// are always newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<DocumentStatus>,
    pub application_id: Option<Uuid>,
}

impl DocumentFilter {
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ApiError> {
        let get = |key: &str| query.get(key).map(|s| s.trim()).filter(|s| !s.is_empty());
        let mut v = Violations::new();
        let mut filter = Self::default();

        if let Some(raw) = get("type") {
            filter.kind = raw.parse().ok();
            if filter.kind.is_none() {
                v.push("type", "Unknown document type");
            }
        }
        if let Some(raw) = get("status") {
            filter.status = raw.parse().ok();
            if filter.status.is_none() {
                v.push("status", "Status must be Draft, Ready, or Uploaded");
            }
        }
        if let Some(raw) = get("applicationId") {
            filter.application_id = Uuid::parse_str(raw).ok();
            if filter.application_id.is_none() {
                v.push("applicationId", "applicationId must be a valid id");
            }
        }

        v.finish()?;
        Ok(filter)
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.kind.map_or(true, |k| doc.kind == k)
            && self.status.map_or(true, |s| doc.status == s)
            && self
                .application_id
                .map_or(true, |id| doc.related_applications.contains(&id))
    }

    /// Filters, then orders by `createdAt` descending with id as tie-break.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(d)).collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::repo_types::fixtures::new_document;
    use time::{macros::datetime, Duration};

    fn q(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn filters_by_type_and_linked_application() {
        let app = Uuid::new_v4();
        let base = datetime!(2024-01-01 0:00 UTC);
        let mut linked = new_document("SOP for TUM", DocumentKind::Sop);
        linked.related_applications = vec![app];
        let docs = vec![
            Document::from_new(Uuid::new_v4(), Uuid::nil(), linked, base),
            Document::from_new(
                Uuid::new_v4(),
                Uuid::nil(),
                new_document("Generic SOP", DocumentKind::Sop),
                base + Duration::minutes(1),
            ),
            Document::from_new(
                Uuid::new_v4(),
                Uuid::nil(),
                new_document("CV", DocumentKind::Cv),
                base + Duration::minutes(2),
            ),
        ];

        let sops = DocumentFilter::from_query(&q(&[("type", "SOP")]))
            .unwrap()
            .apply(docs.clone());
        let names: Vec<_> = sops.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Generic SOP", "SOP for TUM"]);

        let app_id = app.to_string();
        let for_app = DocumentFilter::from_query(&q(&[("applicationId", app_id.as_str())]))
            .unwrap()
            .apply(docs);
        assert_eq!(for_app.len(), 1);
        assert_eq!(for_app[0].name, "SOP for TUM");
    }

    #[test]
    fn bad_options_are_rejected_and_unknown_ignored() {
        assert!(DocumentFilter::from_query(&q(&[("type", "Essay")])).is_err());
        assert!(DocumentFilter::from_query(&q(&[("applicationId", "nope")])).is_err());
        assert_eq!(
            DocumentFilter::from_query(&q(&[("page", "2")])).unwrap(),
            DocumentFilter::default()
        );
    }
}
