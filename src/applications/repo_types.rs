use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        }
    }

    /// Sort weight: Low < Medium < High.
    pub fn rank(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }
}

impl FromStr for Priority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or(())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory lifecycle: Draft -> In Progress -> Submitted -> Accepted | Rejected.
/// Any state may be set by an explicit edit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Draft,
    #[serde(rename = "In Progress")]
    InProgress,
    Submitted,
    Accepted,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Draft,
        Status::InProgress,
        Status::Submitted,
        Status::Accepted,
        Status::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Draft => "Draft",
            Status::InProgress => "In Progress",
            Status::Submitted => "Submitted",
            Status::Accepted => "Accepted",
            Status::Rejected => "Rejected",
        }
    }

    /// Still being worked on by the applicant.
    pub fn is_open(self) -> bool {
        matches!(self, Status::Draft | Status::InProgress)
    }
}

impl FromStr for Status {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL.into_iter().find(|st| st.as_str() == s).ok_or(())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked program application, owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user_id: Uuid,
    pub university_name: String,
    pub degree: String,
    pub priority: Priority,
    pub number_of_semesters: i32,
    pub application_portal: String,
    pub city: String,
    pub country: String,
    pub location: String,
    pub starting_semester: String,
    pub tuition_fees: f64,
    pub living_expenses: f64,
    pub documents_required: Vec<String>,
    pub status: Status,
    #[serde(with = "iso_date")]
    pub deadline: Date,
    pub notes: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Validated fields for a new record; owner and timestamps are stamped by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub university_name: String,
    pub degree: String,
    pub priority: Priority,
    pub number_of_semesters: i32,
    pub application_portal: String,
    pub city: String,
    pub country: String,
    pub location: String,
    pub starting_semester: String,
    pub tuition_fees: f64,
    pub living_expenses: f64,
    pub documents_required: Vec<String>,
    pub status: Status,
    pub deadline: Date,
    pub notes: String,
}

/// Validated partial update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationPatch {
    pub university_name: Option<String>,
    pub degree: Option<String>,
    pub priority: Option<Priority>,
    pub number_of_semesters: Option<i32>,
    pub application_portal: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub starting_semester: Option<String>,
    pub tuition_fees: Option<f64>,
    pub living_expenses: Option<f64>,
    pub documents_required: Option<Vec<String>>,
    pub status: Option<Status>,
    pub deadline: Option<Date>,
    pub notes: Option<String>,
}

impl Application {
    pub fn from_new(
        id: Uuid,
        user_id: Uuid,
        new: NewApplication,
        now: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            user_id,
            university_name: new.university_name,
            degree: new.degree,
            priority: new.priority,
            number_of_semesters: new.number_of_semesters,
            application_portal: new.application_portal,
            city: new.city,
            country: new.country,
            location: new.location,
            starting_semester: new.starting_semester,
            tuition_fees: new.tuition_fees,
            living_expenses: new.living_expenses,
            documents_required: new.documents_required,
            status: new.status,
            deadline: new.deadline,
            notes: new.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies `patch` and advances `updated_at`. Owner, id and `created_at` never change.
    pub fn apply(&mut self, patch: ApplicationPatch, now: OffsetDateTime) {
        if let Some(v) = patch.university_name {
            self.university_name = v;
        }
        if let Some(v) = patch.degree {
            self.degree = v;
        }
        if let Some(v) = patch.priority {
            self.priority = v;
        }
        if let Some(v) = patch.number_of_semesters {
            self.number_of_semesters = v;
        }
        if let Some(v) = patch.application_portal {
            self.application_portal = v;
        }
        if let Some(v) = patch.city {
            self.city = v;
        }
        if let Some(v) = patch.country {
            self.country = v;
        }
        if let Some(v) = patch.location {
            self.location = v;
        }
        if let Some(v) = patch.starting_semester {
            self.starting_semester = v;
        }
        if let Some(v) = patch.tuition_fees {
            self.tuition_fees = v;
        }
        if let Some(v) = patch.living_expenses {
            self.living_expenses = v;
        }
        if let Some(v) = patch.documents_required {
            self.documents_required = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.deadline {
            self.deadline = v;
        }
        if let Some(v) = patch.notes {
            self.notes = v;
        }
        self.updated_at = next_updated_at(self.updated_at, now);
    }
}

/// Current time at the store's microsecond resolution.
pub fn now_micros() -> OffsetDateTime {
    truncate_micros(OffsetDateTime::now_utc())
}

fn truncate_micros(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_nanosecond(t.nanosecond() / 1_000 * 1_000)
        .unwrap_or(t)
}

/// `now`, unless that would not move past `prev`; then `prev + 1µs`.
pub fn next_updated_at(prev: OffsetDateTime, now: OffsetDateTime) -> OffsetDateTime {
    let now = truncate_micros(now);
    if now > prev {
        now
    } else {
        prev + time::Duration::microseconds(1)
    }
}

/// Row shape as stored in Postgres; enums are kept as text.
#[derive(Debug, FromRow)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub university_name: String,
    pub degree: String,
    pub priority: String,
    pub number_of_semesters: i32,
    pub application_portal: String,
    pub city: String,
    pub country: String,
    pub location: String,
    pub starting_semester: String,
    pub tuition_fees: f64,
    pub living_expenses: f64,
    pub documents_required: Vec<String>,
    pub status: String,
    pub deadline: Date,
    pub notes: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = anyhow::Error;

    fn try_from(r: ApplicationRow) -> Result<Self, Self::Error> {
        let priority = r
            .priority
            .parse::<Priority>()
            .map_err(|_| anyhow::anyhow!("unknown priority {:?} in row {}", r.priority, r.id))?;
        let status = r
            .status
            .parse::<Status>()
            .map_err(|_| anyhow::anyhow!("unknown status {:?} in row {}", r.status, r.id))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            university_name: r.university_name,
            degree: r.degree,
            priority,
            number_of_semesters: r.number_of_semesters,
            application_portal: r.application_portal,
            city: r.city,
            country: r.country,
            location: r.location,
            starting_semester: r.starting_semester,
            tuition_fees: r.tuition_fees,
            living_expenses: r.living_expenses,
            documents_required: r.documents_required,
            status,
            deadline: r.deadline,
            notes: r.notes,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn enums_parse_their_labels_only() {
        assert_eq!("In Progress".parse::<Status>(), Ok(Status::InProgress));
        assert!("in progress".parse::<Status>().is_err());
        assert!("InProgress".parse::<Status>().is_err());
        assert_eq!("Low".parse::<Priority>(), Ok(Priority::Low));
        assert!("Urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn defaults() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Status::default(), Status::Draft);
    }

    #[test]
    fn serializes_with_client_field_names() {
        let app = Application::from_new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            fixtures::new_application("TUM"),
            datetime!(2024-06-01 12:00 UTC),
        );
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["universityName"], "TUM");
        assert_eq!(json["deadline"], "2025-01-15");
        assert_eq!(json["status"], "Draft");
        assert_eq!(json["createdAt"], "2024-06-01T12:00:00Z");
        assert!(json.get("_id").is_some());
        assert!(json.get("userId").is_some());
    }

    #[test]
    fn apply_keeps_identity_and_advances_updated_at() {
        let created = datetime!(2024-06-01 12:00 UTC);
        let mut app = Application::from_new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            fixtures::new_application("TUM"),
            created,
        );
        let (id, owner) = (app.id, app.user_id);

        app.apply(
            ApplicationPatch {
                status: Some(Status::Submitted),
                deadline: Some(date!(2025 - 02 - 01)),
                ..Default::default()
            },
            created,
        );

        assert_eq!(app.id, id);
        assert_eq!(app.user_id, owner);
        assert_eq!(app.created_at, created);
        assert!(app.updated_at > created);
        assert_eq!(app.status, Status::Submitted);
        assert_eq!(app.deadline, date!(2025 - 02 - 01));
        assert_eq!(app.university_name, "TUM");
    }

    #[test]
    fn updated_at_is_strictly_increasing_under_clock_skew() {
        let base = datetime!(2024-06-01 12:00 UTC);
        let prev = base + time::Duration::microseconds(5);
        let earlier = datetime!(2024-06-01 11:59 UTC);
        let next = next_updated_at(prev, earlier);
        assert_eq!(next, base + time::Duration::microseconds(6));
        assert_eq!(next_updated_at(prev, prev), next);

        let later = datetime!(2024-06-01 12:01 UTC) + time::Duration::nanoseconds(900);
        assert_eq!(
            next_updated_at(prev, later),
            datetime!(2024-06-01 12:01 UTC)
        );
    }

    #[test]
    fn row_with_unknown_enum_is_rejected() {
        let row = ApplicationRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            university_name: "X".into(),
            degree: "Y".into(),
            priority: "Urgent".into(),
            number_of_semesters: 2,
            application_portal: "https://x.edu".into(),
            city: "c".into(),
            country: "c".into(),
            location: "l".into(),
            starting_semester: "s".into(),
            tuition_fees: 0.0,
            living_expenses: 0.0,
            documents_required: vec![],
            status: "Draft".into(),
            deadline: date!(2025 - 01 - 01),
            notes: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(Application::try_from(row).is_err());
    }
}
