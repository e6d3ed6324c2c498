//! Write-time checks for application records. All violations are collected
//! before anything reaches the store.

use serde_json::Value;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

use crate::{
    applications::{
        dto::ApplicationRequest,
        repo_types::{ApplicationPatch, NewApplication, Priority, Status},
    },
    error::ApiError,
    validation::{is_http_url, Violations},
};

pub const UNIVERSITY_MAX: usize = 100;
pub const DEGREE_MAX: usize = 50;
pub const CITY_MAX: usize = 50;
pub const COUNTRY_MAX: usize = 50;
pub const LOCATION_MAX: usize = 100;
pub const STARTING_SEMESTER_MAX: usize = 20;
pub const PORTAL_MAX: usize = 500;
pub const NOTES_MAX: usize = 1000;
pub const DOCUMENT_NAME_MAX: usize = 100;
pub const DOCUMENTS_MAX: usize = 50;
pub const SEMESTERS: std::ops::RangeInclusive<i64> = 1..=20;

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (its date part).
pub fn parse_iso_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|t| t.date()))
}

fn number(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn priority(v: &mut Violations, raw: &str) -> Option<Priority> {
    let parsed = raw.trim().parse::<Priority>().ok();
    if parsed.is_none() {
        v.push("priority", "Priority must be High, Medium, or Low");
    }
    parsed
}

fn status(v: &mut Violations, raw: &str) -> Option<Status> {
    let parsed = raw.trim().parse::<Status>().ok();
    if parsed.is_none() {
        v.push(
            "status",
            "Status must be Draft, In Progress, Submitted, Accepted, or Rejected",
        );
    }
    parsed
}

fn semesters(v: &mut Violations, raw: &Value) -> Option<i32> {
    match number(raw) {
        Some(n) if n.fract() == 0.0 && SEMESTERS.contains(&(n as i64)) => Some(n as i32),
        _ => {
            v.push(
                "numberOfSemesters",
                "Number of semesters must be between 1 and 20",
            );
            None
        }
    }
}

fn amount(v: &mut Violations, field: &str, label: &str, raw: &Value) -> Option<f64> {
    match number(raw) {
        Some(n) => v.non_negative(field, label, n),
        None => {
            v.push(field, format!("{label} must be a non-negative number"));
            None
        }
    }
}

fn portal(v: &mut Violations, raw: &str) -> Option<String> {
    let url = v.text("applicationPortal", "Application portal", raw, PORTAL_MAX)?;
    if !is_http_url(&url) {
        v.push("applicationPortal", "Application portal must be a valid URL");
        return None;
    }
    Some(url)
}

fn deadline(v: &mut Violations, raw: &str) -> Option<Date> {
    let parsed = parse_iso_date(raw);
    if parsed.is_none() {
        v.push("deadline", "Deadline must be a valid date");
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

/// Keeps order. Every entry must be a non-blank string.
fn documents(v: &mut Violations, raw: &Value) -> Option<Vec<String>> {
    let Value::Array(items) = raw else {
        v.push("documentsRequired", "Documents required must be a list of names");
        return None;
    };
    if items.len() > DOCUMENTS_MAX {
        v.push(
            "documentsRequired",
            format!("At most {DOCUMENTS_MAX} documents can be listed"),
        );
        return None;
    }
    let mut out = Vec::with_capacity(items.len());
    let mut ok = true;
    for item in items {
        match item.as_str().map(str::trim) {
            Some("") => {
                v.push("documentsRequired", "Document names cannot be blank");
                ok = false;
            }
            Some(name) if name.chars().count() <= DOCUMENT_NAME_MAX => out.push(name.to_string()),
            Some(_) => {
                v.push(
                    "documentsRequired",
                    format!("Document name cannot be more than {DOCUMENT_NAME_MAX} characters"),
                );
                ok = false;
            }
            None => {
                v.push("documentsRequired", "Document names must be strings");
                ok = false;
            }
        }
    }
    ok.then_some(out)
}

fn reject_identity_fields(v: &mut Violations, req: &ApplicationRequest) {
    if req.user_id.is_some() {
        v.push("userId", "userId cannot be set or changed");
    }
    if req.id.is_some() {
        v.push("_id", "_id cannot be set or changed");
    }
}

fn required<T>(v: &mut Violations, field: &str, label: &str, value: Option<Option<T>>) -> Option<T> {
    match value {
        Some(value) => value,
        None => {
            v.push(field, format!("{label} is required"));
            None
        }
    }
}

/// Validates a full create request. Priority and status fall back to Medium/Draft.
pub fn validate_new(req: &ApplicationRequest) -> Result<NewApplication, ApiError> {
    let mut v = Violations::new();
    reject_identity_fields(&mut v, req);

    let university_name = v.required_string(
        "universityName",
        "University name",
        &req.university_name,
        UNIVERSITY_MAX,
    );
    let degree = v.required_string("degree", "Degree", &req.degree, DEGREE_MAX);
    let priority = v
        .parsed("priority", "Priority", &req.priority, priority)
        .unwrap_or(Some(Priority::default()));
    let number_of_semesters = req.number_of_semesters.as_ref().map(|n| semesters(&mut v, n));
    let number_of_semesters =
        required(&mut v, "numberOfSemesters", "Number of semesters", number_of_semesters);
    let application_portal = v.parsed(
        "applicationPortal",
        "Application portal",
        &req.application_portal,
        portal,
    );
    let application_portal = required(
        &mut v,
        "applicationPortal",
        "Application portal",
        application_portal,
    );
    let city = v.required_string("city", "City", &req.city, CITY_MAX);
    let country = v.required_string("country", "Country", &req.country, COUNTRY_MAX);
    let location = v.required_string("location", "Location", &req.location, LOCATION_MAX);
    let starting_semester = v.required_string(
        "startingSemester",
        "Starting semester",
        &req.starting_semester,
        STARTING_SEMESTER_MAX,
    );
    let tuition_fees = req
        .tuition_fees
        .as_ref()
        .map(|n| amount(&mut v, "tuitionFees", "Tuition fees", n));
    let tuition_fees = required(&mut v, "tuitionFees", "Tuition fees", tuition_fees);
    let living_expenses = req
        .living_expenses
        .as_ref()
        .map(|n| amount(&mut v, "livingExpenses", "Living expenses", n));
    let living_expenses = required(&mut v, "livingExpenses", "Living expenses", living_expenses);
    let documents_required = match &req.documents_required {
        Some(raw) => documents(&mut v, raw),
        None => Some(Vec::new()),
    };
    let status = v
        .parsed("status", "Status", &req.status, status)
        .unwrap_or(Some(Status::default()));
    let deadline = v.parsed("deadline", "Deadline", &req.deadline, deadline);
    let deadline = required(&mut v, "deadline", "Deadline", deadline);
    let notes = v
        .parsed("notes", "Notes", &req.notes, notes)
        .unwrap_or(Some(String::new()));

    v.finish()?;

    // Every field is Some once no violation was recorded.
    match (
        university_name,
        degree,
        priority,
        number_of_semesters,
        application_portal,
        city,
        country,
        location,
        starting_semester,
        tuition_fees,
        living_expenses,
        documents_required,
        status,
        deadline,
        notes,
    ) {
        (
            Some(university_name),
            Some(degree),
            Some(priority),
            Some(number_of_semesters),
            Some(application_portal),
            Some(city),
            Some(country),
            Some(location),
            Some(starting_semester),
            Some(tuition_fees),
            Some(living_expenses),
            Some(documents_required),
            Some(status),
            Some(deadline),
            Some(notes),
        ) => Ok(NewApplication {
            university_name,
            degree,
            priority,
            number_of_semesters,
            application_portal,
            city,
            country,
            location,
            starting_semester,
            tuition_fees,
            living_expenses,
            documents_required,
            status,
            deadline,
            notes,
        }),
        _ => Err(ApiError::internal(anyhow::anyhow!(
            "application validation accepted incomplete input"
        ))),
    }
}

/// Validates only the supplied fields of a partial update.
pub fn validate_patch(req: &ApplicationRequest) -> Result<ApplicationPatch, ApiError> {
    let mut v = Violations::new();
    reject_identity_fields(&mut v, req);

    let patch = ApplicationPatch {
        university_name: v.optional_string(
            "universityName",
            "University name",
            &req.university_name,
            UNIVERSITY_MAX,
        ),
        degree: v.optional_string("degree", "Degree", &req.degree, DEGREE_MAX),
        priority: v
            .parsed("priority", "Priority", &req.priority, priority)
            .flatten(),
        number_of_semesters: req
            .number_of_semesters
            .as_ref()
            .and_then(|n| semesters(&mut v, n)),
        application_portal: v
            .parsed(
                "applicationPortal",
                "Application portal",
                &req.application_portal,
                portal,
            )
            .flatten(),
        city: v.optional_string("city", "City", &req.city, CITY_MAX),
        country: v.optional_string("country", "Country", &req.country, COUNTRY_MAX),
        location: v.optional_string("location", "Location", &req.location, LOCATION_MAX),
        starting_semester: v.optional_string(
            "startingSemester",
            "Starting semester",
            &req.starting_semester,
            STARTING_SEMESTER_MAX,
        ),
        tuition_fees: req
            .tuition_fees
            .as_ref()
            .and_then(|n| amount(&mut v, "tuitionFees", "Tuition fees", n)),
        living_expenses: req
            .living_expenses
            .as_ref()
            .and_then(|n| amount(&mut v, "livingExpenses", "Living expenses", n)),
        documents_required: req
            .documents_required
            .as_ref()
            .and_then(|d| documents(&mut v, d)),
        status: v.parsed("status", "Status", &req.status, status).flatten(),
        deadline: v
            .parsed("deadline", "Deadline", &req.deadline, deadline)
            .flatten(),
        notes: v.parsed("notes", "Notes", &req.notes, notes).flatten(),
    };

    v.finish()?;
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;

    fn request(value: Value) -> ApplicationRequest {
        serde_json::from_value(value).expect("request should deserialize")
    }

    fn valid_body() -> Value {
        json!({
            "universityName": "Technical University of Munich",
            "degree": "MSc Informatics",
            "numberOfSemesters": 4,
            "applicationPortal": "https://campus.tum.de/apply",
            "city": "Munich",
            "country": "Germany",
            "location": "Garching",
            "startingSemester": "Winter 2025",
            "tuitionFees": 0,
            "livingExpenses": 11000.5,
            "deadline": "2025-01-15"
        })
    }

    fn fields(err: ApiError) -> Vec<String> {
        match err {
            ApiError::Validation(errors) => errors.into_iter().map(|e| e.field).collect(),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let new = validate_new(&request(valid_body())).unwrap();
        assert_eq!(new.priority, Priority::Medium);
        assert_eq!(new.status, Status::Draft);
        assert!(new.documents_required.is_empty());
        assert_eq!(new.notes, "");
        assert_eq!(new.deadline, date!(2025 - 01 - 15));
        assert_eq!(new.tuition_fees, 0.0);
    }

    #[test]
    fn three_invalid_fields_yield_three_violations() {
        let mut body = valid_body();
        body["priority"] = json!("Urgent");
        body["tuitionFees"] = json!(-5);
        body["universityName"] = json!("x".repeat(101));
        let errs = fields(validate_new(&request(body)).unwrap_err());
        assert_eq!(errs.len(), 3);
        assert!(errs.contains(&"priority".to_string()));
        assert!(errs.contains(&"tuitionFees".to_string()));
        assert!(errs.contains(&"universityName".to_string()));
    }

    #[test]
    fn missing_required_fields_are_all_reported() {
        let errs = fields(validate_new(&request(json!({}))).unwrap_err());
        for f in [
            "universityName",
            "degree",
            "numberOfSemesters",
            "applicationPortal",
            "city",
            "country",
            "location",
            "startingSemester",
            "tuitionFees",
            "livingExpenses",
            "deadline",
        ] {
            assert!(errs.contains(&f.to_string()), "missing {f}");
        }
        assert_eq!(errs.len(), 11);
    }

    #[test]
    fn semesters_range_and_integrality() {
        for bad in [json!(0), json!(21), json!(2.5), json!("four"), json!(true)] {
            let mut body = valid_body();
            body["numberOfSemesters"] = bad;
            assert_eq!(
                fields(validate_new(&request(body)).unwrap_err()),
                vec!["numberOfSemesters"]
            );
        }
        let mut body = valid_body();
        body["numberOfSemesters"] = json!("20");
        assert_eq!(validate_new(&request(body)).unwrap().number_of_semesters, 20);
    }

    #[test]
    fn portal_must_be_http_url() {
        let mut body = valid_body();
        body["applicationPortal"] = json!("campus.tum.de");
        assert_eq!(
            fields(validate_new(&request(body)).unwrap_err()),
            vec!["applicationPortal"]
        );
    }

    #[test]
    fn deadline_accepts_rfc3339_and_rejects_garbage() {
        let mut body = valid_body();
        body["deadline"] = json!("2025-03-01T10:00:00Z");
        assert_eq!(
            validate_new(&request(body)).unwrap().deadline,
            date!(2025 - 03 - 01)
        );

        let mut body = valid_body();
        body["deadline"] = json!("2025-02-30");
        assert_eq!(fields(validate_new(&request(body)).unwrap_err()), vec!["deadline"]);
    }

    #[test]
    fn documents_keep_order_and_enforce_ceiling() {
        let mut body = valid_body();
        body["documentsRequired"] = json!([" CV ", "Transcript", "IELTS"]);
        assert_eq!(
            validate_new(&request(body)).unwrap().documents_required,
            vec!["CV", "Transcript", "IELTS"]
        );

        let mut body = valid_body();
        body["documentsRequired"] = json!(["CV", "  "]);
        assert_eq!(
            fields(validate_new(&request(body)).unwrap_err()),
            vec!["documentsRequired"]
        );

        let mut body = valid_body();
        body["documentsRequired"] = json!(["x".repeat(101)]);
        assert_eq!(
            fields(validate_new(&request(body)).unwrap_err()),
            vec!["documentsRequired"]
        );
    }

    #[test]
    fn notes_ceiling() {
        let mut body = valid_body();
        body["notes"] = json!("n".repeat(1001));
        assert_eq!(fields(validate_new(&request(body)).unwrap_err()), vec!["notes"]);
    }

    #[test]
    fn university_alias_is_accepted() {
        let mut body = valid_body();
        body.as_object_mut().unwrap().remove("universityName");
        body["university"] = json!("X");
        assert_eq!(validate_new(&request(body)).unwrap().university_name, "X");
    }

    #[test]
    fn patch_validates_only_supplied_fields() {
        let patch = validate_patch(&request(json!({ "status": "Submitted" }))).unwrap();
        assert_eq!(
            patch,
            ApplicationPatch {
                status: Some(Status::Submitted),
                ..Default::default()
            }
        );

        let errs = fields(
            validate_patch(&request(json!({ "city": "  ", "livingExpenses": -1 }))).unwrap_err(),
        );
        assert_eq!(errs, vec!["city", "livingExpenses"]);
    }

    #[test]
    fn owner_and_id_cannot_be_changed() {
        let errs = fields(
            validate_patch(&request(json!({
                "userId": "someone-else",
                "_id": "abc",
                "notes": "ok"
            })))
            .unwrap_err(),
        );
        assert_eq!(errs, vec!["userId", "_id"]);
    }

    #[test]
    fn wrong_types_join_the_other_violations() {
        let mut body = valid_body();
        body["universityName"] = json!(123);
        body["numberOfSemesters"] = json!(0);
        body["tuitionFees"] = json!(-1);
        let errs = fields(validate_new(&request(body)).unwrap_err());
        assert_eq!(errs, vec!["universityName", "numberOfSemesters", "tuitionFees"]);

        let errs = fields(
            validate_patch(&request(json!({ "status": 3, "deadline": false, "city": "Bonn" })))
                .unwrap_err(),
        );
        assert_eq!(errs, vec!["status", "deadline"]);
    }

    #[test]
    fn null_text_fields_count_as_absent() {
        let mut body = valid_body();
        body["notes"] = Value::Null;
        body["priority"] = Value::Null;
        let new = validate_new(&request(body)).unwrap();
        assert_eq!(new.notes, "");
        assert_eq!(new.priority, Priority::Medium);
    }
}
