//! Translates the recognized list options into a typed filter. Unknown options are ignored.

use std::{cmp::Ordering, collections::HashMap};

use time::Date;

use crate::{
    applications::{
        repo_types::{Application, Priority, Status},
        validate::parse_iso_date,
    },
    error::ApiError,
    validation::Violations,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    Deadline,
    Priority,
    TuitionFees,
    LivingExpenses,
    #[default]
    CreatedAt,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "deadline" => Some(Self::Deadline),
            "priority" => Some(Self::Priority),
            "tuitionFees" => Some(Self::TuitionFees),
            "livingExpenses" => Some(Self::LivingExpenses),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    /// SQL ordering expression. Only these fixed strings ever reach the query text.
    pub fn sql(self) -> &'static str {
        match self {
            Self::Deadline => "deadline",
            Self::Priority => {
                "CASE priority WHEN 'Low' THEN 1 WHEN 'Medium' THEN 2 WHEN 'High' THEN 3 END"
            }
            Self::TuitionFees => "tuition_fees",
            Self::LivingExpenses => "living_expenses",
            Self::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicationFilter {
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    /// Case-insensitive substring.
    pub country: Option<String>,
    /// Case-insensitive substring.
    pub starting_semester: Option<String>,
    /// Inclusive bounds on the deadline.
    pub deadline_from: Option<Date>,
    pub deadline_to: Option<Date>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

fn non_blank<'a>(query: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    query.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

impl ApplicationFilter {
    /// Builds a filter from raw query parameters. Blank values count as absent;
    /// malformed values of recognized options are reported together.
    pub fn from_query(query: &HashMap<String, String>) -> Result<Self, ApiError> {
        let mut v = Violations::new();
        let mut filter = Self::default();

        if let Some(raw) = non_blank(query, "priority") {
            filter.priority = raw.parse().ok();
            if filter.priority.is_none() {
                v.push("priority", "Priority must be High, Medium, or Low");
            }
        }
        if let Some(raw) = non_blank(query, "status") {
            filter.status = raw.parse().ok();
            if filter.status.is_none() {
                v.push(
                    "status",
                    "Status must be Draft, In Progress, Submitted, Accepted, or Rejected",
                );
            }
        }
        filter.country = non_blank(query, "country").map(str::to_string);
        filter.starting_semester = non_blank(query, "startingSemester").map(str::to_string);

        for (key, slot) in [
            ("deadlineFrom", &mut filter.deadline_from),
            ("deadlineTo", &mut filter.deadline_to),
        ] {
            if let Some(raw) = non_blank(query, key) {
                *slot = parse_iso_date(raw);
                if slot.is_none() {
                    v.push(key, format!("{key} must be a valid date"));
                }
            }
        }

        if let Some(raw) = non_blank(query, "sortBy") {
            match SortField::parse(raw) {
                Some(field) => filter.sort_by = field,
                None => v.push("sortBy", "Invalid sort field"),
            }
        }
        if let Some(raw) = non_blank(query, "sortOrder") {
            match raw {
                "asc" => filter.sort_order = SortOrder::Asc,
                "desc" => filter.sort_order = SortOrder::Desc,
                _ => v.push("sortOrder", "Sort order must be asc or desc"),
            }
        }

        v.finish()?;
        Ok(filter)
    }

    pub fn matches(&self, app: &Application) -> bool {
        fn contains_ci(haystack: &str, needle: &str) -> bool {
            haystack.to_lowercase().contains(&needle.to_lowercase())
        }

        self.priority.map_or(true, |p| app.priority == p)
            && self.status.map_or(true, |s| app.status == s)
            && self
                .country
                .as_deref()
                .map_or(true, |c| contains_ci(&app.country, c))
            && self
                .starting_semester
                .as_deref()
                .map_or(true, |s| contains_ci(&app.starting_semester, s))
            && self.deadline_from.map_or(true, |d| app.deadline >= d)
            && self.deadline_to.map_or(true, |d| app.deadline <= d)
    }

    /// Requested order, then `createdAt` descending, then id, so results are deterministic.
    pub fn compare(&self, a: &Application, b: &Application) -> Ordering {
        let primary = match self.sort_by {
            SortField::Deadline => a.deadline.cmp(&b.deadline),
            SortField::Priority => a.priority.rank().cmp(&b.priority.rank()),
            SortField::TuitionFees => a.tuition_fees.total_cmp(&b.tuition_fees),
            SortField::LivingExpenses => a.living_expenses.total_cmp(&b.living_expenses),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        };
        let primary = match self.sort_order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| a.id.cmp(&b.id))
    }

    /// Filters and sorts an unordered set of one user's records.
    pub fn apply(&self, apps: impl IntoIterator<Item = Application>) -> Vec<Application> {
        let mut out: Vec<Application> = apps.into_iter().filter(|a| self.matches(a)).collect();
        out.sort_by(|a, b| self.compare(a, b));
        out
    }
}

/// `%needle%` for ILIKE with `%`, `_` and `\` escaped.
pub fn like_pattern(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len() + 2);
    out.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::repo_types::fixtures::new_application;
    use time::{macros::date, macros::datetime, Duration};
    use uuid::Uuid;

    fn q(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn app(minutes: i64, f: impl FnOnce(&mut Application)) -> Application {
        let mut a = Application::from_new(
            Uuid::new_v4(),
            Uuid::nil(),
            new_application("U"),
            datetime!(2024-01-01 0:00 UTC) + Duration::minutes(minutes),
        );
        f(&mut a);
        a
    }

    #[test]
    fn defaults_to_created_at_desc() {
        let f = ApplicationFilter::from_query(&HashMap::new()).unwrap();
        assert_eq!(f.sort_by, SortField::CreatedAt);
        assert_eq!(f.sort_order, SortOrder::Desc);

        let out = f.apply(vec![app(1, |_| {}), app(3, |_| {}), app(2, |_| {})]);
        let minutes: Vec<_> = out
            .iter()
            .map(|a| (a.created_at - datetime!(2024-01-01 0:00 UTC)).whole_minutes())
            .collect();
        assert_eq!(minutes, vec![3, 2, 1]);
    }

    #[test]
    fn unknown_options_are_ignored() {
        let f = ApplicationFilter::from_query(&q(&[("page", "2"), ("$where", "1")])).unwrap();
        assert_eq!(f, ApplicationFilter::default());
    }

    #[test]
    fn invalid_recognized_options_are_reported_together() {
        let err = ApplicationFilter::from_query(&q(&[
            ("sortBy", "userId"),
            ("sortOrder", "sideways"),
            ("status", "Pending"),
        ]))
        .unwrap_err();
        match err {
            ApiError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn country_is_case_insensitive_substring() {
        let f = ApplicationFilter::from_query(&q(&[("country", "germany")])).unwrap();
        let out = f.apply(vec![
            app(1, |a| a.country = "Germany".into()),
            app(2, |a| a.country = "germany-adjacent".into()),
            app(3, |a| a.country = "Netherlands".into()),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.country.to_lowercase().contains("germany")));
    }

    #[test]
    fn exact_enum_filters() {
        let f = ApplicationFilter::from_query(&q(&[("priority", "High"), ("status", "In Progress")]))
            .unwrap();
        let out = f.apply(vec![
            app(1, |a| {
                a.priority = Priority::High;
                a.status = Status::InProgress;
            }),
            app(2, |a| a.priority = Priority::High),
            app(3, |a| a.status = Status::InProgress),
        ]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn tuition_ascending() {
        let f = ApplicationFilter::from_query(&q(&[("sortBy", "tuitionFees"), ("sortOrder", "asc")]))
            .unwrap();
        let out = f.apply(vec![
            app(1, |a| a.tuition_fees = 58_000.0),
            app(2, |a| a.tuition_fees = 3_000.0),
            app(3, |a| a.tuition_fees = 55_000.0),
        ]);
        let fees: Vec<f64> = out.iter().map(|a| a.tuition_fees).collect();
        assert_eq!(fees, vec![3_000.0, 55_000.0, 58_000.0]);
    }

    #[test]
    fn priority_sorts_by_rank() {
        let f = ApplicationFilter::from_query(&q(&[("sortBy", "priority")])).unwrap();
        let out = f.apply(vec![
            app(1, |a| a.priority = Priority::Medium),
            app(2, |a| a.priority = Priority::Low),
            app(3, |a| a.priority = Priority::High),
        ]);
        let order: Vec<_> = out.iter().map(|a| a.priority).collect();
        assert_eq!(order, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn deadline_range_is_inclusive() {
        let f = ApplicationFilter::from_query(&q(&[
            ("deadlineFrom", "2025-01-10"),
            ("deadlineTo", "2025-01-20"),
            ("sortBy", "deadline"),
            ("sortOrder", "asc"),
        ]))
        .unwrap();
        let out = f.apply(vec![
            app(1, |a| a.deadline = date!(2025 - 01 - 20)),
            app(2, |a| a.deadline = date!(2025 - 01 - 09)),
            app(3, |a| a.deadline = date!(2025 - 01 - 10)),
            app(4, |a| a.deadline = date!(2025 - 01 - 21)),
        ]);
        let dates: Vec<_> = out.iter().map(|a| a.deadline).collect();
        assert_eq!(dates, vec![date!(2025 - 01 - 10), date!(2025 - 01 - 20)]);
    }

    #[test]
    fn blank_values_count_as_absent() {
        let f = ApplicationFilter::from_query(&q(&[("country", "  "), ("sortBy", "")])).unwrap();
        assert_eq!(f, ApplicationFilter::default());
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("germ"), "%germ%");
        assert_eq!(like_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
    }
}
