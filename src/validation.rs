//! Field validation that reports every violation at once.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::{ApiError, FieldError};

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    static ref HTTP_URL_RE: Regex = Regex::new(r"^https?://[^\s/$.?#][^\s]*$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_http_url(url: &str) -> bool {
    HTTP_URL_RE.is_match(url)
}

/// Accumulates field errors; turns into `ApiError::Validation` if any were recorded.
#[derive(Debug, Default)]
pub struct Violations {
    errors: Vec<FieldError>,
}

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    /// Trims `value` and checks it is non-empty and at most `max` chars.
    /// Returns the trimmed string when it passes.
    pub fn text(&mut self, field: &str, label: &str, value: &str, max: usize) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.push(field, format!("{label} is required"));
            return None;
        }
        if trimmed.chars().count() > max {
            self.push(
                field,
                format!("{label} cannot be more than {max} characters"),
            );
            return None;
        }
        Some(trimmed.to_string())
    }

    /// Reads a JSON string field. `None` when absent or null; `Some(None)` after
    /// recording a violation for any other JSON type.
    pub fn string<'a>(
        &mut self,
        field: &str,
        label: &str,
        raw: &'a Option<Value>,
    ) -> Option<Option<&'a str>> {
        match raw {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(Some(s.as_str())),
            Some(_) => {
                self.push(field, format!("{label} must be a string"));
                Some(None)
            }
        }
    }

    /// [`Violations::string`] followed by `parse` on the supplied text.
    pub fn parsed<'a, T>(
        &mut self,
        field: &str,
        label: &str,
        raw: &'a Option<Value>,
        parse: impl FnOnce(&mut Self, &'a str) -> Option<T>,
    ) -> Option<Option<T>> {
        let text = self.string(field, label, raw)?;
        Some(text.and_then(|s| parse(self, s)))
    }

    /// A string that must be present, non-blank and at most `max` chars.
    pub fn required_string(
        &mut self,
        field: &str,
        label: &str,
        raw: &Option<Value>,
        max: usize,
    ) -> Option<String> {
        match self.string(field, label, raw) {
            Some(text) => text.and_then(|s| self.text(field, label, s, max)),
            None => {
                self.push(field, format!("{label} is required"));
                None
            }
        }
    }

    /// A string that is checked only when supplied.
    pub fn optional_string(
        &mut self,
        field: &str,
        label: &str,
        raw: &Option<Value>,
        max: usize,
    ) -> Option<String> {
        self.string(field, label, raw)
            .flatten()
            .and_then(|s| self.text(field, label, s, max))
    }

    pub fn non_negative(&mut self, field: &str, label: &str, value: f64) -> Option<f64> {
        if !value.is_finite() || value < 0.0 {
            self.push(field, format!("{label} cannot be negative"));
            return None;
        }
        Some(value)
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    #[cfg(test)]
    pub fn into_errors(self) -> Vec<FieldError> {
        self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ada@example.com"));
        assert!(!is_valid_email("ada@example"));
        assert!(!is_valid_email("ada example@x.io"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn url_shape() {
        assert!(is_http_url("https://apply.tum.de/portal"));
        assert!(is_http_url("http://uni.example.org"));
        assert!(!is_http_url("ftp://uni.example.org"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("apply.tum.de"));
    }

    #[test]
    fn text_trims_and_enforces_ceiling() {
        let mut v = Violations::new();
        assert_eq!(v.text("city", "City", "  Munich ", 50).as_deref(), Some("Munich"));
        assert!(v.text("city", "City", "   ", 50).is_none());
        assert!(v.text("city", "City", &"x".repeat(51), 50).is_none());
        let errors = v.into_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "City is required");
        assert_eq!(errors[1].message, "City cannot be more than 50 characters");
    }

    #[test]
    fn finish_collects_all() {
        let mut v = Violations::new();
        v.non_negative("tuitionFees", "Tuition fees", -1.0);
        v.non_negative("livingExpenses", "Living expenses", f64::NAN);
        v.required_string("degree", "Degree", &None, 50);
        match v.finish() {
            Err(ApiError::Validation(errors)) => assert_eq!(errors.len(), 3),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn wrong_json_types_are_violations() {
        let mut v = Violations::new();
        assert!(v.required_string("city", "City", &Some(json!(12)), 50).is_none());
        assert!(v.optional_string("country", "Country", &Some(json!(["x"])), 50).is_none());
        assert!(v.optional_string("location", "Location", &Some(Value::Null), 50).is_none());
        assert_eq!(
            v.required_string("degree", "Degree", &Some(json!(" MSc ")), 50).as_deref(),
            Some("MSc")
        );
        let errors = v.into_errors();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "City must be a string");
        assert_eq!(errors[1].field, "country");
    }
}
