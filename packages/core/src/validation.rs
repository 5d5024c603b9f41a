//! Field-level validation for inbound payloads.
//!
//! Validation is hand-written per payload type: each type implements
//! [`Validate`] and reports every offending field at once rather than
//! stopping at the first failure.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

/// A single rejected field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Wire name of the offending field (camelCase).
    pub field: String,
    /// Why the value was rejected.
    pub message: String,
}

impl FieldError {
    /// Creates a field error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One or more field errors collected from a single payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_errors(.errors))]
pub struct ValidationErrors {
    /// Every field that failed, in declaration order.
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    /// Wraps a single field error.
    #[must_use]
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError::new(field, message)],
        }
    }
}

fn join_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Payloads that can check their own field constraints.
pub trait Validate {
    /// Returns every constraint violation, or `Ok(())` when the payload is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing each offending field.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Accumulates field errors while a payload is being checked.
#[derive(Debug, Default)]
pub struct Checker {
    errors: Vec<FieldError>,
}

impl Checker {
    /// Creates an empty checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a present, non-blank value no longer than `max_len` characters.
    pub fn required(&mut self, field: &str, value: &str, max_len: usize) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(FieldError::new(field, format!("{field} is required")));
        } else {
            self.max_len(field, value, max_len);
        }
        self
    }

    /// Applies [`Checker::required`] only when the value was supplied.
    pub fn optional(&mut self, field: &str, value: Option<&str>, max_len: usize) -> &mut Self {
        if let Some(value) = value {
            self.required(field, value, max_len);
        }
        self
    }

    /// Rejects values longer than `max_len` characters.
    pub fn max_len(&mut self, field: &str, value: &str, max_len: usize) -> &mut Self {
        if value.chars().count() > max_len {
            self.errors.push(FieldError::new(
                field,
                format!("{field} must be at most {max_len} characters"),
            ));
        }
        self
    }

    /// Requires a well-formed email address.
    pub fn email(&mut self, field: &str, value: &str) -> &mut Self {
        if !value.trim().is_empty() && !EMAIL_PATTERN.is_match(value) {
            self.errors
                .push(FieldError::new(field, format!("{field} must be a valid email address")));
        }
        self
    }

    /// Records an arbitrary error when `condition` holds.
    pub fn reject_if(&mut self, condition: bool, field: &str, message: &str) -> &mut Self {
        if condition {
            self.errors.push(FieldError::new(field, message));
        }
        self
    }

    /// Finishes the check.
    ///
    /// # Errors
    ///
    /// Returns the collected errors when at least one check failed.
    pub fn finish(&mut self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors {
                errors: std::mem::take(&mut self.errors),
            })
        }
    }
}
