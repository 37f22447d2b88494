//! Unified validation framework for request payloads.
//!
//! Field-level limits come from `validator` derives on the payload types;
//! cross-field and domain rules live in [`rules`] and are collected through
//! [`Violations`] so both surface as the same `VALIDATION_ERROR` response.

pub mod rules;

pub use validator::Validate;

use validator::ValidationError;

use crate::error::AppError;

/// Accumulates `field: code` messages from rule checks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Violations(Vec<String>);

impl Violations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, field: &str, result: Result<(), ValidationError>) {
        if let Err(err) = result {
            self.0.push(format!("{}: {}", field, err.code));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

/// Runs the derive-level checks, then the domain rules, in one pass.
pub fn validate_payload<T: Validate>(payload: &T, rules: Violations) -> Result<(), AppError> {
    payload.validate()?;
    rules.into_result()
}
