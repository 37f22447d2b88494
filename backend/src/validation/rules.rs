//! Common validation rules shared across request payloads.

use chrono::NaiveDate;
use validator::ValidationError;

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Validates password length.
///
/// Requirements:
/// - At least 8 characters
/// - At most 128 characters
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::new("password_too_short"));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::new("password_too_long"));
    }
    Ok(())
}

/// Rejects empty or whitespace-only values.
pub fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Validates mission reference format.
///
/// Requirements:
/// - 3-40 characters
/// - Letters, digits, `-`, `_` and `/` only
pub fn validate_reference(reference: &str) -> Result<(), ValidationError> {
    let reference = reference.trim();
    if reference.len() < 3 || reference.len() > 40 {
        return Err(ValidationError::new("reference_invalid_length"));
    }
    if !reference
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/'))
    {
        return Err(ValidationError::new("reference_invalid_characters"));
    }
    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::new("end_date_before_start_date"));
    }
    Ok(())
}

pub fn validate_not_in_future(date: NaiveDate, today: NaiveDate) -> Result<(), ValidationError> {
    if date > today {
        return Err(ValidationError::new("date_in_future"));
    }
    Ok(())
}

/// List entries (team members, objectives) must be non-blank and bounded.
pub fn validate_entries(entries: &[String]) -> Result<(), ValidationError> {
    if entries.len() > 50 {
        return Err(ValidationError::new("too_many_entries"));
    }
    if entries
        .iter()
        .any(|entry| entry.trim().is_empty() || entry.len() > 200)
    {
        return Err(ValidationError::new("invalid_entry"));
    }
    Ok(())
}

/// Correction delays are expressed in days, up to two years.
pub fn validate_correction_delay(days: i32) -> Result<(), ValidationError> {
    if !(0..=730).contains(&days) {
        return Err(ValidationError::new("correction_delay_out_of_range"));
    }
    Ok(())
}

pub fn validate_amount(amount: i64) -> Result<(), ValidationError> {
    if amount < 0 {
        return Err(ValidationError::new("amount_negative"));
    }
    Ok(())
}
