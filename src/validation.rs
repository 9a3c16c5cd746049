//! Input cleaning shared by the form-style endpoints.
//!
//! Free text is trimmed and stripped of markup-significant characters before
//! its length is checked, so limits apply to what is actually stored.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AppError;

lazy_static! {
    static ref UNSAFE_CHARS: Regex = Regex::new(r#"[<>"'&]"#).unwrap();
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn sanitize(input: &str) -> String {
    UNSAFE_CHARS.replace_all(input.trim(), "").into_owned()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trimmed, lower-cased form used as the identity key for accounts.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sanitize a required field and enforce `1..=max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> Result<String, AppError> {
    let clean = sanitize(value);
    if clean.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    check_len(field, &clean, max)?;
    Ok(clean)
}

/// Sanitize an optional field; blank input becomes `None`.
pub fn optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let clean = sanitize(value);
    if clean.is_empty() {
        return Ok(None);
    }
    check_len(field, &clean, max)?;
    Ok(Some(clean))
}

pub fn tags(field: &str, values: &[String], max_items: usize, max_len: usize) -> Result<Vec<String>, AppError> {
    if values.len() > max_items {
        return Err(AppError::Validation(format!(
            "{field} cannot have more than {max_items} items"
        )));
    }
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        let tag = value.trim();
        if tag.is_empty() {
            continue;
        }
        check_len(field, tag, max_len)?;
        out.push(tag.to_string());
    }
    Ok(out)
}

pub fn in_range<T>(field: &str, value: T, min: T, max: T) -> Result<T, AppError>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(AppError::Validation(format!(
            "{field} must be between {min} and {max}"
        )));
    }
    Ok(value)
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} cannot exceed {max} characters"
        )));
    }
    Ok(())
}
