//! Input validation utilities.
//!
//! Raw request fields are checked here before they reach the store. Every failure is a
//! `RecordsError::Validation` naming the offending field, so the API can return it verbatim.

use crate::{RecordsError, RecordsResult};
use chrono::{DateTime, NaiveDate};
use mobilemed_types::NonEmptyText;
use uuid::Uuid;

/// Requires `value` to contain a non-whitespace character; the result is trimmed.
pub fn required_text(field: &str, value: &str) -> RecordsResult<NonEmptyText> {
    NonEmptyText::new(value)
        .map_err(|_| RecordsError::validation(format!("{field} should not be empty")))
}

/// Parses a calendar date.
///
/// Accepts `YYYY-MM-DD`, or a full RFC 3339 timestamp whose date part is kept.
pub fn calendar_date(field: &str, value: &str) -> RecordsResult<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| {
            RecordsError::validation(format!("{field} must be a valid ISO 8601 date (YYYY-MM-DD)"))
        })
}

/// Parses a UUID in any of the textual forms the `uuid` crate accepts.
pub fn uuid(field: &str, value: &str) -> RecordsResult<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| RecordsError::validation(format!("{field} must be a UUID")))
}
