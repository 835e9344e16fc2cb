//! Boundary validation for reservation requests.
//!
//! The payload arrives as an untyped [`serde_json::Value`]. It is turned into
//! a [`Candidate`] or a complete list of field errors here and nowhere else;
//! nothing past this module sees unvalidated input.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::{Candidate, Ms};

pub const ROOM_ID: &str = "roomId";
pub const START_TIME: &str = "startTime";
pub const END_TIME: &str = "endTime";

/// Date-time layouts without an offset, read as UTC.
const NAIVE_DATETIME_FORMATS: [&str; 3] =
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every failing field of one payload, in declaration order. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_messages(.0))]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }
}

fn join_messages(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate a raw reservation payload.
///
/// All three fields are checked independently so the caller sees every
/// problem at once. Interval ordering is not checked here.
pub fn validate_reservation(payload: &Value) -> Result<Candidate, FieldErrors> {
    let mut errors = Vec::new();

    let room_id = record(&mut errors, ROOM_ID, room_id(payload.get(ROOM_ID)));
    let start = record(&mut errors, START_TIME, instant(START_TIME, payload.get(START_TIME)));
    let end = record(&mut errors, END_TIME, instant(END_TIME, payload.get(END_TIME)));

    match (room_id, start, end) {
        (Some(room_id), Some(start), Some(end)) => Ok(Candidate { room_id, start, end }),
        _ => Err(FieldErrors(errors)),
    }
}

fn record<T>(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    result: Result<T, String>,
) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(message) => {
            errors.push(FieldError { field, message });
            None
        }
    }
}

fn room_id(value: Option<&Value>) -> Result<String, String> {
    match value {
        None | Some(Value::Null) => Err(format!("{ROOM_ID} is required")),
        Some(Value::String(s)) if s.is_empty() => Err(format!("{ROOM_ID} is required")),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(format!("{ROOM_ID} must be a string")),
    }
}

fn instant(field: &str, value: Option<&Value>) -> Result<Ms, String> {
    match value {
        None | Some(Value::Null) => Err(format!("{field} is required")),
        Some(Value::String(s)) if s.is_empty() => Err(format!("{field} is required")),
        Some(Value::String(s)) => {
            parse_instant(s).ok_or_else(|| format!("{field} must be a valid ISO date string"))
        }
        Some(_) => Err(format!("{field} must be a string in ISO format")),
    }
}

/// Parse an ISO-8601 instant into Unix milliseconds.
///
/// Accepts RFC 3339 (with `Z` or an offset), a date-time without offset
/// (taken as UTC) and a bare date (midnight UTC).
pub fn parse_instant(s: &str) -> Option<Ms> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp_millis())
}
