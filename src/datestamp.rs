//! Datestamp granularity and encoding.
//!
//! OAI-PMH repositories timestamp items either to the day or to the second,
//! and report which one they support in their Identify response. Date filters
//! sent to a repository must be encoded at the granularity it advertises.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Precision of datestamps a repository supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM-DDThh:mm:ssZ`
    Second,
}

impl Granularity {
    /// The pattern string a repository reports in `<granularity>`.
    pub fn wire_pattern(self) -> &'static str {
        match self {
            Granularity::Day => "YYYY-MM-DD",
            Granularity::Second => "YYYY-MM-DDThh:mm:ssZ",
        }
    }

    /// Maps a reported `<granularity>` pattern back to a variant.
    ///
    /// Returns `None` for any non-standard pattern; the caller decides how
    /// loudly to fail.
    pub fn from_wire(pattern: &str) -> Option<Self> {
        match pattern {
            "YYYY-MM-DD" => Some(Granularity::Day),
            "YYYY-MM-DDThh:mm:ssZ" => Some(Granularity::Second),
            _ => None,
        }
    }
}

/// A datestamp as reported by a repository.
///
/// Which variant appears depends on the granularity the repository runs at.
/// Encoding is symmetric with [`decode`]: a decoded datestamp re-encodes to
/// the exact input string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Datestamp {
    Day(NaiveDate),
    Second(DateTime<Utc>),
}

impl Datestamp {
    /// Re-encodes at the granularity the value was decoded with.
    pub fn encode(&self) -> String {
        match self {
            Datestamp::Day(d) => d.format("%Y-%m-%d").to_string(),
            Datestamp::Second(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }

    /// Widens to a UTC datetime; day-granularity values map to midnight.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        match self {
            Datestamp::Day(d) => d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc(),
            Datestamp::Second(dt) => *dt,
        }
    }
}

/// A datestamp string that matches neither supported granularity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid datestamp '{text}'")]
pub struct DatestampError {
    pub text: String,
}

/// Encodes a datetime for the wire at the given granularity.
///
/// Day granularity truncates to the date; second granularity keeps the full
/// UTC timestamp.
pub fn encode(value: &DateTime<Utc>, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => value.format("%Y-%m-%d").to_string(),
        Granularity::Second => value.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
    }
}

/// Decodes a wire datestamp, inferring the granularity from its shape.
///
/// # Errors
///
/// Returns [`DatestampError`] if the string is neither a `YYYY-MM-DD` date
/// nor a `YYYY-MM-DDThh:mm:ssZ` timestamp.
pub fn decode(text: &str) -> Result<Datestamp, DatestampError> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(Datestamp::Day(date));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(Datestamp::Second(dt.and_utc()));
    }
    Err(DatestampError {
        text: text.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
