//! Date resolution for feed entries.
//!
//! Feeds disagree on which date field they fill in and how they format it, so
//! each candidate is parsed into a tagged result and the results are chained:
//! published, then last updated, then "now".

use super::normalizer::RawEntry;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Naive layouts tried after RFC 3339 and RFC 2822. Interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
const NAIVE_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DateError {
    #[error("date field is absent")]
    Missing,
    #[error("unrecognized date: {0:?}")]
    Unparsable(String),
}

/// Parses one raw date field.
pub fn parse_date(raw: Option<&str>) -> Result<DateTime<Utc>, DateError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let Some(raw) = raw else {
        return Err(DateError::Missing);
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(naive) = NaiveDate::parse_from_str(raw, NAIVE_DATE_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(naive.and_utc());
    }

    Err(DateError::Unparsable(raw.to_string()))
}

/// Picks the date an entry is filtered on.
///
/// Never fails: an entry without any usable date resolves to `now` and is
/// therefore always considered recent.
pub fn resolve_date(entry: &RawEntry, now: DateTime<Utc>) -> DateTime<Utc> {
    parse_date(entry.date_published.as_deref())
        .or_else(|published_err| {
            tracing::trace!(error = %published_err, "Falling back to last-updated date");
            parse_date(entry.last_updated.as_deref())
        })
        .unwrap_or_else(|updated_err| {
            tracing::debug!(
                title = ?entry.title,
                error = %updated_err,
                "Entry has no usable date, treating as current"
            );
            now
        })
}

/// `now - age_days`, at millisecond precision.
///
/// Ages too large to represent saturate to the earliest instant chrono supports,
/// so everything is kept. A NaN age is treated as zero.
pub fn recency_threshold(now: DateTime<Utc>, age_days: f64) -> DateTime<Utc> {
    // Float-to-int casts saturate; NaN becomes 0
    let millis = (age_days * MS_PER_DAY).round() as i64;
    Duration::try_milliseconds(millis)
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
