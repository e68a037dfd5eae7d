use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::{Error, Result};

/// Parse date inputs:
/// - "YYYYMMDD" or "YYYY-MM-DD" (midnight UTC)
/// - "YYYY-MM-DDTHH:MM:SS" with optional trailing "Z"
/// - "YYYY-MM-DD HH:MM:SS"
/// - RFC 3339 with offset
pub fn parse_date_like(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();

    if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let d = NaiveDate::parse_from_str(trimmed, "%Y%m%d")
            .map_err(|_| Error::InvalidRequest(format!("invalid YYYYMMDD date: {trimmed}")))?;
        return Ok(midnight(d));
    }

    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(midnight(d));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = trimmed.trim_end_matches('Z');
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(naive, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    Err(Error::InvalidRequest(format!("unsupported date format: {trimmed}")))
}

fn midnight(d: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN))
}

fn ordered(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end < start {
        return Err(Error::InvalidRequest(format!(
            "time range end {end} is before start {start}"
        )));
    }
    Ok(())
}

/// CMR `temporal` value: `2019-03-23T00:00:00Z,2019-03-23T23:59:59Z`.
pub fn temporal_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<String> {
    ordered(start, end)?;
    Ok(format!(
        "{},{}",
        start.format("%Y-%m-%dT%H:%M:%SZ"),
        end.format("%Y-%m-%dT%H:%M:%SZ")
    ))
}

/// Subsetting `time` value. The order service wants it without the zone suffix.
pub fn subset_time_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<String> {
    ordered(start, end)?;
    Ok(format!(
        "{},{}",
        start.format("%Y-%m-%dT%H:%M:%S"),
        end.format("%Y-%m-%dT%H:%M:%S")
    ))
}

/// First and last second of a day.
pub fn whole_day(date: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = parse_date_like(date)?;
    let end = start + chrono::Duration::days(1) - chrono::Duration::seconds(1);
    Ok((start, end))
}

/// Parse a `start,end` pair in any of the forms [`parse_date_like`] accepts.
pub fn parse_range(s: &str) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let Some((a, b)) = s.split_once(',') else {
        return Err(Error::InvalidRequest(format!("expected start,end: {s}")));
    };
    let start = parse_date_like(a)?;
    let end = parse_date_like(b)?;
    ordered(start, end)?;
    Ok((start, end))
}
