//! Timestamp helpers.
//!
//! The reporting tool consumes dates as fixed-width numeric-string codes
//! (`YYYYMMDD` and `YYYYMMDDHH`), zero-padded. That exact shape is a
//! compatibility contract, so the codes are formatted from parsed components
//! rather than sliced out of the input string.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::AuditError;

/// Convert an RFC 3339 timestamp (e.g. `2017-10-05T15:59:15.905Z`) to a
/// `YYYYMMDD` code (`20171005`).
pub fn date_code(timestamp: &str) -> Result<String, AuditError> {
    let (year, month, day, _) = parse_components(timestamp)?;
    Ok(format!("{:04}{:02}{:02}", year, month, day))
}

/// Convert an RFC 3339 timestamp to a `YYYYMMDDHH` code (`2017100515`).
pub fn date_hour_code(timestamp: &str) -> Result<String, AuditError> {
    let (year, month, day, hour) = parse_components(timestamp)?;
    Ok(format!("{:04}{:02}{:02}{:02}", year, month, day, hour))
}

/// Pull (year, month, day, hour) out of an RFC 3339 timestamp.
fn parse_components(timestamp: &str) -> Result<(u32, u32, u32, u32), AuditError> {
    let bad = || AuditError::Decode(format!("invalid revision timestamp '{}'", timestamp));

    let (date_part, time_part) = timestamp.split_once('T').ok_or_else(bad)?;

    let mut date_fields = date_part.split('-');
    let year: u32 = date_fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let month: u32 = date_fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let day: u32 = date_fields.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    if date_fields.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(bad());
    }

    let hour: u32 = time_part
        .get(..2)
        .and_then(|s| s.parse().ok())
        .filter(|h| *h < 24)
        .ok_or_else(bad)?;

    Ok((year, month, day, hour))
}

/// Generate ISO8601 timestamp for current time.
pub fn now_iso8601() -> String {
    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let days_since_epoch = secs / 86400;
    let time_of_day = secs % 86400;
    let hours = time_of_day / 3600;
    let minutes = (time_of_day % 3600) / 60;
    let seconds = time_of_day % 60;

    // Simplified date calculation (good enough for timestamps)
    let mut year = 1970i32;
    let mut remaining_days = days_since_epoch as i32;

    loop {
        let days_in_year = if is_leap_year(year) { 366 } else { 365 };
        if remaining_days < days_in_year {
            break;
        }
        remaining_days -= days_in_year;
        year += 1;
    }

    let days_in_months: [i32; 12] = if is_leap_year(year) {
        [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    } else {
        [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
    };

    let mut month = 1;
    for days in days_in_months {
        if remaining_days < days {
            break;
        }
        remaining_days -= days;
        month += 1;
    }
    let day = remaining_days + 1;

    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
        year, month, day, hours, minutes, seconds
    )
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
