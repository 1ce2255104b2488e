use std::str::FromStr;

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use tracing::debug;

use crate::error::ValidationError;

/// Format of the datetime strings accepted by [`to_epoch_millis`].
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format of the calendar dates accepted in range mode.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// Widest clock gap in the tz database is a skipped calendar day.
const MAX_GAP_MINUTES: i64 = 2 * 24 * 60;

/// Parse a strict `YYYY-MM-DD` date.
///
/// chrono accepts unpadded fields, so the shape is checked first.
pub fn parse_date(input: &str) -> Result<NaiveDate, ValidationError> {
    let bytes = input.as_bytes();
    let shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shaped {
        return Err(ValidationError::InvalidDate(input.to_string()));
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(input.to_string()))
}

/// Parse a `YYYY-MM-DD HH:MM` string without attaching a zone.
pub fn parse_datetime(input: &str) -> Result<NaiveDateTime, ValidationError> {
    NaiveDateTime::parse_from_str(input, DATETIME_FORMAT)
        .map_err(|_| ValidationError::InvalidDateTime(input.to_string()))
}

/// Look up an IANA zone name.
pub fn resolve_timezone(name: &str) -> Result<Tz, ValidationError> {
    Tz::from_str(name).map_err(|_| ValidationError::UnknownTimezone(name.to_string()))
}

/// Convert a `YYYY-MM-DD HH:MM` string to epoch milliseconds.
///
/// With no zone name the host's local zone is used.
pub fn to_epoch_millis(input: &str, timezone: Option<&str>) -> Result<i64, ValidationError> {
    let naive = parse_datetime(input)?;
    let millis = match timezone {
        Some(name) => {
            let tz = resolve_timezone(name)?;
            localize(&tz, naive, input, name)?.timestamp_millis()
        }
        None => localize(&Local, naive, input, "local")?.timestamp_millis(),
    };
    debug!("converted '{input}' to timestamp {millis}");
    Ok(millis)
}

/// Localize a generated window boundary in `tz` and return epoch
/// milliseconds.
///
/// Unlike [`to_epoch_millis`], a wall-clock time skipped by a forward clock
/// change is not an error: it resolves to the first instant after the gap.
pub fn naive_to_epoch_millis(tz: Tz, naive: NaiveDateTime) -> Result<i64, ValidationError> {
    let input = naive.format(DATETIME_FORMAT).to_string();
    match localize(&tz, naive, &input, tz.name()) {
        Err(ValidationError::NonexistentLocalTime { input, timezone }) => {
            let shifted = first_after_gap(&tz, naive)
                .ok_or(ValidationError::NonexistentLocalTime { input, timezone })?;
            debug!("{naive} is skipped in {}, using {shifted}", tz.name());
            Ok(shifted.timestamp_millis())
        }
        localized => Ok(localized?.timestamp_millis()),
    }
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM` in the named zone.
pub fn format_epoch_millis(millis: i64, timezone: &str) -> Result<String, ValidationError> {
    let tz = resolve_timezone(timezone)?;
    let utc = DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ValidationError::InvalidDateTime(millis.to_string()))?;
    Ok(utc.with_timezone(&tz).format(DATETIME_FORMAT).to_string())
}

// Ambiguous wall-clock times (DST fall-back) resolve to the earlier instant.
fn localize<Z: TimeZone>(
    tz: &Z,
    naive: NaiveDateTime,
    input: &str,
    zone_name: &str,
) -> Result<DateTime<Z>, ValidationError> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest),
        LocalResult::None => Err(ValidationError::NonexistentLocalTime {
            input: input.to_string(),
            timezone: zone_name.to_string(),
        }),
    }
}

fn first_after_gap(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    (1..=MAX_GAP_MINUTES)
        .filter_map(|m| naive.checked_add_signed(TimeDelta::minutes(m)))
        .find_map(|t| tz.from_local_datetime(&t).earliest())
}
