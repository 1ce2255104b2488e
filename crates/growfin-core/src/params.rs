//! Request parameter validation and batching.
//!
//! A caller asks for candles either by lookback (`N` days back from now) or by
//! an explicit `YYYY-MM-DD` date range. The charting API caps both how old the
//! data may be and how many days a single request may span, so the requested
//! span is validated against [`Interval`] limits and then cut into contiguous
//! windows that each fit in one request.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ValidationError;
use crate::interval::Interval;
use crate::timestamp::{self, DATETIME_FORMAT};

/// Zone the exchange quotes its sessions in. Windows are localized here
/// before conversion to epoch milliseconds.
pub const MARKET_TIMEZONE: Tz = chrono_tz::Asia::Kolkata;

const DAY_OPEN: NaiveTime = NaiveTime::from_hms_opt(0, 1, 0).unwrap();
const DAY_CLOSE: NaiveTime = NaiveTime::from_hms_opt(23, 59, 0).unwrap();

/// How the caller described the span to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// Days back from now.
    Lookback(u32),
    /// Inclusive calendar range.
    Range { start: NaiveDate, end: NaiveDate },
}

/// A validated candle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamRequest {
    pub interval: Interval,
    pub range: RangeSpec,
}

/// One batch of the requested span, minute resolution, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    /// Number of calendar days the window touches.
    pub fn days(&self) -> i64 {
        (self.end.date() - self.start.date()).num_days() + 1
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATETIME_FORMAT),
            self.end.format(DATETIME_FORMAT)
        )
    }
}

/// A window ready to send: epoch milliseconds in the market timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestWindow {
    pub interval: Interval,
    pub start_millis: i64,
    pub end_millis: i64,
}

/// Check the caller's inputs against the interval limits.
///
/// Rules are applied in order and the first violation is returned:
/// supported interval, exactly one of lookback or full range, lookback within
/// the ceiling, then range order and age.
pub fn validate(
    interval_minutes: u32,
    lookback_days: Option<u32>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: NaiveDateTime,
) -> Result<ParamRequest, ValidationError> {
    debug!(
        "validating parameters: interval={interval_minutes}, lookback={lookback_days:?}, start={start_date:?}, end={end_date:?}"
    );

    let interval = Interval::try_from(interval_minutes)?;

    // Blank dates count as absent
    let start_date = start_date.filter(|s| !s.is_empty());
    let end_date = end_date.filter(|s| !s.is_empty());

    let has_date_range = start_date.is_some() || end_date.is_some();
    let range = match (lookback_days, start_date, end_date) {
        (Some(_), _, _) if has_date_range => return Err(ValidationError::ConflictingRange),
        (Some(days), None, None) => validate_lookback(interval, days)?,
        (None, Some(start), Some(end)) => validate_range(interval, start, end, now)?,
        _ => return Err(ValidationError::MissingRange),
    };

    Ok(ParamRequest { interval, range })
}

fn validate_lookback(interval: Interval, days: u32) -> Result<RangeSpec, ValidationError> {
    let max_days = interval.lookback_limit_days();
    if days > max_days {
        return Err(ValidationError::LookbackTooLong {
            days,
            max_days,
            interval_minutes: interval.minutes(),
        });
    }
    Ok(RangeSpec::Lookback(days))
}

fn validate_range(
    interval: Interval,
    start: &str,
    end: &str,
    now: NaiveDateTime,
) -> Result<RangeSpec, ValidationError> {
    let start = timestamp::parse_date(start)?;
    let end = timestamp::parse_date(end)?;

    if start > end {
        return Err(ValidationError::InvertedRange { start, end });
    }

    let max_days = interval.lookback_limit_days();
    let start_age_days = (now - start.and_time(NaiveTime::MIN)).num_days();
    let end_age_days = (now - end.and_time(NaiveTime::MIN)).num_days();
    if start_age_days > i64::from(max_days) || end_age_days > i64::from(max_days) {
        return Err(ValidationError::RangeTooOld {
            max_days,
            interval_minutes: interval.minutes(),
            start_age_days,
            end_age_days,
        });
    }

    Ok(RangeSpec::Range { start, end })
}

impl ParamRequest {
    /// The overall span as datetimes: `(now - lookback, now)` or the range
    /// dates at midnight.
    pub fn span(&self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match self.range {
            RangeSpec::Lookback(days) => (now - TimeDelta::days(i64::from(days)), now),
            RangeSpec::Range { start, end } => {
                (start.and_time(NaiveTime::MIN), end.and_time(NaiveTime::MIN))
            }
        }
    }

    /// Cut the span into windows no longer than the interval allows.
    pub fn windows(&self, now: NaiveDateTime) -> Result<Vec<Window>, ValidationError> {
        let (start, end) = self.span(now);
        debug!("using span {start} to {end}");
        let windows = partition(start, end, self.interval.max_days_per_request())?;
        info!(
            "created {} batch(es) for {}-minute interval",
            windows.len(),
            self.interval.minutes()
        );
        Ok(windows)
    }
}

/// Split `[start, end]` into contiguous day-aligned windows of at most
/// `max_days` calendar days.
///
/// The first window opens at 00:01 on the start date; each following window
/// opens one minute after the previous one closed. Every window closes at
/// 23:59, the last one on the end date. Returns no windows when `start` falls
/// on a later date than `end`.
pub fn partition(
    start: NaiveDateTime,
    end: NaiveDateTime,
    max_days: u32,
) -> Result<Vec<Window>, ValidationError> {
    if max_days == 0 {
        return Err(ValidationError::EmptyBatchSize);
    }

    let last_close = end.date().and_time(DAY_CLOSE);
    let mut windows = Vec::new();
    let mut cursor = start.date().and_time(DAY_OPEN);

    while cursor.date() <= end.date() {
        let batch_end = cursor
            .date()
            .checked_add_days(chrono::Days::new(u64::from(max_days - 1)))
            .map_or(last_close, |d| d.and_time(DAY_CLOSE).min(last_close));

        windows.push(Window {
            start: cursor,
            end: batch_end,
        });
        debug!("created batch {} to {}", cursor, batch_end);

        match batch_end.checked_add_signed(TimeDelta::minutes(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    Ok(windows)
}

/// Convert windows to epoch milliseconds in `tz`.
pub fn to_request_windows(
    interval: Interval,
    windows: &[Window],
    tz: Tz,
) -> Result<Vec<RequestWindow>, ValidationError> {
    windows
        .iter()
        .map(|w| {
            let start_millis = timestamp::naive_to_epoch_millis(tz, w.start)?;
            let end_millis = timestamp::naive_to_epoch_millis(tz, w.end)?;
            debug!("converted batch {w} -> {start_millis}..{end_millis}");
            Ok(RequestWindow {
                interval,
                start_millis,
                end_millis,
            })
        })
        .collect()
}

/// Validate, batch and convert a historical candle request.
pub fn generate_parameters(
    interval_minutes: u32,
    lookback_days: Option<u32>,
    start_date: Option<&str>,
    end_date: Option<&str>,
    now: NaiveDateTime,
    tz: Tz,
) -> Result<Vec<RequestWindow>, ValidationError> {
    let request = validate(interval_minutes, lookback_days, start_date, end_date, now)?;
    let windows = request.windows(now)?;
    let params = to_request_windows(request.interval, &windows, tz)?;
    info!("generated {} parameter set(s)", params.len());
    Ok(params)
}

/// Parameters covering today's session for an intraday interval.
pub fn generate_live_parameters(
    interval_minutes: u32,
    now: NaiveDateTime,
    tz: Tz,
) -> Result<Vec<RequestWindow>, ValidationError> {
    let interval = Interval::try_from(interval_minutes)?;
    if !interval.supports_live() {
        return Err(ValidationError::UnsupportedLiveInterval {
            minutes: interval_minutes,
            supported: Interval::live_minutes(),
        });
    }

    let today = now.date().format("%Y-%m-%d").to_string();
    debug!("generating live parameters for {today}");
    generate_parameters(interval_minutes, None, Some(&today), Some(&today), now, tz)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::SUPPORTED_INTERVALS;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn now() -> NaiveDateTime {
        at(2025, 8, 31, 15, 0)
    }

    fn assert_contiguous(windows: &[Window]) {
        for pair in windows.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + TimeDelta::minutes(1));
        }
    }

    #[test]
    fn lookback_at_ceiling_is_valid_and_one_more_is_not() {
        for interval in SUPPORTED_INTERVALS {
            let ceiling = interval.lookback_limit_days();
            let ok = validate(interval.minutes(), Some(ceiling), None, None, now()).unwrap();
            assert_eq!(ok.range, RangeSpec::Lookback(ceiling));

            let err = validate(interval.minutes(), Some(ceiling + 1), None, None, now())
                .unwrap_err();
            assert_eq!(
                err,
                ValidationError::LookbackTooLong {
                    days: ceiling + 1,
                    max_days: ceiling,
                    interval_minutes: interval.minutes(),
                }
            );
        }
    }

    #[test]
    fn both_modes_conflict() {
        for interval in SUPPORTED_INTERVALS {
            let m = interval.minutes();
            let both = validate(m, Some(5), Some("2025-08-01"), Some("2025-08-10"), now());
            assert_eq!(both.unwrap_err(), ValidationError::ConflictingRange);

            let partial = validate(m, Some(5), Some("2025-08-01"), None, now());
            assert_eq!(partial.unwrap_err(), ValidationError::ConflictingRange);
        }
    }

    #[test]
    fn neither_mode_is_missing() {
        for interval in SUPPORTED_INTERVALS {
            let m = interval.minutes();
            assert_eq!(
                validate(m, None, None, None, now()).unwrap_err(),
                ValidationError::MissingRange
            );
            assert_eq!(
                validate(m, None, Some("2025-08-01"), None, now()).unwrap_err(),
                ValidationError::MissingRange
            );
            assert_eq!(
                validate(m, None, None, Some("2025-08-01"), now()).unwrap_err(),
                ValidationError::MissingRange
            );
        }
    }

    #[test]
    fn interval_checked_before_range() {
        let err = validate(7, Some(5), Some("2025-08-01"), None, now()).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::UnsupportedInterval { minutes: 7, .. }
        ));
    }

    #[test]
    fn malformed_date_is_a_validation_error() {
        let err = validate(5, None, Some("2024/01/15"), Some("2025-08-01"), now()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidDate("2024/01/15".into()));

        let err = validate(5, None, Some("2025-08-01"), Some("01-08-2025"), now()).unwrap_err();
        assert_eq!(err, ValidationError::InvalidDate("01-08-2025".into()));
    }

    #[test]
    fn inverted_range_rejected() {
        let err = validate(5, None, Some("2025-08-10"), Some("2025-08-01"), now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvertedRange {
                start: NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
            }
        );
    }

    #[test]
    fn range_older_than_ceiling_rejected() {
        // 2025-06-01 is 91 days before now
        let err = validate(5, None, Some("2025-06-01"), Some("2025-06-10"), now()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::RangeTooOld {
                max_days: 80,
                interval_minutes: 5,
                start_age_days: 91,
                end_age_days: 82,
            }
        );

        // Daily candles reach back ten years
        assert!(validate(1440, None, Some("2025-06-01"), Some("2025-06-10"), now()).is_ok());
    }

    #[test]
    fn range_at_ceiling_is_valid() {
        // 2025-06-12 00:00 is exactly 80 days and 15 hours before now
        let ok = validate(60, None, Some("2025-06-12"), Some("2025-06-12"), now());
        assert!(ok.is_ok());
        let err = validate(60, None, Some("2025-06-11"), Some("2025-06-12"), now());
        assert!(matches!(err, Err(ValidationError::RangeTooOld { .. })));
    }

    #[test]
    fn lookback_thirty_days_one_minute_interval() {
        let request = validate(1, Some(30), None, None, now()).unwrap();
        let windows = request.windows(now()).unwrap();

        assert_eq!(windows.len(), 5);
        assert_eq!(windows[0].start, at(2025, 8, 1, 0, 1));
        assert_eq!(windows[0].end, at(2025, 8, 7, 23, 59));
        assert_eq!(windows[3].end, at(2025, 8, 28, 23, 59));
        assert_eq!(windows[4].start, at(2025, 8, 29, 0, 0));
        assert_eq!(windows[4].end, at(2025, 8, 31, 23, 59));

        assert!(windows[..4].iter().all(|w| w.days() == 7));
        assert!(windows[4].days() < 7);
        assert_contiguous(&windows);

        let (start, end) = request.span(now());
        assert_eq!(end - start, TimeDelta::days(30));
    }

    #[test]
    fn daily_range_of_45_days_is_one_batch() {
        let request = validate(1440, None, Some("2025-06-01"), Some("2025-07-15"), now()).unwrap();
        let windows = request.windows(now()).unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start, at(2025, 6, 1, 0, 1));
        assert_eq!(windows[0].end, at(2025, 7, 15, 23, 59));
        assert_eq!(windows[0].days(), 45);
    }

    #[test]
    fn range_even_split() {
        // 45 days in 15-day batches
        let now = at(2025, 8, 1, 10, 0);
        let request = validate(5, None, Some("2025-06-01"), Some("2025-07-15"), now).unwrap();
        let windows = request.windows(now).unwrap();

        assert_eq!(windows.len(), 3);
        assert!(windows.iter().all(|w| w.days() == 15));
        assert_eq!(windows[1].start, at(2025, 6, 16, 0, 0));
        assert_eq!(windows[2].end, at(2025, 7, 15, 23, 59));
        assert_contiguous(&windows);
    }

    #[test]
    fn single_day_range() {
        let request = validate(15, None, Some("2025-08-20"), Some("2025-08-20"), now()).unwrap();
        let windows = request.windows(now()).unwrap();
        assert_eq!(
            windows,
            vec![Window {
                start: at(2025, 8, 20, 0, 1),
                end: at(2025, 8, 20, 23, 59),
            }]
        );
    }

    #[test]
    fn batches_cover_span_for_every_interval() {
        for interval in SUPPORTED_INTERVALS {
            let max = interval.max_days_per_request();
            for lookback in [0, 1, max - 1, max, max + 1, interval.lookback_limit_days()] {
                let request = validate(interval.minutes(), Some(lookback), None, None, now())
                    .unwrap();
                let windows = request.windows(now()).unwrap();
                let (start, end) = request.span(now());

                assert_eq!(windows.first().unwrap().start.date(), start.date());
                assert_eq!(windows.last().unwrap().end, end.date().and_time(DAY_CLOSE));
                assert!(windows.iter().all(|w| w.start <= w.end));
                assert!(windows.iter().all(|w| w.days() <= i64::from(max)));
                assert_contiguous(&windows);

                let covered: i64 = windows.iter().map(Window::days).sum();
                assert_eq!(covered, i64::from(lookback) + 1);
            }
        }
    }

    #[test]
    fn partition_rejects_zero_batch_size() {
        let err = partition(at(2025, 8, 1, 0, 0), at(2025, 8, 2, 0, 0), 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyBatchSize);
    }

    #[test]
    fn partition_start_after_end_is_empty() {
        let windows = partition(at(2025, 8, 5, 0, 0), at(2025, 8, 1, 0, 0), 7).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn blank_dates_are_absent() {
        assert_eq!(
            validate(5, None, Some(""), Some("2025-08-10"), now()).unwrap_err(),
            ValidationError::MissingRange
        );
        assert_eq!(
            validate(5, None, Some(""), Some(""), now()).unwrap_err(),
            ValidationError::MissingRange
        );
        let lookback = validate(5, Some(3), Some(""), None, now()).unwrap();
        assert_eq!(lookback.range, RangeSpec::Lookback(3));
    }

    #[test]
    fn windows_convert_across_skipped_midnight() {
        // Santiago skipped 2024-09-08 00:00-01:00, which opens the second batch
        let tz = chrono_tz::America::Santiago;
        let params = generate_parameters(
            1,
            None,
            Some("2024-09-01"),
            Some("2024-09-10"),
            at(2024, 9, 10, 12, 0),
            tz,
        )
        .unwrap();

        assert_eq!(params.len(), 2);
        assert_eq!(
            params[1].start_millis,
            timestamp::to_epoch_millis("2024-09-08 04:00", Some("UTC")).unwrap()
        );
        assert_eq!(params[1].start_millis - params[0].end_millis, 60_000);
        assert_eq!(
            params[1].end_millis,
            timestamp::to_epoch_millis("2024-09-10 23:59", Some("America/Santiago")).unwrap()
        );
    }

    #[test]
    fn request_windows_are_ist_millis() {
        let params = generate_parameters(
            5,
            None,
            Some("2025-08-20"),
            Some("2025-08-20"),
            now(),
            MARKET_TIMEZONE,
        )
        .unwrap();

        assert_eq!(params.len(), 1);
        assert_eq!(params[0].interval, Interval::Min5);
        assert_eq!(
            params[0].start_millis,
            timestamp::to_epoch_millis("2025-08-20 00:01", Some("Asia/Kolkata")).unwrap()
        );
        assert_eq!(
            params[0].end_millis,
            timestamp::to_epoch_millis("2025-08-20 23:59", Some("Asia/Kolkata")).unwrap()
        );
        assert_eq!(
            timestamp::format_epoch_millis(params[0].start_millis, "Asia/Kolkata").unwrap(),
            "2025-08-20 00:01"
        );
    }

    #[test]
    fn generate_parameters_propagates_validation() {
        let err = generate_parameters(3, Some(5), None, None, now(), MARKET_TIMEZONE).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedInterval { .. }));
    }

    #[test]
    fn live_parameters_cover_today() {
        let params = generate_live_parameters(15, now(), MARKET_TIMEZONE).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(
            params[0].start_millis,
            timestamp::to_epoch_millis("2025-08-31 00:01", Some("Asia/Kolkata")).unwrap()
        );
    }

    #[test]
    fn live_rejects_daily_interval() {
        let err = generate_live_parameters(1440, now(), MARKET_TIMEZONE).unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedLiveInterval {
                minutes: 1440,
                supported: vec![1, 5, 10, 15, 30, 60, 240],
            }
        );
    }
}
