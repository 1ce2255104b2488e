use chrono::NaiveDate;
use thiserror::Error;

/// Caller-input errors, raised before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Interval {minutes} minutes is not supported. Supported intervals: {supported:?}")]
    UnsupportedInterval { minutes: u32, supported: Vec<u32> },

    #[error("Interval {minutes} minutes is not supported for live data. Supported intervals: {supported:?}")]
    UnsupportedLiveInterval { minutes: u32, supported: Vec<u32> },

    #[error(
        "Cannot specify both lookback_days and date range. Provide either lookback_days or both start_date and end_date."
    )]
    ConflictingRange,

    #[error("Must provide either lookback_days or both start_date and end_date.")]
    MissingRange,

    #[error(
        "Lookback period {days} days exceeds maximum allowed {max_days} days for {interval_minutes}-minute interval"
    )]
    LookbackTooLong {
        days: u32,
        max_days: u32,
        interval_minutes: u32,
    },

    #[error("Start date {start} must be before or equal to end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error(
        "Date range extends beyond {max_days} days limit for {interval_minutes}-minute interval. Start: {start_age_days} days ago, End: {end_age_days} days ago"
    )]
    RangeTooOld {
        max_days: u32,
        interval_minutes: u32,
        start_age_days: i64,
        end_age_days: i64,
    },

    #[error("Invalid date format: '{0}'. Expected 'YYYY-MM-DD'")]
    InvalidDate(String),

    #[error("Invalid datetime format: '{0}'. Expected 'YYYY-MM-DD HH:MM'")]
    InvalidDateTime(String),

    #[error("Unknown timezone: '{0}'")]
    UnknownTimezone(String),

    #[error("Local time '{input}' does not exist in timezone {timezone}")]
    NonexistentLocalTime { input: String, timezone: String },

    #[error("Batch size must be at least one day")]
    EmptyBatchSize,
}

/// Errors from converting candles into tables and writing them out.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
