use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Candle granularity accepted by the Groww charting service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Interval {
    Min1,
    Min5,
    Min10,
    Min15,
    Min30,
    Min60,
    Min240,
    Day1,
}

/// Every supported interval, in ascending order.
pub const SUPPORTED_INTERVALS: [Interval; 8] = [
    Interval::Min1,
    Interval::Min5,
    Interval::Min10,
    Interval::Min15,
    Interval::Min30,
    Interval::Min60,
    Interval::Min240,
    Interval::Day1,
];

impl Interval {
    pub const fn minutes(self) -> u32 {
        match self {
            Interval::Min1 => 1,
            Interval::Min5 => 5,
            Interval::Min10 => 10,
            Interval::Min15 => 15,
            Interval::Min30 => 30,
            Interval::Min60 => 60,
            Interval::Min240 => 240,
            Interval::Day1 => 1440,
        }
    }

    /// How far back from today the API serves data for this interval.
    pub const fn lookback_limit_days(self) -> u32 {
        match self {
            Interval::Day1 => 3650,
            _ => 80,
        }
    }

    /// Longest span, in calendar days, a single candle request may cover.
    pub const fn max_days_per_request(self) -> u32 {
        match self {
            Interval::Min1 => 7,
            Interval::Min5 => 15,
            Interval::Min10 | Interval::Min15 | Interval::Min30 | Interval::Min60 => 30,
            Interval::Min240 => 60,
            Interval::Day1 => 1000,
        }
    }

    /// Daily candles are not served for the current session.
    pub const fn supports_live(self) -> bool {
        !matches!(self, Interval::Day1)
    }

    pub fn supported_minutes() -> Vec<u32> {
        SUPPORTED_INTERVALS.iter().map(|i| i.minutes()).collect()
    }

    pub fn live_minutes() -> Vec<u32> {
        SUPPORTED_INTERVALS
            .iter()
            .filter(|i| i.supports_live())
            .map(|i| i.minutes())
            .collect()
    }
}

impl TryFrom<u32> for Interval {
    type Error = ValidationError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        SUPPORTED_INTERVALS
            .iter()
            .copied()
            .find(|i| i.minutes() == minutes)
            .ok_or_else(|| ValidationError::UnsupportedInterval {
                minutes,
                supported: Interval::supported_minutes(),
            })
    }
}

impl From<Interval> for u32 {
    fn from(interval: Interval) -> Self {
        interval.minutes()
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}
