use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// Values at or above this are epoch milliseconds rather than seconds
// (10^11 seconds is past the year 5000).
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
}

/// Candle payload as the charting endpoint returns it: rows of
/// `[timestamp, open, high, low, close, volume]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandleSet {
    #[serde(default)]
    pub candles: Vec<Vec<Value>>,
}

impl CandleSet {
    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    /// Parse the raw rows, skipping any that are not six numeric fields.
    pub fn to_candles(&self) -> Vec<Candle> {
        let candles: Vec<Candle> = self.candles.iter().filter_map(|r| parse_row(r)).collect();
        let skipped = self.candles.len() - candles.len();
        if skipped > 0 {
            warn!("skipped {skipped} malformed candle row(s)");
        }
        candles
    }
}

fn parse_row(row: &[Value]) -> Option<Candle> {
    let [ts, open, high, low, close, volume] = row else {
        return None;
    };

    let ts = ts.as_i64().or_else(|| ts.as_f64().map(|v| v as i64))?;
    let timestamp = if ts.abs() >= MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(ts)?
    } else {
        DateTime::from_timestamp(ts, 0)?
    };

    Some(Candle {
        timestamp,
        open: to_decimal(open)?,
        high: to_decimal(high)?,
        low: to_decimal(low)?,
        close: to_decimal(close)?,
        volume: volume
            .as_i64()
            .or_else(|| volume.as_f64().map(|v| v.round() as i64))?,
    })
}

// Goes through the number's shortest decimal text so 629.1 stays 629.1.
fn to_decimal(value: &Value) -> Option<Decimal> {
    let Value::Number(n) = value else {
        return None;
    };
    let text = n.to_string();
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
