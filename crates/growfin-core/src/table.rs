//! Arrow/Parquet tables of candles, one row per candle with the timestamp
//! shown both raw and as India Standard Time wall clock.

use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono_tz::Asia::Kolkata;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::candle::Candle;
use crate::error::TableError;

pub const COLUMNS: [&str; 7] = [
    "unix_timestamp",
    "time_ist",
    "open",
    "high",
    "low",
    "close",
    "volume",
];

pub fn candle_schema() -> Schema {
    Schema::new(vec![
        Field::new(COLUMNS[0], DataType::Int64, false),
        // IST wall-clock values, no zone attached
        Field::new(
            COLUMNS[1],
            DataType::Timestamp(TimeUnit::Microsecond, None),
            false,
        ),
        Field::new(COLUMNS[2], DataType::Float64, false),
        Field::new(COLUMNS[3], DataType::Float64, false),
        Field::new(COLUMNS[4], DataType::Float64, false),
        Field::new(COLUMNS[5], DataType::Float64, false),
        Field::new(COLUMNS[6], DataType::Int64, false),
    ])
}

fn price_column(
    candles: &[Candle],
    field: impl Fn(&Candle) -> Decimal,
) -> Result<ArrayRef, TableError> {
    let values = candles
        .iter()
        .map(|c| {
            let price = field(c);
            price
                .to_f64()
                .ok_or_else(|| TableError::InvalidData(format!("price out of range: {price}")))
        })
        .collect::<Result<Vec<f64>, _>>()?;
    Ok(Arc::new(Float64Array::from(values)))
}

pub fn candles_to_record_batch(candles: &[Candle]) -> Result<RecordBatch, TableError> {
    let schema = Arc::new(candle_schema());

    let unix: Vec<i64> = candles.iter().map(|c| c.timestamp.timestamp()).collect();
    let ist: Vec<i64> = candles
        .iter()
        .map(|c| {
            c.timestamp
                .with_timezone(&Kolkata)
                .naive_local()
                .and_utc()
                .timestamp_micros()
        })
        .collect();
    let volumes: Vec<i64> = candles.iter().map(|c| c.volume).collect();

    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(unix)),
        Arc::new(TimestampMicrosecondArray::from(ist)),
        price_column(candles, |c| c.open)?,
        price_column(candles, |c| c.high)?,
        price_column(candles, |c| c.low)?,
        price_column(candles, |c| c.close)?,
        Arc::new(Int64Array::from(volumes)),
    ];

    Ok(RecordBatch::try_new(schema, columns)?)
}

pub fn write_parquet(path: &Path, candles: &[Candle]) -> Result<(), TableError> {
    let batch = candles_to_record_batch(candles)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(())
}
