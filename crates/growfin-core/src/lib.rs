pub mod candle;
pub mod error;
pub mod interval;
pub mod params;
pub mod table;
pub mod timestamp;
pub mod trading_calendar;
