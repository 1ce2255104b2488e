use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debug::DebugLog;

/// Uniform result of every public client operation.
///
/// `debug_info` is a snapshot of the caller's [`DebugLog`] when the envelope
/// was built, so a log threaded through several calls accumulates across
/// them. It is `None` when the log is disabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T = Value> {
    pub data: Option<T>,
    pub debug_info: Option<Vec<String>>,
    pub error: Option<Vec<String>>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T, log: &DebugLog) -> Self {
        Self {
            data: Some(data),
            debug_info: snapshot(log),
            error: None,
        }
    }

    pub fn failed(errors: Vec<String>, log: &DebugLog) -> Self {
        Self {
            data: None,
            debug_info: snapshot(log),
            error: (!errors.is_empty()).then_some(errors),
        }
    }

    /// Candles from the windows that succeeded alongside the errors of those
    /// that did not.
    pub fn partial(data: Option<T>, errors: Vec<String>, log: &DebugLog) -> Self {
        Self {
            data,
            debug_info: snapshot(log),
            error: (!errors.is_empty()).then_some(errors),
        }
    }

    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>, log: &DebugLog) -> Self {
        match result {
            Ok(data) => Self::ok(data, log),
            Err(e) => Self::failed(vec![e.to_string()], log),
        }
    }

    /// No errors were reported, though `data` may still be empty.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

fn snapshot(log: &DebugLog) -> Option<Vec<String>> {
    log.lines().map(<[String]>::to_vec)
}
