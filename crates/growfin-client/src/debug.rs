use tracing::debug;

/// Optional per-call diagnostic sink.
///
/// Operations take `&mut DebugLog` and record what they send and receive.
/// Every line is also emitted as a `tracing` debug event. A disabled log
/// records nothing and never builds the line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugLog {
    lines: Option<Vec<String>>,
}

impl DebugLog {
    pub fn enabled() -> Self {
        Self {
            lines: Some(Vec::new()),
        }
    }

    pub fn disabled() -> Self {
        Self { lines: None }
    }

    pub fn new(enabled: bool) -> Self {
        if enabled {
            Self::enabled()
        } else {
            Self::disabled()
        }
    }

    pub fn record(&mut self, line: impl FnOnce() -> String) {
        if let Some(lines) = self.lines.as_mut() {
            let line = line();
            debug!(target: "growfin::debug", "{line}");
            lines.push(line);
        }
    }

    /// Recorded lines, `None` when disabled.
    pub fn lines(&self) -> Option<&[String]> {
        self.lines.as_deref()
    }
}
