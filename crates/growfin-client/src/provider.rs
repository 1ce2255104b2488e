use async_trait::async_trait;
use growfin_core::candle::CandleSet;
use growfin_core::params::RequestWindow;
use tracing::{info, warn};

use crate::debug::DebugLog;
use crate::envelope::Envelope;

/// Anything that can return raw candles for one request window.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Source name (for logging/display).
    fn name(&self) -> &str;

    /// Fetch the candles of a single window. Failures are reported in the
    /// envelope, never as a panic.
    async fn fetch_window(
        &self,
        symbol: &str,
        window: &RequestWindow,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet>;
}

/// Fetch every window in order, one request at a time, and concatenate the
/// candles.
///
/// Failed windows contribute their error messages; the envelope's `data` is
/// `None` only when no window returned any candle.
pub async fn fetch_history<S: CandleSource + ?Sized>(
    source: &S,
    symbol: &str,
    windows: &[RequestWindow],
    log: &mut DebugLog,
) -> Envelope<CandleSet> {
    let mut candles = Vec::new();
    let mut errors = Vec::new();

    for (i, window) in windows.iter().enumerate() {
        let result = source.fetch_window(symbol, window, log).await;

        if let Some(errs) = result.error {
            warn!(
                "{symbol}: batch {}/{} from {}: {}",
                i + 1,
                windows.len(),
                source.name(),
                errs.join("; ")
            );
            errors.extend(errs);
        }
        if let Some(mut set) = result.data {
            candles.append(&mut set.candles);
        }
    }

    info!(
        "{symbol}: fetched {} candle(s) in {} batch(es), {} error(s)",
        candles.len(),
        windows.len(),
        errors.len()
    );

    let data = (!candles.is_empty()).then_some(CandleSet { candles });
    Envelope::partial(data, errors, log)
}
