use chrono::{NaiveDateTime, Utc};
use growfin_core::candle::CandleSet;
use growfin_core::params;
use growfin_core::trading_calendar;
use serde_json::Value;
use tracing::debug;

use crate::client::GrowwClient;
use crate::debug::DebugLog;
use crate::envelope::Envelope;
use crate::error::ProviderError;
use crate::provider::fetch_history;

/// An NSE symbol resolved to its Groww identifiers.
#[derive(Debug, Clone)]
pub struct Ticker {
    client: GrowwClient,
    symbol: String,
    search_id: String,
    company_id: String,
}

impl Ticker {
    /// Look the symbol up by exact NSE code and fetch its company id.
    pub async fn resolve(
        client: &GrowwClient,
        symbol: &str,
        log: &mut DebugLog,
    ) -> Result<Self, ProviderError> {
        let symbol = symbol.to_uppercase();
        let found = client.resolve_symbol(&symbol, log).await?;
        let company_id = client.company_id(&found.search_id, log).await?;
        debug!("{symbol}: search_id={} company_id={company_id}", found.search_id);

        Ok(Self::new(client.clone(), &symbol, found.search_id, company_id))
    }

    /// Build from identifiers the caller already knows.
    pub fn new(client: GrowwClient, symbol: &str, search_id: String, company_id: String) -> Self {
        Self {
            client,
            symbol: symbol.to_uppercase(),
            search_id,
            company_id,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn search_id(&self) -> &str {
        &self.search_id
    }

    pub fn company_id(&self) -> &str {
        &self.company_id
    }

    fn market_now(&self) -> NaiveDateTime {
        Utc::now()
            .with_timezone(&self.client.config().market_timezone)
            .naive_local()
    }

    /// Historical candles for either a lookback in days or an inclusive
    /// `YYYY-MM-DD` range, fetched in as many windows as the interval needs.
    pub async fn history(
        &self,
        interval_minutes: u32,
        lookback_days: Option<u32>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        let now = self.market_now();
        self.history_at(interval_minutes, lookback_days, start_date, end_date, now, log)
            .await
    }

    async fn history_at(
        &self,
        interval_minutes: u32,
        lookback_days: Option<u32>,
        start_date: Option<&str>,
        end_date: Option<&str>,
        now: NaiveDateTime,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        log.record(|| format!("function: history ({})", self.symbol));

        let windows = match params::generate_parameters(
            interval_minutes,
            lookback_days,
            start_date,
            end_date,
            now,
            self.client.config().market_timezone,
        ) {
            Ok(windows) => windows,
            Err(e) => {
                log.record(|| format!("validation failed: {e}"));
                return Envelope::failed(vec![e.to_string()], log);
            }
        };
        log.record(|| format!("request windows: {}", windows.len()));

        fetch_history(&self.client, &self.symbol, &windows, log).await
    }

    /// Today's intraday candles. With `check_trading_day`, weekends are
    /// refused without a request.
    pub async fn live(
        &self,
        interval_minutes: u32,
        check_trading_day: bool,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        let now = self.market_now();
        self.live_at(interval_minutes, check_trading_day, now, log).await
    }

    async fn live_at(
        &self,
        interval_minutes: u32,
        check_trading_day: bool,
        now: NaiveDateTime,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        log.record(|| format!("function: live ({})", self.symbol));

        let today = now.date();
        if check_trading_day && !trading_calendar::is_trading_day(today) {
            return Envelope::failed(vec![trading_calendar::market_closed_message(today)], log);
        }

        let windows = match params::generate_live_parameters(
            interval_minutes,
            now,
            self.client.config().market_timezone,
        ) {
            Ok(windows) => windows,
            Err(e) => {
                log.record(|| format!("validation failed: {e}"));
                return Envelope::failed(
                    vec![format!("Failed to generate live parameters: {e}")],
                    log,
                );
            }
        };

        fetch_history(&self.client, &self.symbol, &windows, log).await
    }

    pub async fn info(&self, log: &mut DebugLog) -> Envelope<Value> {
        log.record(|| format!("function: info ({})", self.symbol));
        self.client.company_info(&self.search_id, log).await
    }

    pub async fn news(&self, page: u32, size: u32, log: &mut DebugLog) -> Envelope<Value> {
        log.record(|| format!("function: news ({}, {})", self.symbol, self.company_id));
        self.client.news(&self.company_id, page, size, log).await
    }

    pub async fn events(&self, log: &mut DebugLog) -> Envelope<Value> {
        log.record(|| format!("function: events ({}, {})", self.symbol, self.company_id));
        self.client.events(&self.company_id, log).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_server::serve;
    use chrono::NaiveDate;

    fn offline_ticker() -> Ticker {
        // Nothing listens on port 1
        let client = GrowwClient::with_base_url("http://127.0.0.1:1").unwrap();
        Ticker::new(client, "tcs", "tata-consultancy-services-ltd".into(), "GSTK532540".into())
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn resolve_runs_search_then_company_info() {
        let (base, requests) = serve(vec![
            (
                "200 OK",
                r#"{"data": {"content": [{"nse_scrip_code": "TCS", "search_id": "tata-consultancy-services-ltd"}]}}"#,
            ),
            ("200 OK", r#"{"header": {"growwCompanyId": "GSTK532540"}}"#),
        ])
        .await;
        let client = GrowwClient::with_base_url(base).unwrap();

        let ticker = Ticker::resolve(&client, "tcs", &mut DebugLog::disabled())
            .await
            .unwrap();

        assert_eq!(ticker.symbol(), "TCS");
        assert_eq!(ticker.search_id(), "tata-consultancy-services-ltd");
        assert_eq!(ticker.company_id(), "GSTK532540");
        assert_eq!(
            requests.await.unwrap(),
            vec![
                "/search/v3/query/global/st_p_query?entity_type=stocks&page=0&query=TCS&size=6&web=false",
                "/stocks_data/v1/company/search_id/tata-consultancy-services-ltd?fields=COMPANY_HEADER%2CSTATIC_PRICE&page=1&size=10",
            ]
        );
    }

    #[tokio::test]
    async fn resolve_fails_on_missing_company_id() {
        let (base, _) = serve(vec![
            (
                "200 OK",
                r#"{"content": [{"nse_scrip_code": "TCS", "search_id": "tcs"}]}"#,
            ),
            ("200 OK", r#"{"header": {}}"#),
        ])
        .await;
        let client = GrowwClient::with_base_url(base).unwrap();

        let err = Ticker::resolve(&client, "TCS", &mut DebugLog::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingField("header.growwCompanyId")));
    }

    #[test]
    fn new_uppercases_symbol() {
        let ticker = offline_ticker();
        assert_eq!(ticker.symbol(), "TCS");
        assert_eq!(ticker.company_id(), "GSTK532540");
    }

    #[tokio::test]
    async fn history_validation_error_in_envelope() {
        let ticker = offline_ticker();
        let mut log = DebugLog::disabled();

        let envelope = ticker
            .history(5, Some(10), Some("2025-01-01"), Some("2025-01-05"), &mut log)
            .await;

        assert!(envelope.data.is_none());
        assert_eq!(
            envelope.error.unwrap(),
            vec![
                "Cannot specify both lookback_days and date range. Provide either lookback_days or both start_date and end_date."
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn history_reports_each_failed_batch() {
        let ticker = offline_ticker();
        let mut log = DebugLog::enabled();

        // 30 days of 1-minute candles is 5 windows
        let envelope = ticker
            .history_at(1, Some(30), None, None, at(2025, 8, 31, 15), &mut log)
            .await;

        assert!(envelope.data.is_none());
        assert_eq!(envelope.error.unwrap().len(), 5);
        let debug_info = envelope.debug_info.unwrap();
        assert!(debug_info.iter().any(|l| l == "request windows: 5"));
    }

    #[tokio::test]
    async fn live_refuses_weekend() {
        let ticker = offline_ticker();
        // 2025-08-30 is a Saturday
        let envelope = ticker
            .live_at(5, true, at(2025, 8, 30, 11), &mut DebugLog::disabled())
            .await;

        assert_eq!(
            envelope.error.unwrap(),
            vec!["Today is Saturday, market is closed.".to_string()]
        );
    }

    #[tokio::test]
    async fn live_rejects_daily_interval() {
        let ticker = offline_ticker();
        let envelope = ticker
            .live_at(1440, true, at(2025, 8, 29, 11), &mut DebugLog::disabled())
            .await;

        let errors = envelope.error.unwrap();
        assert!(errors[0].starts_with("Failed to generate live parameters"));
    }
}
