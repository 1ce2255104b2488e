use std::time::Instant;

use async_trait::async_trait;
use growfin_core::candle::CandleSet;
use growfin_core::params::RequestWindow;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::debug::DebugLog;
use crate::envelope::Envelope;
use crate::error::ProviderError;
use crate::provider::CandleSource;

const HISTORY_PATH: &str = "charting_service/v2/chart/exchange/NSE/segment/CASH";
const SEARCH_PATH: &str = "search/v3/query/global/st_p_query";
const COMPANY_INFO_PATH: &str = "stocks_data/v1/company/search_id";
const NEWS_PATH: &str = "groww-news/v2/stocks/news";
const EVENTS_PATH: &str = "stocks_data/equity_feature/v2/company/corporate_action/event";

const SEARCH_PAGE_SIZE: u32 = 6;
const BODY_PREVIEW_CHARS: usize = 500;

/// Client for Groww's public web endpoints. No authentication required.
///
/// Every operation returns an [`Envelope`]; transport and decoding failures
/// end up in its `error` field.
#[derive(Debug, Clone)]
pub struct GrowwClient {
    client: Client,
    config: ClientConfig,
}

/// Exact search hit for an NSE symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub nse_scrip_code: String,
    pub bse_scrip_code: Option<String>,
    pub search_id: String,
    pub title: Option<String>,
}

impl GrowwClient {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_config(ClientConfig::default())
    }

    /// Create with a custom base URL (for testing).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_config(ClientConfig {
            base_url: base_url.into(),
            ..ClientConfig::default()
        })
    }

    pub fn with_config(config: ClientConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Raw candles for one request window.
    pub async fn price_history(
        &self,
        ticker: &str,
        window: &RequestWindow,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        log.record(|| "function: price_history".into());
        log.record(|| format!("  ticker: {ticker}"));
        log.record(|| format!("  start: {}", window.start_millis));
        log.record(|| format!("  end: {}", window.end_millis));
        log.record(|| format!("  interval: {}", window.interval.minutes()));

        let url = format!("{}/{HISTORY_PATH}/{ticker}", self.config.base_url);
        let query = [
            ("startTimeInMillis", window.start_millis.to_string()),
            ("endTimeInMillis", window.end_millis.to_string()),
            ("intervalInMinutes", window.interval.minutes().to_string()),
        ];

        let result = match self.get_json(&url, &query, log).await {
            Ok(json) => serde_json::from_value::<CandleSet>(json)
                .map_err(|e| ProviderError::Parse(format!("unexpected candle payload: {e}"))),
            Err(e) => Err(e),
        };

        if let Ok(set) = &result {
            log.record(|| format!("candle count: {}", set.len()));
            log.record(|| format!("sample candles: {:?}", &set.candles[..set.len().min(2)]));
        }
        finish(result, log)
    }

    /// Raw search results for a query string (first page only).
    pub async fn search(&self, query: &str, log: &mut DebugLog) -> Envelope<Value> {
        let result = self.fetch_search(query, log).await;
        finish(result, log)
    }

    /// Static company header and price block for a search id.
    pub async fn company_info(&self, search_id: &str, log: &mut DebugLog) -> Envelope<Value> {
        let result = self.fetch_company_info(search_id, log).await;
        finish(result, log)
    }

    /// One page of news articles for a Groww company id.
    pub async fn news(
        &self,
        company_id: &str,
        page: u32,
        size: u32,
        log: &mut DebugLog,
    ) -> Envelope<Value> {
        log.record(|| "function: news".into());
        log.record(|| format!("  company_id: {company_id}"));
        log.record(|| format!("  page: {page}"));
        log.record(|| format!("  size: {size}"));

        let url = format!("{}/{NEWS_PATH}/{company_id}", self.config.base_url);
        let query = [("page", page.to_string()), ("size", size.to_string())];
        let result = self.get_json(&url, &query, log).await;

        if let Ok(json) = &result
            && let Some(items) = json.get("content").and_then(Value::as_array)
        {
            log.record(|| format!("news items: {}", items.len()));
        }
        finish(result, log)
    }

    /// Corporate actions (dividends, splits, results dates) for a company id.
    pub async fn events(&self, company_id: &str, log: &mut DebugLog) -> Envelope<Value> {
        log.record(|| "function: events".into());
        log.record(|| format!("  company_id: {company_id}"));

        let url = format!("{}/{EVENTS_PATH}", self.config.base_url);
        let query = [("gsin", company_id.to_string())];
        let result = self.get_json(&url, &query, log).await;

        if let Ok(json) = &result
            && let Some(events) = json.get("events").and_then(Value::as_array)
        {
            log.record(|| format!("events: {}", events.len()));
        }
        finish(result, log)
    }

    /// Search for `symbol` and pick the result whose NSE code matches exactly.
    pub async fn resolve_symbol(
        &self,
        symbol: &str,
        log: &mut DebugLog,
    ) -> Result<SymbolMatch, ProviderError> {
        let json = self.fetch_search(symbol, log).await?;
        let found = match_symbol(symbol, &json)?;
        log.record(|| format!("matched {} -> search_id {}", symbol, found.search_id));
        Ok(found)
    }

    /// Groww company id (e.g. `GSTK500325`) for a search id.
    pub async fn company_id(
        &self,
        search_id: &str,
        log: &mut DebugLog,
    ) -> Result<String, ProviderError> {
        let json = self.fetch_company_info(search_id, log).await?;
        let id = company_id_from_info(&json)?;
        log.record(|| format!("company id: {id}"));
        Ok(id)
    }

    async fn fetch_search(&self, query: &str, log: &mut DebugLog) -> Result<Value, ProviderError> {
        log.record(|| "function: search".into());
        log.record(|| format!("  query: {query}"));

        let url = format!("{}/{SEARCH_PATH}", self.config.base_url);
        let params = [
            ("entity_type", "stocks".to_string()),
            ("page", "0".to_string()),
            ("query", query.to_string()),
            ("size", SEARCH_PAGE_SIZE.to_string()),
            ("web", "false".to_string()),
        ];
        self.get_json(&url, &params, log).await
    }

    async fn fetch_company_info(
        &self,
        search_id: &str,
        log: &mut DebugLog,
    ) -> Result<Value, ProviderError> {
        log.record(|| "function: company_info".into());
        log.record(|| format!("  search_id: {search_id}"));

        let url = format!("{}/{COMPANY_INFO_PATH}/{search_id}", self.config.base_url);
        let params = [
            ("fields", "COMPANY_HEADER,STATIC_PRICE".to_string()),
            ("page", "1".to_string()),
            ("size", "10".to_string()),
        ];
        self.get_json(&url, &params, log).await
    }

    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        log: &mut DebugLog,
    ) -> Result<Value, ProviderError> {
        log.record(|| format!("url: {url}"));
        log.record(|| format!("params: {query:?}"));
        debug!("GET {url} {query:?}");

        let started = Instant::now();
        let response = self.client.get(url).query(query).send().await?;
        let status = response.status();

        log.record(|| format!("status: {}", status.as_u16()));
        log.record(|| format!("request url: {}", response.url()));
        log.record(|| format!("elapsed: {:.3}s", started.elapsed().as_secs_f64()));

        let body = response.text().await?;
        log.record(|| {
            let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
            format!("body preview: {preview}")
        });

        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Parse(format!("failed to parse response: {e}")))?;

        log.record(|| match json.as_object() {
            Some(map) => format!("response keys: {:?}", map.keys().collect::<Vec<_>>()),
            None => "response is not a JSON object".into(),
        });
        Ok(json)
    }
}

fn finish<T>(result: Result<T, ProviderError>, log: &mut DebugLog) -> Envelope<T> {
    match &result {
        Ok(_) => log.record(|| "API call successful".into()),
        Err(e) => {
            warn!("request failed: {e}");
            log.record(|| format!("request failed: {e}"));
            log.record(|| format!("error kind: {}", e.kind()));
        }
    }
    Envelope::from_result(result, log)
}

// The search payload nests results under `data.content`; some responses
// carry `content` at the root.
fn search_content(json: &Value) -> &[Value] {
    json.pointer("/data/content")
        .or_else(|| json.get("content"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Pick the search hit whose `nse_scrip_code` equals `symbol`, ignoring case.
pub fn match_symbol(symbol: &str, json: &Value) -> Result<SymbolMatch, ProviderError> {
    let content = search_content(json);
    let wanted = symbol.to_uppercase();

    let text = |item: &Value, key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
    // BSE codes come back as numbers for some listings
    let code = |item: &Value, key: &str| match item.get(key) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };

    for item in content {
        let Some(nse) = text(item, "nse_scrip_code") else {
            continue;
        };
        if nse.to_uppercase() != wanted {
            continue;
        }
        let search_id = text(item, "search_id").ok_or(ProviderError::MissingField("search_id"))?;
        return Ok(SymbolMatch {
            nse_scrip_code: nse,
            bse_scrip_code: code(item, "bse_scrip_code"),
            search_id,
            title: text(item, "title"),
        });
    }

    Err(ProviderError::SymbolNotFound {
        symbol: wanted,
        candidates: content
            .iter()
            .filter_map(|item| text(item, "nse_scrip_code"))
            .collect(),
    })
}

/// Read `header.growwCompanyId` from a company info payload.
pub fn company_id_from_info(json: &Value) -> Result<String, ProviderError> {
    json.pointer("/header/growwCompanyId")
        .or_else(|| json.pointer("/data/header/growwCompanyId"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(ProviderError::MissingField("header.growwCompanyId"))
}

#[async_trait]
impl CandleSource for GrowwClient {
    fn name(&self) -> &str {
        "groww"
    }

    async fn fetch_window(
        &self,
        symbol: &str,
        window: &RequestWindow,
        log: &mut DebugLog,
    ) -> Envelope<CandleSet> {
        self.price_history(symbol, window, log).await
    }
}
