use std::time::Duration;

use chrono_tz::Tz;
use growfin_core::params::MARKET_TIMEZONE;
use growfin_core::timestamp::resolve_timezone;

use crate::error::ProviderError;

pub const GROWW_API_BASE_URL: &str = "https://groww.in/v1/api";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Settings for [`GrowwClient`](crate::client::GrowwClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub user_agent: String,
    /// `None` keeps reqwest's default (no timeout).
    pub timeout: Option<Duration>,
    /// Zone request windows are localized in.
    pub market_timezone: Tz,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: GROWW_API_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            market_timezone: MARKET_TIMEZONE,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `GROWFIN_BASE_URL`, `GROWFIN_TIMEOUT_SECS` and
    /// `GROWFIN_MARKET_TZ` where set.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ProviderError> {
        let mut config = Self::default();

        if let Some(base_url) = lookup("GROWFIN_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(secs) = lookup("GROWFIN_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ProviderError::Config(format!("GROWFIN_TIMEOUT_SECS is not a number: {secs}"))
            })?;
            config.timeout = Some(Duration::from_secs(secs));
        }

        if let Some(name) = lookup("GROWFIN_MARKET_TZ") {
            config.market_timezone =
                resolve_timezone(&name).map_err(|e| ProviderError::Config(e.to_string()))?;
        }

        Ok(config)
    }
}
