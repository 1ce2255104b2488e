use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No exact match found for '{symbol}'. Candidates: {candidates:?}")]
    SymbolNotFound {
        symbol: String,
        candidates: Vec<String>,
    },

    #[error("Response is missing {0}")]
    MissingField(&'static str),

    #[error("Client configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    /// Short name of the failure class, recorded in debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Http(e) if e.is_timeout() => "timeout",
            ProviderError::Http(e) if e.is_connect() => "connect",
            ProviderError::Http(_) => "http",
            ProviderError::Parse(_) => "parse",
            ProviderError::Api { .. } => "api",
            ProviderError::SymbolNotFound { .. } => "symbol_not_found",
            ProviderError::MissingField(_) => "missing_field",
            ProviderError::Config(_) => "config",
        }
    }
}
