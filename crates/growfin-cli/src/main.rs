use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, Utc};
use clap::{Args, Parser, Subcommand};
use growfin_client::client::GrowwClient;
use growfin_client::config::ClientConfig;
use growfin_client::debug::DebugLog;
use growfin_client::envelope::Envelope;
use growfin_client::ticker::Ticker;
use growfin_core::candle::CandleSet;
use growfin_core::params::{self, RequestWindow, Window};
use growfin_core::table;
use growfin_core::timestamp::DATETIME_FORMAT;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser)]
#[command(
    name = "growfin",
    about = "Fetch NSE candles, company info, news and events from Groww"
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Include request diagnostics in the printed envelope
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
struct RangeArgs {
    /// Candle interval in minutes: 1, 5, 10, 15, 30, 60, 240, 1440
    #[arg(short, long)]
    interval: u32,

    /// Days to look back from now
    #[arg(long)]
    lookback: Option<u32>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    start: Option<String>,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the request windows a history call would use, without fetching
    Windows {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Fetch historical candles
    History {
        /// NSE symbol (e.g. RELIANCE)
        #[arg(short, long)]
        symbol: String,

        #[command(flatten)]
        range: RangeArgs,

        /// Also write the candles to a Parquet file
        #[arg(long)]
        parquet: Option<PathBuf>,
    },

    /// Fetch today's intraday candles
    Live {
        #[arg(short, long)]
        symbol: String,

        /// Candle interval in minutes (intraday only)
        #[arg(short, long)]
        interval: u32,

        /// Fetch even on a weekend
        #[arg(long)]
        any_day: bool,
    },

    /// Company header and static price data
    Info {
        #[arg(short, long)]
        symbol: String,
    },

    /// Recent news articles
    News {
        #[arg(short, long)]
        symbol: String,

        #[arg(long, default_value_t = 0)]
        page: u32,

        #[arg(long, default_value_t = 10)]
        size: u32,
    },

    /// Corporate actions
    Events {
        #[arg(short, long)]
        symbol: String,
    },

    /// Raw search results for a query
    Search {
        #[arg(short, long)]
        query: String,
    },
}

#[derive(Debug, Serialize)]
struct WindowRow {
    start: String,
    end: String,
    interval: u32,
    start_millis: i64,
    end_millis: i64,
}

/// Print the envelope as pretty JSON and map it to the process exit status.
fn print_envelope<T: Serialize>(envelope: &Envelope<T>) -> Result<ExitCode> {
    let json = serde_json::to_string_pretty(envelope).context("failed to serialize output")?;
    println!("{json}");
    Ok(if fetch_failed(envelope) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Nothing came back and at least one error was reported. Partial results
/// still count as success.
fn fetch_failed<T>(envelope: &Envelope<T>) -> bool {
    envelope.data.is_none() && !envelope.is_ok()
}

fn plan_windows(
    range: &RangeArgs,
    now: NaiveDateTime,
    config: &ClientConfig,
) -> Result<Vec<WindowRow>, growfin_core::error::ValidationError> {
    let request = params::validate(
        range.interval,
        range.lookback,
        range.start.as_deref(),
        range.end.as_deref(),
        now,
    )?;
    let windows: Vec<Window> = request.windows(now)?;
    let converted: Vec<RequestWindow> =
        params::to_request_windows(request.interval, &windows, config.market_timezone)?;

    Ok(windows
        .iter()
        .zip(converted)
        .map(|(w, r)| WindowRow {
            start: w.start.format(DATETIME_FORMAT).to_string(),
            end: w.end.format(DATETIME_FORMAT).to_string(),
            interval: r.interval.minutes(),
            start_millis: r.start_millis,
            end_millis: r.end_millis,
        })
        .collect())
}

/// Resolve `symbol`, printing a failed envelope when the lookup fails.
async fn resolve(
    client: &GrowwClient,
    symbol: &str,
    log: &mut DebugLog,
) -> Result<Option<Ticker>> {
    match Ticker::resolve(client, symbol, log).await {
        Ok(ticker) => {
            info!(
                "{}: search_id={} company_id={}",
                ticker.symbol(),
                ticker.search_id(),
                ticker.company_id()
            );
            Ok(Some(ticker))
        }
        Err(e) => {
            warn!("{symbol}: lookup failed: {e}");
            let envelope: Envelope<Value> = Envelope::failed(vec![e.to_string()], log);
            print_envelope(&envelope)?;
            Ok(None)
        }
    }
}

fn export_parquet(envelope: &Envelope<CandleSet>, path: &Path) -> Result<()> {
    let Some(set) = &envelope.data else {
        warn!("no candles to write to {}", path.display());
        return Ok(());
    };
    let candles = set.to_candles();
    table::write_parquet(path, &candles)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {} candle(s) to {}", candles.len(), path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = ClientConfig::from_env().context("invalid client configuration")?;
    let client = GrowwClient::with_config(config).context("failed to create Groww client")?;
    let mut log = DebugLog::new(cli.debug);

    let symbol = match &cli.command {
        Commands::Windows { range } => {
            let config = client.config();
            let now = Utc::now()
                .with_timezone(&config.market_timezone)
                .naive_local();
            let envelope = Envelope::from_result(plan_windows(range, now, config), &log);
            return print_envelope(&envelope);
        }
        Commands::Search { query } => {
            return print_envelope(&client.search(query, &mut log).await);
        }
        Commands::History { symbol, .. }
        | Commands::Live { symbol, .. }
        | Commands::Info { symbol }
        | Commands::News { symbol, .. }
        | Commands::Events { symbol } => symbol,
    };

    let Some(ticker) = resolve(&client, symbol, &mut log).await? else {
        return Ok(ExitCode::FAILURE);
    };

    match &cli.command {
        Commands::History { range, parquet, .. } => {
            let envelope = ticker
                .history(
                    range.interval,
                    range.lookback,
                    range.start.as_deref(),
                    range.end.as_deref(),
                    &mut log,
                )
                .await;
            if let Some(path) = parquet {
                export_parquet(&envelope, path)?;
            }
            print_envelope(&envelope)
        }
        Commands::Live {
            interval, any_day, ..
        } => print_envelope(&ticker.live(*interval, !any_day, &mut log).await),
        Commands::Info { .. } => print_envelope(&ticker.info(&mut log).await),
        Commands::News { page, size, .. } => {
            print_envelope(&ticker.news(*page, *size, &mut log).await)
        }
        Commands::Events { .. } => print_envelope(&ticker.events(&mut log).await),
        Commands::Windows { .. } | Commands::Search { .. } => Ok(ExitCode::SUCCESS),
    }
}
