//! Checkout Report Fetcher
//! Walks the checkouts report over a recent date window and saves every page
//! as JSON under a timestamped directory.
//!
//! Environment: `CLIENT_KEY`, `CLIENT_SECRET` (required), `WEBSITE_ID`,
//! `USER_AGENT`, `OUTPUT_DIR` (default `/data`), `LOOKBACK_DAYS` (default 2),
//! `RESUME_CURSOR`, `LOG_FORMAT` (pretty, json or compact), plus the `OVERDRIVE_*` overrides
//! read by the config builder.

use chrono::{Duration, NaiveDate, Utc};
use std::path::PathBuf;

use overdrive_reports::{
    ConfigurationError, FileSink, LogFormat, LoggingConfig, PaginationWalker, ReportsClient,
    ReportsConfigBuilder, ReportsError, WalkOptions,
};

const CHECKOUTS_PATH: &str = "checkouts";
const DEFAULT_OUTPUT_DIR: &str = "/data";
const DEFAULT_LOOKBACK_DAYS: i64 = 2;

/// `startDateUtc`/`endDateUtc` spanning `[today - lookback_days, today]`.
fn date_window(today: NaiveDate, lookback_days: i64) -> Vec<(String, String)> {
    let start = today - Duration::days(lookback_days);
    vec![
        ("startDateUtc".to_string(), start.format("%Y-%m-%d").to_string()),
        ("endDateUtc".to_string(), today.format("%Y-%m-%d").to_string()),
    ]
}

fn lookback_days() -> Result<i64, ReportsError> {
    match std::env::var("LOOKBACK_DAYS") {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| *days >= 0)
            .ok_or_else(|| {
                ConfigurationError::InvalidValue {
                    field: "LOOKBACK_DAYS".to_string(),
                    message: format!("expected a non-negative integer, got {raw:?}"),
                }
                .into()
            }),
        Err(_) => Ok(DEFAULT_LOOKBACK_DAYS),
    }
}

fn log_format() -> Result<LogFormat, ReportsError> {
    std::env::var("LOG_FORMAT")
        .map(|raw| raw.parse())
        .unwrap_or(Ok(LogFormat::Pretty))
}

async fn run() -> Result<(), ReportsError> {
    let config = ReportsConfigBuilder::from_env()?.build()?;
    let client = ReportsClient::new(config)?;

    let now = Utc::now();
    let params = date_window(now.date_naive(), lookback_days()?);
    println!("Date range: {} -> {}", params[0].1, params[1].1);

    let output_base =
        PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| DEFAULT_OUTPUT_DIR.to_string()));
    let mut sink = FileSink::timestamped(&output_base, now);

    let mut options = WalkOptions::new().with_require_success(true);
    if let Ok(cursor) = std::env::var("RESUME_CURSOR") {
        options = options.resume_from(cursor);
    }
    let mut walker = PaginationWalker::new(&client, CHECKOUTS_PATH, params, options);

    match walker.walk(&mut sink).await {
        Ok(summary) => {
            for path in sink.written() {
                println!("Saved: {}", path.display());
            }
            println!(
                "Saved {} responses to '{}'",
                summary.pages_delivered,
                sink.dir().display()
            );
            Ok(())
        }
        Err(e) => {
            if let Some(cursor) = walker.state().pending_cursor() {
                eprintln!("Stopped at {cursor}; set RESUME_CURSOR to continue from it");
            }
            Err(e)
        }
    }
}

#[tokio::main]
async fn main() {
    let logging = log_format().and_then(|format| {
        LoggingConfig::new()
            .with_default_directive("overdrive_reports=info")
            .with_format(format)
            .init()
    });
    if let Err(e) = logging {
        eprintln!("Failed to initialise logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        eprintln!("[{}] {}", e.error_code(), e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_window() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            date_window(today, 2),
            vec![
                ("startDateUtc".to_string(), "2024-02-28".to_string()),
                ("endDateUtc".to_string(), "2024-03-01".to_string()),
            ]
        );
        assert_eq!(date_window(today, 0)[0].1, "2024-03-01");
    }
}
