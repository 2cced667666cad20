//! Main application entry point (CLI binary).
//!
//! This is a thin wrapper around the `rest_engine` library that handles:
//! - Command-line argument parsing
//! - Environment variable loading (.env file)
//! - Logger initialization
//! - Ctrl-C cancellation of the in-flight request
//! - User-facing output formatting

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;

use rest_engine::config::Cli;
use rest_engine::cookies::default_cookie_path;
use rest_engine::initialization::init_logger_with;
use rest_engine::{
    parse_request_text, CookieStore, HttpClient, HttpResponseRecord, LogWarningSink,
    SendOutcome, WarningSink,
};

/// Exit status after Ctrl-C, as shells report SIGINT.
const EXIT_CANCELLED: i32 = 130;

/// Warning sink that logs and also prints to stderr, so policy warnings are
/// visible at the default log level.
struct ConsoleWarningSink;

impl WarningSink for ConsoleWarningSink {
    fn warn(&self, message: &str) {
        LogWarningSink.warn(message);
        eprintln!("{} {}", "warning:".yellow().bold(), message);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file (if it exists), e.g. RUST_LOG
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logger_with(cli.log_level.clone().into(), cli.log_format.clone())
        .context("Failed to initialize logger")?;

    match run(cli).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            eprintln!("Request cancelled");
            process::exit(EXIT_CANCELLED);
        }
        Err(e) => {
            eprintln!("rest_engine error: {:#}", e);
            process::exit(1);
        }
    }
}

/// Sends the request named on the command line. `None` when cancelled.
async fn run(cli: Cli) -> Result<Option<HttpResponseRecord>> {
    let settings = cli.request_settings()?;

    let text = tokio::fs::read_to_string(&cli.file)
        .await
        .with_context(|| format!("Failed to read request file {}", cli.file.display()))?;
    let source_path = std::fs::canonicalize(&cli.file).unwrap_or_else(|_| cli.file.clone());
    let descriptor = parse_request_text(&text, Some(&source_path))
        .with_context(|| format!("Failed to parse request file {}", cli.file.display()))?;

    let cookie_path = cli.cookie_file.clone().unwrap_or_else(default_cookie_path);
    let cookies = Arc::new(CookieStore::new(cookie_path).context("Failed to open cookie jar")?);
    let client = HttpClient::new(cookies).with_warning_sink(Arc::new(ConsoleWarningSink));

    if cli.clear_cookies {
        client
            .clear_cookies()
            .await
            .context("Failed to clear cookies")?;
    }

    let (handle, request) = client.start(descriptor, settings);
    let cancel = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    match request.await? {
        SendOutcome::Completed(record) => {
            print_record(&record, cli.verbose);
            Ok(Some(record))
        }
        SendOutcome::Cancelled => Ok(None),
    }
}

fn print_record(record: &HttpResponseRecord, verbose: bool) {
    if verbose {
        println!("{} {}", record.request.method, record.request.url);
        for (name, value) in &record.request.headers {
            println!("{}: {}", name.cyan(), value);
        }
        println!();
    }

    let status = format!("{} {}", record.status_code, record.status_message);
    let status = if record.status_code < 400 {
        status.green()
    } else {
        status.red()
    };
    println!("{} {}", record.http_version, status.bold());

    if verbose {
        for (name, value) in &record.headers {
            println!("{}: {}", name.cyan(), value);
        }
    }
    println!();
    println!("{}", record.body);

    let timing = &record.timing_phases;
    eprintln!(
        "{}",
        format!(
            "{} bytes body, {} bytes headers | dns {} | first byte {}ms | download {}ms | total {}ms",
            record.body_size_in_bytes,
            record.headers_size_in_bytes,
            timing
                .dns
                .map(|d| format!("{}ms", d.as_millis()))
                .unwrap_or_else(|| "-".to_string()),
            timing.first_byte.as_millis(),
            timing.download.as_millis(),
            timing.total.as_millis()
        )
        .dimmed()
    );
}
