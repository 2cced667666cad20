//! Logger initialization.
//!
//! `env_logger` with two line formats: colored text for terminals and one
//! JSON object per line for log collectors.

use std::io::Write;

use colored::*;
use log::{Level, LevelFilter, Record};
use serde_json::json;

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

/// Transport crates are noisy below `Info`; `cookie_store` reports every
/// rejected `Set-Cookie` at debug.
const MODULE_CEILINGS: [(&str, LevelFilter); 4] = [
    ("reqwest", LevelFilter::Info),
    ("hyper", LevelFilter::Info),
    ("hyper_util", LevelFilter::Info),
    ("cookie_store", LevelFilter::Warn),
];

/// Initializes the process logger.
///
/// `RUST_LOG` is read first, then `level` overrides it for this crate and as
/// the global default, so `--log-level` always wins.
///
/// ```bash
/// RUST_LOG=rest_engine=debug,reqwest=info rest_engine request.http
/// ```
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already set.
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    for (module, ceiling) in MODULE_CEILINGS {
        builder.filter_module(module, ceiling.min(level));
    }
    builder.filter_module("rest_engine", level);

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                let line = json_line(record, chrono::Utc::now().timestamp_millis());
                writeln!(buf, "{}", line)
            });
        }
        LogFormat::Plain => {
            colored::control::set_override(true);
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{} {:>5} {} {}",
                    chrono::Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    colored_level(record.level()),
                    record.target().cyan(),
                    record.args()
                )
            });
        }
    }

    builder.try_init()?;
    Ok(())
}

fn colored_level(level: Level) -> ColoredString {
    let label = level.as_str();
    match level {
        Level::Error => label.red().bold(),
        Level::Warn => label.yellow(),
        Level::Info => label.green(),
        Level::Debug => label.blue(),
        Level::Trace => label.purple(),
    }
}

fn json_line(record: &Record, ts_millis: i64) -> serde_json::Value {
    json!({
        "ts": ts_millis,
        "level": record.level().as_str(),
        "target": record.target(),
        "msg": record.args().to_string(),
    })
}
