//! Logging setup: daily-rotated text and JSON files plus a terminal layer.
//!
//! Components only emit `tracing` events; this module decides where they go.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const TEXT_LOG_FILE: &str = "warmer.log";
pub const JSON_LOG_FILE: &str = "warmer.json.log";

/// Keeps the non-blocking writers flushing; drop it only at process exit.
pub struct LogGuards {
    _text: WorkerGuard,
    _json: WorkerGuard,
}

/// Initialize the tracing subscriber with multi-layer setup.
///
/// Creates two log outputs in `log_dir`:
/// 1. `warmer.log` - human-readable text, ANSI colors disabled
/// 2. `warmer.json.log` - structured JSON with span context
///
/// plus a compact stdout layer.
///
/// # Environment Variables
/// * `RUST_LOG` - Controls log level filtering (default: "info")
///   Examples:
///   - `RUST_LOG=debug`
///   - `RUST_LOG=sitemap_warmer=trace,reqwest=warn`
pub fn init_logging<P: AsRef<Path>>(log_dir: P) -> Result<LogGuards, Box<dyn std::error::Error>> {
    let log_path = log_dir.as_ref();
    std::fs::create_dir_all(log_path)?;

    let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref())?;

    let text_file_appender = tracing_appender::rolling::daily(log_path, TEXT_LOG_FILE);
    let (text_writer, text_guard) = tracing_appender::non_blocking(text_file_appender);

    let json_file_appender = tracing_appender::rolling::daily(log_path, JSON_LOG_FILE);
    let (json_writer, json_guard) = tracing_appender::non_blocking(json_file_appender);

    let text_layer = fmt::layer()
        .with_writer(text_writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(false)
        .compact()
        .with_filter(env_filter.clone());

    let json_layer = fmt::layer()
        .json()
        .with_writer(json_writer)
        .with_target(true)
        .with_line_number(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_filter(env_filter.clone());

    // Terminal output stays terse
    let stdout_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(text_layer)
        .with(json_layer)
        .with(stdout_layer)
        .try_init()?;

    tracing::info!("Logging initialized - logs will be written to {}", log_path.display());

    Ok(LogGuards {
        _text: text_guard,
        _json: json_guard,
    })
}

/// Logs go to a "logs" subdirectory of the data directory.
pub fn init_logging_in_data_dir<P: AsRef<Path>>(
    data_dir: P,
) -> Result<LogGuards, Box<dyn std::error::Error>> {
    init_logging(data_dir.as_ref().join("logs"))
}

fn build_filter(directives: Option<&str>) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
    match directives {
        Some(raw) if !raw.trim().is_empty() => EnvFilter::try_new(raw),
        _ => EnvFilter::try_new("info"),
    }
}
