//! Logging for the Zenodo client
//!
//! This module provides:
//! - The [`Logger`] seam the request core reports through
//! - [`TracingLogger`], forwarding to `tracing` with secrets redacted
//! - [`MemoryLogger`], an in-memory sink for tests and inspection
//! - Optional global subscriber setup ([`init_logging`])

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Target used for every event the client emits through `tracing`
pub const LOG_TARGET: &str = "zenodo";

/// Severity of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(name)
    }
}

/// Leveled log sink used by the client
///
/// A session may have no logger at all, in which case nothing is reported.
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Logger forwarding to `tracing` under the `zenodo` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let message = redaction::redact_sensitive(message);
        match level {
            LogLevel::Debug => tracing::debug!(target: LOG_TARGET, "{}", message),
            LogLevel::Info => tracing::info!(target: LOG_TARGET, "{}", message),
            LogLevel::Warn => tracing::warn!(target: LOG_TARGET, "{}", message),
            LogLevel::Error => tracing::error!(target: LOG_TARGET, "{}", message),
        }
    }
}

/// One captured log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

/// Logger that keeps every line in memory, oldest first
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of everything logged so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Messages logged at `level`, oldest first
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|entry| entry.level == level)
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Whether a line at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lock()
            .iter()
            .any(|entry| entry.level == level && entry.message.contains(needle))
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.lock().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

/// Subscriber configuration for [`init_logging`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, used when `RUST_LOG` is unset
    pub level: String,
    /// Output format: compact, full, json
    pub format: LogFormat,
    /// Colored output for the text formats
    pub ansi: bool,
    /// Include thread IDs
    pub thread_ids: bool,
    /// Include file and line numbers
    pub source_location: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact format for production
    Compact,
    /// Full format with all details
    Full,
    /// JSON structured format
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            thread_ids: false,
            source_location: false,
        }
    }
}

impl LoggingConfig {
    /// Apply `ZENODO_LOG_FORMAT` on top of this configuration
    pub fn merge_with_env(&mut self) {
        if let Ok(format) = std::env::var("ZENODO_LOG_FORMAT") {
            match parse_format(&format) {
                Some(parsed) => self.format = parsed,
                None => tracing::warn!("Invalid log format: {}, using default", format),
            }
        }
    }
}

fn parse_format(raw: &str) -> Option<LogFormat> {
    match raw.to_lowercase().as_str() {
        "compact" => Some(LogFormat::Compact),
        "full" => Some(LogFormat::Full),
        "json" => Some(LogFormat::Json),
        _ => None,
    }
}

/// Install a global `tracing` subscriber
///
/// Fails when a global subscriber is already set.
pub fn init_logging(mut config: LoggingConfig) -> Result<()> {
    config.merge_with_env();
    let env_filter = create_env_filter(&config);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(config.thread_ids)
        .with_file(config.source_location)
        .with_line_number(config.source_location);

    let installed = match config.format {
        LogFormat::Compact => tracing::subscriber::set_global_default(
            builder.with_ansi(config.ansi).compact().finish(),
        ),
        LogFormat::Full => {
            tracing::subscriber::set_global_default(builder.with_ansi(config.ansi).finish())
        }
        LogFormat::Json => {
            tracing::subscriber::set_global_default(builder.with_ansi(false).json().finish())
        }
    };

    installed.map_err(|e| Error::Configuration {
        message: format!("Failed to initialize logging: {}", e),
        source: Some(anyhow::anyhow!(e)),
    })?;

    tracing::debug!(target: LOG_TARGET, config = ?config, "Logging system initialized");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn create_env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Sensitive data redaction
pub mod redaction {
    use regex::Regex;
    use std::sync::OnceLock;

    static TOKEN_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    static PASSWORD_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

    fn token_regex() -> Option<&'static Regex> {
        TOKEN_REGEX
            .get_or_init(|| {
                Regex::new(
                    r#"(?i)\b(access_token|token|bearer)([=:\s]+)['"]?([a-zA-Z0-9_.\-]{10,})['"]?"#,
                )
                .ok()
            })
            .as_ref()
    }

    fn password_regex() -> Option<&'static Regex> {
        PASSWORD_REGEX
            .get_or_init(|| {
                Regex::new(r#"(?i)\b(password|passwd|pwd)([=:\s]+)['"]?([^\s'"]{3,})['"]?"#).ok()
            })
            .as_ref()
    }

    /// Redact credentials from a log message
    pub fn redact_sensitive(input: &str) -> String {
        let mut result = input.to_string();
        for regex in [token_regex(), password_regex()].into_iter().flatten() {
            result = regex.replace_all(&result, "${1}${2}***").into_owned();
        }
        result
    }
}
