//! Structured error types.
//!
//! Only `ConfigError` ever reaches a caller of the provider. Download and
//! persistence failures are `DataError`s that the coordinator logs and
//! swallows; key and calendar errors are recovered where they occur.

use crate::domain::SecurityType;
use std::path::PathBuf;
use thiserror::Error;

/// Failures on the download-and-persist path.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by source (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("unsupported request: {0}")]
    Unsupported(String),

    #[error("source file error: {0}")]
    SourceFile(String),

    #[error("store error: {0}")]
    StoreError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("data error: {0}")]
    Other(String),
}

/// Fatal initialization failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("'data_downloader' must name a remote downloader (known: {known})")]
    MissingDownloader { known: String },

    #[error("unknown data downloader '{name}' (known: {known})")]
    UnknownDownloader { name: String, known: String },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid time zone '{0}'")]
    InvalidTimeZone(String),

    #[error("invalid setting '{key}': {reason}")]
    Invalid { key: String, reason: String },
}

/// An artifact key that does not decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key '{0}' does not match the artifact layout")]
    Unrecognized(String),

    #[error("key '{key}': {reason}")]
    InvalidComponent { key: String, reason: String },
}

/// No time zone entry for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("no calendar entry for {ticker} ({security_type}) in market '{market}'")]
    NoEntry {
        market: String,
        ticker: String,
        security_type: SecurityType,
    },
}
