//! Remote downloaders and the registry that binds one by name.
//!
//! A downloader only knows how to pull bars for a symbol and window. The
//! cache, staleness and persistence live above this trait.

pub mod csv_dir;
pub mod yahoo;

pub use csv_dir::CsvDirectoryDownloader;
pub use yahoo::YahooDownloader;

use crate::config::ProviderConfig;
use crate::domain::{MarketBar, Resolution, Symbol, TickType};
use crate::error::{ConfigError, DataError};
use crate::key::ArtifactKey;
use crate::time_range::FetchWindow;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One remote request: a symbol (possibly a chain root) over `[start_utc, end_utc)`.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRequest {
    pub symbol: Symbol,
    pub resolution: Resolution,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub tick_type: TickType,
}

impl DownloadRequest {
    pub fn new(key: &ArtifactKey, window: FetchWindow) -> Self {
        Self {
            symbol: key.symbol.clone(),
            resolution: key.resolution,
            start_utc: window.start_utc,
            end_utc: window.end_utc,
            tick_type: key.tick_type,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start_utc <= instant && instant < self.end_utc
    }
}

/// A source of market data.
///
/// For a chain root the result may span many concrete member symbols.
/// An empty result means the source has nothing for the window.
pub trait RemoteDownloader: Send + Sync {
    /// Human-readable name of this downloader.
    fn name(&self) -> &str;

    fn get(&self, request: &DownloadRequest) -> Result<Vec<MarketBar>, DataError>;
}

/// Builds a downloader from the provider config.
pub type DownloaderConstructor =
    Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn RemoteDownloader>, ConfigError> + Send + Sync>;

/// Name → constructor table for downloaders selectable from config.
pub struct DownloaderRegistry {
    constructors: BTreeMap<String, DownloaderConstructor>,
}

impl Default for DownloaderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl DownloaderRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with `csv` and `yahoo`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("csv", |config| {
            Ok(Arc::new(CsvDirectoryDownloader::new(&config.csv.source_dir)))
        });
        registry.register("yahoo", |config| {
            Ok(Arc::new(YahooDownloader::new(&config.yahoo)?))
        });
        registry
    }

    /// Register (or replace) a constructor. Names are case-insensitive.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn RemoteDownloader>, ConfigError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors
            .insert(name.to_ascii_lowercase(), Box::new(constructor));
    }

    /// Register a ready-made instance under `name`.
    pub fn register_instance(&mut self, name: &str, downloader: Arc<dyn RemoteDownloader>) {
        self.register(name, move |_| Ok(Arc::clone(&downloader)));
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Build the downloader named by `data_downloader`.
    pub fn create(&self, config: &ProviderConfig) -> Result<Arc<dyn RemoteDownloader>, ConfigError> {
        let known = self.names().join(", ");
        let name = match config.data_downloader.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name,
            _ => return Err(ConfigError::MissingDownloader { known }),
        };
        let constructor = self
            .constructors
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| ConfigError::UnknownDownloader {
                name: name.to_string(),
                known,
            })?;
        constructor(config)
    }
}
