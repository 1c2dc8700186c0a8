//! Barvault Core - a fetch-once cache in front of a historical market-data store.
//!
//! This crate contains:
//! - Domain types (symbols, resolutions, tick/payload types, bars)
//! - Artifact keys and the on-disk path layout
//! - Fetch window resolution per exchange time zone
//! - Staleness policy for on-disk artifacts
//! - Single-flight download coordination
//! - Pluggable remote downloaders and persistence writers
//! - The provider tying it together behind `fetch(key)`

pub mod calendar;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod grouping;
pub mod key;
pub mod provider;
pub mod staleness;
pub mod time_range;
pub mod warnings;
pub mod writer;

pub use config::ProviderConfig;
pub use downloader::{DownloadRequest, DownloaderRegistry, RemoteDownloader};
pub use error::{CalendarError, ConfigError, DataError, KeyError};
pub use key::{ArtifactKey, KeyCodec};
pub use provider::DownloaderDataProvider;
pub use time_range::FetchWindow;
pub use writer::{PersistenceWriter, WriteTarget};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared between fetching threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Symbol>();
        require_sync::<domain::Symbol>();
        require_send::<domain::MarketBar>();
        require_sync::<domain::MarketBar>();
        require_send::<ArtifactKey>();
        require_sync::<ArtifactKey>();

        require_send::<coordinator::DownloadCoordinator>();
        require_sync::<coordinator::DownloadCoordinator>();
        require_send::<warnings::WarningRegistry>();
        require_sync::<warnings::WarningRegistry>();
        require_send::<time_range::TimeRangeResolver>();
        require_sync::<time_range::TimeRangeResolver>();
        require_send::<calendar::MarketCalendar>();
        require_sync::<calendar::MarketCalendar>();
        require_send::<key::PathKeyCodec>();
        require_sync::<key::PathKeyCodec>();

        require_send::<downloader::CsvDirectoryDownloader>();
        require_sync::<downloader::CsvDirectoryDownloader>();
        require_send::<downloader::YahooDownloader>();
        require_sync::<downloader::YahooDownloader>();
        require_send::<writer::ParquetStore>();
        require_sync::<writer::ParquetStore>();

        require_send::<DownloaderDataProvider>();
        require_sync::<DownloaderDataProvider>();
    }

    /// Downloaders and writers are used as trait objects behind `Arc`.
    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _downloader(d: &dyn RemoteDownloader, r: &DownloadRequest) {
            let _ = d.get(r);
        }
        fn _writer(w: &dyn PersistenceWriter, t: &WriteTarget<'_>) {
            let _ = w.write(t, &[]);
        }
        fn _codec(c: &dyn KeyCodec) {
            let _ = c.parse("equity/usa/daily/spy_trade.parquet");
        }
    }
}
