//! The downloader-backed data provider.
//!
//! `fetch(key)` returns the artifact at `key`, downloading it first when the
//! staleness policy asks for it. Download failures never reach the caller:
//! they are logged and whatever is on disk is served.

use crate::calendar::CalendarReference;
use crate::config::ProviderConfig;
use crate::coordinator::{DownloadCoordinator, FetchOutcome};
use crate::downloader::{DownloadRequest, DownloaderRegistry, RemoteDownloader};
use crate::error::{ConfigError, DataError, KeyError};
use crate::grouping::prepare_groups;
use crate::key::{ArtifactKey, KeyCodec, PathKeyCodec};
use crate::staleness::StalenessPolicy;
use crate::time_range::{FetchWindow, TimeRangeResolver};
use crate::warnings::WarningRegistry;
use crate::writer::{ParquetStore, PersistenceWriter, WriteTarget};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct DownloaderDataProvider {
    data_dir: PathBuf,
    codec: Arc<dyn KeyCodec>,
    resolver: TimeRangeResolver,
    downloader: Arc<dyn RemoteDownloader>,
    writer: Arc<dyn PersistenceWriter>,
    coordinator: DownloadCoordinator,
    warnings: Arc<WarningRegistry>,
    custom_data_noted: AtomicBool,
}

impl DownloaderDataProvider {
    /// Wire a provider from explicit collaborators.
    pub fn new(
        data_dir: impl Into<PathBuf>,
        codec: Arc<dyn KeyCodec>,
        calendar: Arc<dyn CalendarReference>,
        downloader: Arc<dyn RemoteDownloader>,
        writer: Arc<dyn PersistenceWriter>,
        policy: StalenessPolicy,
    ) -> Self {
        let warnings = Arc::new(WarningRegistry::new());
        Self {
            data_dir: data_dir.into(),
            codec,
            resolver: TimeRangeResolver::new(calendar, Arc::clone(&warnings)),
            downloader,
            writer,
            coordinator: DownloadCoordinator::new(policy),
            warnings,
            custom_data_noted: AtomicBool::new(false),
        }
    }

    /// Build the provider described by `config`, writing Parquet artifacts
    /// under its data directory.
    ///
    /// Fails when no downloader is configured or the name is not registered.
    pub fn from_config(
        config: &ProviderConfig,
        registry: &DownloaderRegistry,
    ) -> Result<Self, ConfigError> {
        let downloader = registry.create(config)?;
        let calendar = config.market_calendar()?;
        let policy = config.staleness_policy()?;
        let codec = PathKeyCodec::new(config.listing_directory());
        let writer = ParquetStore::new(&config.data_dir);

        tracing::info!(
            downloader = downloader.name(),
            data_dir = %config.data_dir.display(),
            update_period_days = config.data_update_period_days,
            "data provider ready"
        );

        Ok(Self::new(
            &config.data_dir,
            Arc::new(codec),
            Arc::new(calendar),
            downloader,
            Arc::new(writer),
            policy,
        ))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn downloader_name(&self) -> &str {
        self.downloader.name()
    }

    pub fn warnings(&self) -> &WarningRegistry {
        &self.warnings
    }

    /// Keys with a download in progress.
    pub fn in_flight_count(&self) -> usize {
        self.coordinator.in_flight_count()
    }

    /// On-disk location of `key`. Relative keys resolve under the data root.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        let key_path = Path::new(key);
        if key_path.is_absolute() {
            key_path.to_path_buf()
        } else {
            self.data_dir.join(key_path)
        }
    }

    pub fn parse_key(&self, key: &str) -> Result<ArtifactKey, KeyError> {
        self.codec.parse(key)
    }

    /// Window a download of `key` would cover at `now`.
    pub fn window(&self, key: &str, now: DateTime<Utc>) -> Result<Option<FetchWindow>, KeyError> {
        let artifact = self.codec.parse(key)?;
        Ok(self.resolver.resolve(&artifact, now))
    }

    /// Whether `fetch` at `now` would consult the downloader.
    pub fn needs_fetch(&self, key: &str, now: DateTime<Utc>) -> bool {
        let artifact = self.codec.parse(key).ok();
        self.coordinator
            .policy()
            .needs_fetch(artifact.as_ref(), &self.artifact_path(key), now)
    }

    /// Open the artifact at `key`, downloading it first if needed.
    pub fn fetch(&self, key: &str) -> Option<File> {
        self.fetch_at(key, Utc::now())
    }

    pub fn fetch_at(&self, key: &str, now: DateTime<Utc>) -> Option<File> {
        self.fetch_with_outcome(key, now).file
    }

    /// Like [`fetch_at`](Self::fetch_at), also reporting what this caller did.
    pub fn fetch_with_outcome(&self, key: &str, now: DateTime<Utc>) -> FetchOutcome {
        let path = self.artifact_path(key);
        let artifact = match self.codec.parse(key) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                tracing::debug!(key, error = %e, "key does not decode; nothing to download");
                None
            }
        };

        let flight_key = path.to_string_lossy().into_owned();
        self.coordinator
            .fetch_with_outcome(&flight_key, artifact.as_ref(), &path, now, || {
                match &artifact {
                    Some(artifact) => self.download(artifact, now),
                    None => Ok(()),
                }
            })
    }

    /// Download the window for `artifact` and persist it per symbol.
    fn download(&self, artifact: &ArtifactKey, now: DateTime<Utc>) -> Result<(), DataError> {
        let symbol = &artifact.symbol;
        if symbol.security_type.is_custom() && !self.writer.supports_custom_data() {
            if !self.custom_data_noted.swap(true, Ordering::Relaxed) {
                tracing::info!(
                    %symbol,
                    "writer does not support custom data; custom artifacts are not downloaded"
                );
            }
            return Ok(());
        }

        let Some(window) = self.resolver.resolve(artifact, now) else {
            tracing::debug!(%artifact, "no complete data to download yet");
            return Ok(());
        };

        let request = DownloadRequest::new(artifact, window);
        let bars = self.downloader.get(&request)?;
        if bars.is_empty() {
            tracing::debug!(%artifact, %window, "downloader returned no data");
            return Ok(());
        }

        let received = bars.len();
        let groups = prepare_groups(bars, artifact.payload);
        let time_zone = self.resolver.data_time_zone(symbol);
        for group in &groups {
            let target = WriteTarget {
                requested: artifact,
                symbol: &group.symbol,
                time_zone,
            };
            self.writer.write(&target, &group.bars)?;
        }

        tracing::info!(
            %artifact,
            %window,
            downloader = self.downloader.name(),
            received,
            symbols = groups.len(),
            "artifact downloaded"
        );
        Ok(())
    }
}
