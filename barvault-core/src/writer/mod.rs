//! Persistence of downloaded bars.

pub mod parquet;

pub use parquet::{ArtifactMeta, ParquetStore};

use crate::domain::{MarketBar, Symbol};
use crate::error::DataError;
use crate::key::ArtifactKey;
use chrono_tz::Tz;

/// Where one group of bars goes.
#[derive(Debug, Clone, Copy)]
pub struct WriteTarget<'a> {
    /// The artifact that triggered the download.
    pub requested: &'a ArtifactKey,
    /// Concrete symbol every bar in the group belongs to.
    pub symbol: &'a Symbol,
    /// Zone whose local dates partition sub-hourly artifacts.
    pub time_zone: Tz,
}

/// Persists bars for one concrete symbol.
///
/// Called once per symbol group per fetch. Bars arrive sorted by time.
pub trait PersistenceWriter: Send + Sync {
    fn write(&self, target: &WriteTarget<'_>, bars: &[MarketBar]) -> Result<(), DataError>;

    /// Whether custom (user-defined) data can be stored.
    fn supports_custom_data(&self) -> bool {
        false
    }
}
