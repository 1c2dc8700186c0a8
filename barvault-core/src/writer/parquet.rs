//! Parquet artifact store.
//!
//! Files follow the layout in [`crate::key`]. Sub-hourly bars are split into
//! one file per local trading date; hour and daily bars go to a single file.
//! A chain-root request writes every member into the chain's own file (option
//! contracts under their underlying, future contracts under the root), so rows
//! carry their ticker.
//!
//! Features:
//! - Atomic writes (unique temp file in the target dir, persisted into place)
//! - Writes to one file are serialized across threads
//! - Merge on write: new rows replace the same symbol's rows over the same span
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per artifact (hash, span, row count)

use super::{PersistenceWriter, WriteTarget};
use crate::domain::MarketBar;
use crate::error::DataError;
use crate::key::{artifact_path, directory_ticker};
use chrono::{DateTime, NaiveDate, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

const COLUMNS: [&str; 7] = ["symbol", "time", "open", "high", "low", "close", "volume"];

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBar {
    pub symbol: String,
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&MarketBar> for StoredBar {
    fn from(bar: &MarketBar) -> Self {
        Self {
            symbol: bar.symbol.ticker.clone(),
            time: bar.time,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Metadata sidecar written next to each artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub symbols: Vec<String>,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
    pub bar_count: usize,
    pub data_hash: String,
    pub written_at: DateTime<Utc>,
}

pub struct ParquetStore {
    data_dir: PathBuf,
    /// One lock per file currently being merged.
    file_locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl ParquetStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            file_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory of the store.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Sidecar path for an artifact: `{file}.meta.json`.
    pub fn meta_path(path: &Path) -> PathBuf {
        path.with_extension("parquet.meta.json")
    }

    /// Load every row of an artifact, sorted by time. `path` may be relative
    /// to the data root.
    pub fn load(&self, path: &Path) -> Result<Vec<StoredBar>, DataError> {
        load_and_validate_parquet(&self.data_dir.join(path))
    }

    /// Sidecar of an artifact, if present and readable.
    pub fn meta(&self, path: &Path) -> Option<ArtifactMeta> {
        let content = fs::read_to_string(Self::meta_path(&self.data_dir.join(path))).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Split `bars` into the files they belong to.
    fn partition<'b>(
        &self,
        target: &WriteTarget<'_>,
        bars: &'b [MarketBar],
    ) -> BTreeMap<PathBuf, Vec<&'b MarketBar>> {
        let requested = target.requested;
        let owner = if requested.symbol.is_chain_root() {
            &requested.symbol
        } else {
            target.symbol
        };
        let path_for = |date: Option<NaiveDate>| {
            self.data_dir.join(artifact_path(
                owner.security_type,
                &owner.market,
                requested.resolution,
                directory_ticker(owner),
                requested.tick_type,
                date,
            ))
        };

        let mut files: BTreeMap<PathBuf, Vec<&MarketBar>> = BTreeMap::new();
        for bar in bars {
            let date = requested
                .resolution
                .is_date_partitioned()
                .then(|| bar.time.with_timezone(&target.time_zone).date_naive());
            files.entry(path_for(date)).or_default().push(bar);
        }
        files
    }

    /// Run `f` while holding the lock for `path`, dropping the entry once no
    /// other writer is waiting on it.
    fn with_file_lock<T>(&self, path: &Path, f: impl FnOnce() -> T) -> T {
        let lock = {
            let mut locks = self.file_locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut locks = self.file_locks.lock().unwrap_or_else(PoisonError::into_inner);
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
        result
    }

    fn write_artifact(&self, path: &Path, ticker: &str, bars: &[&MarketBar]) -> Result<(), DataError> {
        self.with_file_lock(path, || merge_into(path, ticker, bars))
    }
}

/// Merge `bars` into the file at `path`. Callers hold the file's lock.
fn merge_into(path: &Path, ticker: &str, bars: &[&MarketBar]) -> Result<(), DataError> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Ok(());
    };
    let (span_start, span_end) = (first.time, last.time);

    let dir = path
        .parent()
        .ok_or_else(|| DataError::StoreError(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(dir)
        .map_err(|e| DataError::StoreError(format!("failed to create dir: {e}")))?;

    let mut rows: Vec<StoredBar> = if path.exists() {
        match load_and_validate_parquet(path) {
            Ok(existing) => existing
                .into_iter()
                .filter(|r| r.symbol != ticker || r.time < span_start || r.time > span_end)
                .collect(),
            Err(e) => {
                quarantine(path, &e);
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };
    rows.extend(bars.iter().map(|bar| StoredBar::from(*bar)));
    rows.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.symbol.cmp(&b.symbol)));

    let mut df = rows_to_dataframe(&rows)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".parquet.tmp")
        .tempfile_in(dir)
        .map_err(|e| DataError::StoreError(format!("temp file: {e}")))?;
    write_parquet(&mut df, tmp.as_file_mut())?;

    // Atomic rename; the temp file is removed on failure.
    tmp.persist(path)
        .map_err(|e| DataError::StoreError(format!("atomic rename failed: {}", e.error)))?;

    write_meta(path, &rows)?;
    tracing::debug!(
        path = %path.display(),
        symbol = ticker,
        written = bars.len(),
        total = rows.len(),
        "artifact written"
    );
    Ok(())
}

impl PersistenceWriter for ParquetStore {
    fn write(&self, target: &WriteTarget<'_>, bars: &[MarketBar]) -> Result<(), DataError> {
        if bars.is_empty() {
            return Err(DataError::StoreError("no bars to write".into()));
        }
        for (path, file_bars) in self.partition(target, bars) {
            self.write_artifact(&path, &target.symbol.ticker, &file_bars)?;
        }
        Ok(())
    }
}

fn quarantine(path: &Path, error: &DataError) {
    let quarantined = path.with_extension("parquet.quarantined");
    tracing::warn!(
        path = %path.display(),
        error = %error,
        "quarantining corrupt artifact"
    );
    let _ = fs::rename(path, quarantined);
}

fn write_meta(path: &Path, rows: &[StoredBar]) -> Result<(), DataError> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(());
    };
    let mut symbols: Vec<String> = rows.iter().map(|r| r.symbol.clone()).collect();
    symbols.sort();
    symbols.dedup();

    let meta = ArtifactMeta {
        symbols,
        start_utc: first.time,
        end_utc: last.time,
        bar_count: rows.len(),
        data_hash: blake3::hash(
            &serde_json::to_vec(rows)
                .map_err(|e| DataError::StoreError(format!("hash serialization: {e}")))?,
        )
        .to_hex()
        .to_string(),
        written_at: Utc::now(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| DataError::StoreError(format!("meta serialization: {e}")))?;
    fs::write(ParquetStore::meta_path(path), meta_json)
        .map_err(|e| DataError::StoreError(format!("meta write: {e}")))
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn rows_to_dataframe(rows: &[StoredBar]) -> Result<DataFrame, DataError> {
    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let times: Vec<i64> = rows.iter().map(|r| r.time.timestamp_millis()).collect();
    let opens: Vec<f64> = rows.iter().map(|r| r.open).collect();
    let highs: Vec<f64> = rows.iter().map(|r| r.high).collect();
    let lows: Vec<f64> = rows.iter().map(|r| r.low).collect();
    let closes: Vec<f64> = rows.iter().map(|r| r.close).collect();
    let volumes: Vec<f64> = rows.iter().map(|r| r.volume).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("time".into(), times)
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .map_err(|e| DataError::ParquetError(format!("time cast: {e}")))?,
        Column::new("open".into(), opens),
        Column::new("high".into(), highs),
        Column::new("low".into(), lows),
        Column::new("close".into(), closes),
        Column::new("volume".into(), volumes),
    ])
    .map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, out: impl Write) -> Result<(), DataError> {
    ParquetWriter::new(out)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

fn load_and_validate_parquet(path: &Path) -> Result<Vec<StoredBar>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    for col_name in &COLUMNS {
        if df.column(col_name).is_err() {
            return Err(DataError::ParquetError(format!(
                "missing column '{col_name}'"
            )));
        }
    }

    dataframe_to_rows(&df)
}

fn dataframe_to_rows(df: &DataFrame) -> Result<Vec<StoredBar>, DataError> {
    let column = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::ParquetError(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| {
        DataError::ParquetError(format!("{name} column type: {e}"))
    };

    let symbol_ca = column("symbol")?.str().map_err(|e| type_err("symbol", e))?;
    let time_ca = column("time")?
        .datetime()
        .map_err(|e| type_err("time", e))?;
    let open_ca = column("open")?.f64().map_err(|e| type_err("open", e))?;
    let high_ca = column("high")?.f64().map_err(|e| type_err("high", e))?;
    let low_ca = column("low")?.f64().map_err(|e| type_err("low", e))?;
    let close_ca = column("close")?.f64().map_err(|e| type_err("close", e))?;
    let volume_ca = column("volume")?.f64().map_err(|e| type_err("volume", e))?;

    let n = df.height();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let symbol = symbol_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null symbol at row {i}")))?;
        let millis = time_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null time at row {i}")))?;
        let time = DateTime::<Utc>::from_timestamp_millis(millis)
            .ok_or_else(|| DataError::ParquetError(format!("time out of range at row {i}")))?;

        rows.push(StoredBar {
            symbol: symbol.to_string(),
            time,
            open: open_ca.get(i).unwrap_or(f64::NAN),
            high: high_ca.get(i).unwrap_or(f64::NAN),
            low: low_ca.get(i).unwrap_or(f64::NAN),
            close: close_ca.get(i).unwrap_or(f64::NAN),
            volume: volume_ca.get(i).unwrap_or(0.0),
        });
    }
    Ok(rows)
}
