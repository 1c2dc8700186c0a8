//! Downloader backed by a local directory of CSV exports.
//!
//! Layout: `{source_dir}/{security_type}/{market}/{resolution}/{ticker}.csv`,
//! with option chains filed under the underlying's ticker. Columns:
//!
//! ```text
//! symbol,time,payload,open,high,low,close,volume
//! SPY,2024-01-02T14:30:00Z,tradebar,472.1,473.0,471.8,472.6,1200
//! ```
//!
//! `payload` defaults to `tradebar`; empty price cells read as NaN.

use super::{DownloadRequest, RemoteDownloader};
use crate::domain::{MarketBar, PayloadType, Symbol};
use crate::error::DataError;
use crate::key::directory_ticker;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CsvRow {
    symbol: String,
    time: DateTime<Utc>,
    #[serde(default = "default_payload")]
    payload: PayloadType,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<f64>,
}

fn default_payload() -> PayloadType {
    PayloadType::TradeBar
}

pub struct CsvDirectoryDownloader {
    source_dir: PathBuf,
}

impl CsvDirectoryDownloader {
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    /// Source file that holds rows for `request`.
    pub fn source_path(&self, request: &DownloadRequest) -> PathBuf {
        let symbol = &request.symbol;
        self.source_dir
            .join(symbol.security_type.as_str())
            .join(&symbol.market)
            .join(request.resolution.as_str())
            .join(format!(
                "{}.csv",
                directory_ticker(symbol).to_ascii_lowercase()
            ))
    }

    fn read_rows(&self, path: &Path, request: &DownloadRequest) -> Result<Vec<MarketBar>, DataError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::SourceFile(format!("{}: {e}", path.display())))?;

        let mut bars = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = row.map_err(|e| {
                DataError::SourceFile(format!("{} row {}: {e}", path.display(), line + 1))
            })?;
            if !request.contains(row.time) {
                continue;
            }
            bars.push(MarketBar {
                symbol: member_symbol(&request.symbol, &row.symbol),
                time: row.time,
                payload: row.payload,
                open: row.open.unwrap_or(f64::NAN),
                high: row.high.unwrap_or(f64::NAN),
                low: row.low.unwrap_or(f64::NAN),
                close: row.close.unwrap_or(f64::NAN),
                volume: row.volume.unwrap_or(0.0),
            });
        }
        Ok(bars)
    }
}

impl RemoteDownloader for CsvDirectoryDownloader {
    fn name(&self) -> &str {
        "csv"
    }

    fn get(&self, request: &DownloadRequest) -> Result<Vec<MarketBar>, DataError> {
        let path = self.source_path(request);
        if !path.exists() {
            tracing::info!(
                symbol = %request.symbol,
                path = %path.display(),
                "no source file for symbol"
            );
            return Ok(Vec::new());
        }
        let bars = self.read_rows(&path, request)?;
        tracing::debug!(symbol = %request.symbol, count = bars.len(), "read source rows");
        Ok(bars)
    }
}

/// Concrete symbol for a row under the requested root.
///
/// A row naming the requested concrete symbol maps to that symbol; anything
/// else becomes a sibling sharing its type, market and underlying.
fn member_symbol(requested: &Symbol, ticker: &str) -> Symbol {
    if !requested.is_chain_root() && requested.ticker.eq_ignore_ascii_case(ticker) {
        return requested.clone();
    }
    let mut member = Symbol::new(ticker, requested.security_type, &requested.market);
    member.underlying = requested.underlying.clone();
    member
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Resolution, SecurityType, TickType};
    use chrono::TimeZone;
    use std::fs;

    fn request(symbol: Symbol, resolution: Resolution) -> DownloadRequest {
        DownloadRequest {
            symbol,
            resolution,
            start_utc: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap(),
            tick_type: TickType::Trade,
        }
    }

    fn write_source(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn reads_rows_inside_window() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "equity/usa/daily/xyz.csv",
            "symbol,time,payload,open,high,low,close,volume\n\
             XYZ,2024-01-01T00:00:00Z,tradebar,1,2,0.5,1.5,10\n\
             XYZ,2024-01-02T00:00:00Z,tradebar,1,2,0.5,1.5,10\n\
             XYZ-A,2024-01-03T00:00:00Z,tradebar,3,4,2.5,3.5,20\n\
             XYZ,2024-01-04T00:00:00Z,tradebar,1,2,0.5,1.5,10\n",
        );
        let downloader = CsvDirectoryDownloader::new(dir.path());
        let xyz = Symbol::new("XYZ", SecurityType::Equity, "usa");
        let bars = downloader
            .get(&request(xyz.clone(), Resolution::Daily))
            .unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, xyz);
        assert_eq!(bars[1].symbol.ticker, "XYZ-A");
        assert_eq!(bars[1].close, 3.5);
    }

    #[test]
    fn chain_members_keep_the_underlying() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "option/usa/daily/spy.csv",
            "symbol,time,payload,open,high,low,close,volume\n\
             SPY240119C00470000,2024-01-02T00:00:00Z,openinterest,,,,1500,\n",
        );
        let underlying = Symbol::new("SPY", SecurityType::Equity, "usa");
        let chain = Symbol::new("SPY", SecurityType::Option, "usa")
            .with_underlying(underlying.clone())
            .into_canonical();
        let downloader = CsvDirectoryDownloader::new(dir.path());
        let bars = downloader.get(&request(chain, Resolution::Daily)).unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].payload, PayloadType::OpenInterest);
        assert_eq!(bars[0].symbol.underlying(), Some(&underlying));
        assert!(!bars[0].symbol.is_chain_root());
        assert!(bars[0].open.is_nan());
        assert_eq!(bars[0].close, 1500.0);
    }

    #[test]
    fn missing_source_is_empty_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let downloader = CsvDirectoryDownloader::new(dir.path());
        let spy = Symbol::new("SPY", SecurityType::Equity, "usa");
        assert!(downloader
            .get(&request(spy, Resolution::Daily))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn malformed_row_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        write_source(
            dir.path(),
            "equity/usa/daily/spy.csv",
            "symbol,time,open,high,low,close,volume\nSPY,yesterday,1,2,3,4,5\n",
        );
        let downloader = CsvDirectoryDownloader::new(dir.path());
        let spy = Symbol::new("SPY", SecurityType::Equity, "usa");
        assert!(matches!(
            downloader.get(&request(spy, Resolution::Daily)),
            Err(DataError::SourceFile(_))
        ));
    }
}
