//! Artifact keys and the on-disk layout they address.
//!
//! Layout, relative to the data root:
//! - sub-hourly: `{security_type}/{market}/{resolution}/{ticker}/{yyyymmdd}_{tick_type}.parquet`
//! - hour/daily: `{security_type}/{market}/{resolution}/{ticker}_{tick_type}.parquet`
//!
//! Option artifacts live under the underlying's ticker; members of a chain
//! root are stored in the root's artifact.

pub mod path_codec;

pub use path_codec::{ListingDirectory, PathKeyCodec};

use crate::domain::{PayloadType, Resolution, SecurityType, Symbol, TickType};
use crate::error::KeyError;
use chrono::NaiveDate;
use std::fmt;
use std::path::PathBuf;

/// Extension of every artifact written by the store.
pub const ARTIFACT_EXTENSION: &str = "parquet";

/// Decoded identity of a persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub symbol: Symbol,
    /// Present for date-partitioned (sub-hourly) artifacts only.
    pub date: Option<NaiveDate>,
    pub resolution: Resolution,
    pub tick_type: TickType,
    pub payload: PayloadType,
}

impl ArtifactKey {
    /// Path of this artifact relative to the data root.
    pub fn relative_path(&self) -> PathBuf {
        artifact_path(
            self.symbol.security_type,
            &self.symbol.market,
            self.resolution,
            directory_ticker(&self.symbol),
            self.tick_type,
            self.date,
        )
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.symbol, self.resolution, self.tick_type)?;
        if let Some(date) = self.date {
            write!(f, " {}", date.format("%Y-%m-%d"))?;
        }
        Ok(())
    }
}

/// Decodes opaque artifact keys.
pub trait KeyCodec: Send + Sync {
    fn parse(&self, key: &str) -> Result<ArtifactKey, KeyError>;
}

/// Ticker used for the artifact directory: the underlying for options, the
/// symbol itself otherwise.
pub fn directory_ticker(symbol: &Symbol) -> &str {
    match symbol.underlying() {
        Some(underlying) if symbol.security_type.is_option() => &underlying.ticker,
        _ => &symbol.ticker,
    }
}

/// Build a relative artifact path.
///
/// `date` is only used for date-partitioned resolutions.
pub fn artifact_path(
    security_type: SecurityType,
    market: &str,
    resolution: Resolution,
    ticker: &str,
    tick_type: TickType,
    date: Option<NaiveDate>,
) -> PathBuf {
    let ticker = ticker.to_ascii_lowercase();
    let mut path = PathBuf::from(security_type.as_str())
        .join(market.to_ascii_lowercase())
        .join(resolution.as_str());

    match date.filter(|_| resolution.is_date_partitioned()) {
        Some(date) => {
            path.push(&ticker);
            path.push(format!(
                "{}_{}.{ARTIFACT_EXTENSION}",
                date.format("%Y%m%d"),
                tick_type
            ));
        }
        None => path.push(format!("{ticker}_{tick_type}.{ARTIFACT_EXTENSION}")),
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn sub_hourly_path_is_date_partitioned() {
        let path = artifact_path(
            SecurityType::Equity,
            "usa",
            Resolution::Minute,
            "SPY",
            TickType::Trade,
            NaiveDate::from_ymd_opt(2024, 1, 2),
        );
        assert_eq!(
            path,
            Path::new("equity/usa/minute/spy/20240102_trade.parquet")
        );
    }

    #[test]
    fn daily_path_ignores_date() {
        let path = artifact_path(
            SecurityType::Crypto,
            "coinbase",
            Resolution::Daily,
            "BTCUSD",
            TickType::Quote,
            NaiveDate::from_ymd_opt(2024, 1, 2),
        );
        assert_eq!(path, Path::new("crypto/coinbase/daily/btcusd_quote.parquet"));
    }

    #[test]
    fn option_directory_uses_underlying() {
        let underlying = Symbol::new("SPY", SecurityType::Equity, "usa");
        let chain = Symbol::new("SPY", SecurityType::Option, "usa")
            .with_underlying(underlying)
            .into_canonical();
        let contract = Symbol::new("SPY240119C00470000", SecurityType::Option, "usa")
            .with_underlying(Symbol::new("SPY", SecurityType::Equity, "usa"));
        assert_eq!(directory_ticker(&chain), "SPY");
        assert_eq!(directory_ticker(&contract), "SPY");
    }
}
