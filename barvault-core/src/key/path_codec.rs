//! Codec for the store's path layout.

use super::{ArtifactKey, KeyCodec};
use crate::domain::{PayloadType, Resolution, SecurityType, Symbol, TickType};
use crate::error::KeyError;
use chrono::NaiveDate;
use std::collections::HashMap;

/// Listing dates by ticker.
#[derive(Debug, Clone, Default)]
pub struct ListingDirectory {
    dates: HashMap<String, NaiveDate>,
}

impl ListingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ticker: &str, date: NaiveDate) {
        self.dates.insert(ticker.to_ascii_uppercase(), date);
    }

    pub fn with(mut self, ticker: &str, date: NaiveDate) -> Self {
        self.insert(ticker, date);
        self
    }

    pub fn get(&self, ticker: &str) -> Option<NaiveDate> {
        self.dates.get(&ticker.to_ascii_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }
}

/// Parses keys written in the layout described in [`crate::key`].
///
/// Keys are matched from their tail, so both relative keys and absolute
/// paths under any data root decode the same way.
#[derive(Debug, Clone, Default)]
pub struct PathKeyCodec {
    listings: ListingDirectory,
}

impl PathKeyCodec {
    pub fn new(listings: ListingDirectory) -> Self {
        Self { listings }
    }

    pub fn listings(&self) -> &ListingDirectory {
        &self.listings
    }

    fn build_symbol(&self, ticker: &str, security_type: SecurityType, market: &str) -> Symbol {
        if let Some(underlying_type) = security_type.underlying_type() {
            let mut underlying = Symbol::new(ticker, underlying_type, market);
            underlying.listing_date = self.listings.get(ticker);
            if underlying_type == SecurityType::Future {
                underlying = underlying.into_canonical();
            }
            return Symbol::new(ticker, security_type, market)
                .with_underlying(underlying)
                .into_canonical();
        }

        let mut symbol = Symbol::new(ticker, security_type, market);
        symbol.listing_date = self.listings.get(ticker);
        if security_type == SecurityType::Future {
            symbol = symbol.into_canonical();
        }
        symbol
    }
}

impl KeyCodec for PathKeyCodec {
    fn parse(&self, key: &str) -> Result<ArtifactKey, KeyError> {
        let unrecognized = || KeyError::Unrecognized(key.to_string());
        let invalid = |reason: String| KeyError::InvalidComponent {
            key: key.to_string(),
            reason,
        };

        let normalized = key.replace('\\', "/");
        let parts: Vec<&str> = normalized.split('/').filter(|p| !p.is_empty()).collect();
        let (file_name, dirs) = parts.split_last().ok_or_else(unrecognized)?;
        let stem = file_name.split('.').next().unwrap_or_default();
        let (head, tick_part) = stem.rsplit_once('_').ok_or_else(unrecognized)?;
        let tick_type: TickType = tick_part.parse().map_err(invalid)?;

        let dated = head.len() == 8 && head.bytes().all(|b| b.is_ascii_digit());

        // [security_type, market, resolution, ticker?]
        let (type_dir, market, resolution_dir, ticker, date) = if dated {
            let [.., type_dir, market, resolution_dir, ticker] = dirs else {
                return Err(unrecognized());
            };
            let date = NaiveDate::parse_from_str(head, "%Y%m%d")
                .map_err(|e| invalid(format!("bad date '{head}': {e}")))?;
            (*type_dir, *market, *resolution_dir, *ticker, Some(date))
        } else {
            let [.., type_dir, market, resolution_dir] = dirs else {
                return Err(unrecognized());
            };
            (*type_dir, *market, *resolution_dir, head, None)
        };

        let resolution: Resolution = resolution_dir.parse().map_err(|_| unrecognized())?;
        let security_type: SecurityType = type_dir.parse().map_err(|_| unrecognized())?;

        if resolution.is_date_partitioned() != dated {
            return Err(invalid(format!(
                "{resolution} artifacts must {}carry a date",
                if dated { "not " } else { "" }
            )));
        }
        if ticker.is_empty() {
            return Err(invalid("empty ticker".into()));
        }

        let symbol = self.build_symbol(ticker, security_type, market);
        let payload = if security_type.is_custom() {
            PayloadType::Custom
        } else {
            PayloadType::for_request(resolution, tick_type)
        };

        Ok(ArtifactKey {
            symbol,
            date,
            resolution,
            tick_type,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn codec() -> PathKeyCodec {
        PathKeyCodec::new(
            ListingDirectory::new()
                .with("SPY", date(1993, 1, 29))
                .with("AAPL", date(1980, 12, 12)),
        )
    }

    #[test]
    fn parses_minute_equity_key() {
        let key = codec()
            .parse("equity/usa/minute/aapl/20240102_trade.parquet")
            .unwrap();
        assert_eq!(key.symbol.ticker, "AAPL");
        assert_eq!(key.symbol.security_type, SecurityType::Equity);
        assert_eq!(key.symbol.listing_date, Some(date(1980, 12, 12)));
        assert_eq!(key.date, Some(date(2024, 1, 2)));
        assert_eq!(key.resolution, Resolution::Minute);
        assert_eq!(key.tick_type, TickType::Trade);
        assert_eq!(key.payload, PayloadType::TradeBar);
    }

    #[test]
    fn parses_absolute_daily_key() {
        let key = codec()
            .parse("/srv/data/equity/usa/daily/spy_quote.parquet")
            .unwrap();
        assert_eq!(key.symbol.ticker, "SPY");
        assert_eq!(key.date, None);
        assert_eq!(key.payload, PayloadType::QuoteBar);
    }

    #[test]
    fn option_key_is_chain_root_over_underlying() {
        let key = codec()
            .parse("option/usa/daily/spy_openinterest.parquet")
            .unwrap();
        assert!(key.symbol.is_chain_root());
        let underlying = key.symbol.underlying().unwrap();
        assert_eq!(underlying.security_type, SecurityType::Equity);
        assert_eq!(underlying.listing_date, Some(date(1993, 1, 29)));
        assert_eq!(key.payload, PayloadType::OpenInterest);
    }

    #[test]
    fn future_key_is_canonical() {
        let key = codec()
            .parse("future/cme/tick/es/20240102_quote.parquet")
            .unwrap();
        assert!(key.symbol.is_chain_root());
        assert_eq!(key.payload, PayloadType::Tick);
    }

    #[test]
    fn custom_key_carries_custom_payload() {
        let key = codec()
            .parse("custom/usa/daily/weather_trade.parquet")
            .unwrap();
        assert_eq!(key.payload, PayloadType::Custom);
    }

    #[test]
    fn relative_path_roundtrips() {
        let raw = "option/usa/minute/spy/20240105_quote.parquet";
        let key = codec().parse(raw).unwrap();
        assert_eq!(key.relative_path(), std::path::Path::new(raw));
    }

    #[test]
    fn rejects_keys_outside_layout() {
        let codec = codec();
        assert!(codec
            .parse("equity/usa/fundamental/fine/aapl/20240102.json")
            .is_err());
        assert!(codec.parse("equity/usa/map_files/aapl.csv").is_err());
        assert!(codec.parse("").is_err());
    }

    #[test]
    fn rejects_resolution_date_mismatch() {
        let codec = codec();
        assert!(matches!(
            codec.parse("equity/usa/daily/spy/20240102_trade.parquet"),
            Err(KeyError::InvalidComponent { .. })
        ));
        assert!(matches!(
            codec.parse("equity/usa/minute/spy_trade.parquet"),
            Err(KeyError::InvalidComponent { .. })
        ));
    }
}
