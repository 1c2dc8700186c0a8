//! Data time zone reference.
//!
//! Market data is stamped in the exchange's local zone. The resolver converts
//! a calendar date in that zone into a UTC window, so every symbol needs a
//! zone, looked up here by (market, security type) with per-ticker overrides.

use crate::domain::{SecurityType, Symbol};
use crate::error::CalendarError;
use chrono_tz::Tz;
use std::collections::HashMap;

/// Supplies the native time zone of a symbol's data.
pub trait CalendarReference: Send + Sync {
    fn data_time_zone(
        &self,
        market: &str,
        symbol: &Symbol,
        security_type: SecurityType,
    ) -> Result<Tz, CalendarError>;
}

/// In-memory calendar table.
#[derive(Debug, Clone, Default)]
pub struct MarketCalendar {
    zones: HashMap<(String, SecurityType), Tz>,
    overrides: HashMap<(String, String), Tz>,
}

impl MarketCalendar {
    /// Empty table: every lookup fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with the common exchange zones.
    pub fn with_defaults() -> Self {
        use chrono_tz::America::{Chicago, New_York};
        use chrono_tz::Asia::Kolkata;
        use chrono_tz::Europe::London;
        use chrono_tz::UTC;

        let mut calendar = Self::new();
        for security_type in [
            SecurityType::Equity,
            SecurityType::Option,
            SecurityType::Index,
            SecurityType::IndexOption,
        ] {
            calendar.insert("usa", security_type, New_York);
        }
        for market in ["cme", "cbot", "nymex", "comex"] {
            calendar.insert(market, SecurityType::Future, Chicago);
            calendar.insert(market, SecurityType::FutureOption, Chicago);
        }
        calendar.insert("ice", SecurityType::Future, New_York);
        calendar.insert("india", SecurityType::Equity, Kolkata);
        calendar.insert("lse", SecurityType::Equity, London);
        for market in ["coinbase", "binance", "kraken", "bitfinex", "bybit"] {
            calendar.insert(market, SecurityType::Crypto, UTC);
            calendar.insert(market, SecurityType::CryptoFuture, UTC);
        }
        calendar.insert("oanda", SecurityType::Forex, New_York);
        calendar.insert("oanda", SecurityType::Cfd, New_York);
        calendar
    }

    pub fn insert(&mut self, market: &str, security_type: SecurityType, zone: Tz) {
        self.zones
            .insert((market.to_ascii_lowercase(), security_type), zone);
    }

    /// Zone for one ticker, taking precedence over the market table.
    pub fn insert_override(&mut self, market: &str, ticker: &str, zone: Tz) {
        self.overrides.insert(
            (market.to_ascii_lowercase(), ticker.to_ascii_uppercase()),
            zone,
        );
    }

    pub fn len(&self) -> usize {
        self.zones.len() + self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty() && self.overrides.is_empty()
    }
}

impl CalendarReference for MarketCalendar {
    fn data_time_zone(
        &self,
        market: &str,
        symbol: &Symbol,
        security_type: SecurityType,
    ) -> Result<Tz, CalendarError> {
        let market = market.to_ascii_lowercase();
        self.overrides
            .get(&(market.clone(), symbol.ticker.clone()))
            .or_else(|| self.zones.get(&(market.clone(), security_type)))
            .copied()
            .ok_or_else(|| CalendarError::NoEntry {
                market,
                ticker: symbol.ticker.clone(),
                security_type,
            })
    }
}
