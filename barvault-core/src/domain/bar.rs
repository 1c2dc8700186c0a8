//! MarketBar - one timestamped data point returned by a downloader.

use super::{PayloadType, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamped data point for a concrete symbol.
///
/// Bars, quotes, ticks and open interest share one flat shape:
/// - trade/quote bars use OHLC and volume (quote bars carry mid prices)
/// - ticks carry the traded or quoted price in all four price fields
/// - open interest carries its value in `close`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: Symbol,
    pub time: DateTime<Utc>,
    pub payload: PayloadType,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MarketBar {
    pub fn trade(
        symbol: Symbol,
        time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol,
            time,
            payload: PayloadType::TradeBar,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn tick(symbol: Symbol, time: DateTime<Utc>, price: f64, quantity: f64) -> Self {
        Self {
            symbol,
            time,
            payload: PayloadType::Tick,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: quantity,
        }
    }

    pub fn open_interest(symbol: Symbol, time: DateTime<Utc>, value: f64) -> Self {
        Self {
            symbol,
            time,
            payload: PayloadType::OpenInterest,
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: value,
            volume: 0.0,
        }
    }

    /// Same values under a different payload type.
    pub fn with_payload(mut self, payload: PayloadType) -> Self {
        self.payload = payload;
        self
    }
}
