//! Sampling resolution, tick type and payload type.
//!
//! All three appear as lowercase path components in artifact keys, so each
//! one round-trips through `Display`/`FromStr` with the same spelling.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sampling granularity, ordered from finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Tick,
        Resolution::Second,
        Resolution::Minute,
        Resolution::Hour,
        Resolution::Daily,
    ];

    /// Sub-hourly data is stored one file per day; hour and daily data are
    /// one file per symbol holding the whole history.
    pub fn is_date_partitioned(self) -> bool {
        self < Resolution::Hour
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown resolution '{s}'"))
    }
}

/// Classification of the data inside an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickType {
    Trade,
    Quote,
    OpenInterest,
}

impl TickType {
    pub fn as_str(self) -> &'static str {
        match self {
            TickType::Trade => "trade",
            TickType::Quote => "quote",
            TickType::OpenInterest => "openinterest",
        }
    }
}

impl fmt::Display for TickType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TickType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trade" => Ok(TickType::Trade),
            "quote" => Ok(TickType::Quote),
            "openinterest" | "open_interest" => Ok(TickType::OpenInterest),
            other => Err(format!("unknown tick type '{other}'")),
        }
    }
}

/// Concrete shape of a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Tick,
    TradeBar,
    QuoteBar,
    OpenInterest,
    /// User-defined data. Never filtered out by payload matching.
    Custom,
}

impl PayloadType {
    /// Payload produced for a resolution/tick type pair of a non-custom security.
    pub fn for_request(resolution: Resolution, tick_type: TickType) -> Self {
        match (resolution, tick_type) {
            (_, TickType::OpenInterest) => PayloadType::OpenInterest,
            (Resolution::Tick, _) => PayloadType::Tick,
            (_, TickType::Trade) => PayloadType::TradeBar,
            (_, TickType::Quote) => PayloadType::QuoteBar,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PayloadType::Tick => "tick",
            PayloadType::TradeBar => "tradebar",
            PayloadType::QuoteBar => "quotebar",
            PayloadType::OpenInterest => "openinterest",
            PayloadType::Custom => "custom",
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayloadType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tick" => Ok(PayloadType::Tick),
            "tradebar" | "trade" => Ok(PayloadType::TradeBar),
            "quotebar" | "quote" => Ok(PayloadType::QuoteBar),
            "openinterest" | "open_interest" => Ok(PayloadType::OpenInterest),
            "custom" => Ok(PayloadType::Custom),
            other => Err(format!("unknown payload type '{other}'")),
        }
    }
}
