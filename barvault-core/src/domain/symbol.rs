//! Symbol identity.
//!
//! A `Symbol` is either a concrete instrument (`SPY`, `ESH4`) or a chain root
//! (an option chain or continuous future) whose download yields data for many
//! concrete members.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Equity,
    Option,
    Future,
    FutureOption,
    Index,
    IndexOption,
    Crypto,
    CryptoFuture,
    Forex,
    Cfd,
    /// User-defined data with no market identity of its own.
    Custom,
}

impl SecurityType {
    pub const ALL: [SecurityType; 11] = [
        SecurityType::Equity,
        SecurityType::Option,
        SecurityType::Future,
        SecurityType::FutureOption,
        SecurityType::Index,
        SecurityType::IndexOption,
        SecurityType::Crypto,
        SecurityType::CryptoFuture,
        SecurityType::Forex,
        SecurityType::Cfd,
        SecurityType::Custom,
    ];

    pub fn is_option(self) -> bool {
        matches!(
            self,
            SecurityType::Option | SecurityType::FutureOption | SecurityType::IndexOption
        )
    }

    pub fn is_crypto(self) -> bool {
        matches!(self, SecurityType::Crypto | SecurityType::CryptoFuture)
    }

    pub fn is_custom(self) -> bool {
        self == SecurityType::Custom
    }

    /// Security type of the underlying for option types.
    pub fn underlying_type(self) -> Option<SecurityType> {
        match self {
            SecurityType::Option => Some(SecurityType::Equity),
            SecurityType::FutureOption => Some(SecurityType::Future),
            SecurityType::IndexOption => Some(SecurityType::Index),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SecurityType::Equity => "equity",
            SecurityType::Option => "option",
            SecurityType::Future => "future",
            SecurityType::FutureOption => "futureoption",
            SecurityType::Index => "index",
            SecurityType::IndexOption => "indexoption",
            SecurityType::Crypto => "crypto",
            SecurityType::CryptoFuture => "cryptofuture",
            SecurityType::Forex => "forex",
            SecurityType::Cfd => "cfd",
            SecurityType::Custom => "custom",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SecurityType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown security type '{s}'"))
    }
}

/// Identity of a security, as carried by artifact keys and downloaded bars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub ticker: String,
    pub security_type: SecurityType,
    pub market: String,
    /// First date the security is known to trade, when known.
    pub listing_date: Option<NaiveDate>,
    pub underlying: Option<Box<Symbol>>,
    /// True for chain roots (option chains, continuous futures).
    pub canonical: bool,
}

impl Symbol {
    /// Concrete symbol. Tickers are upper-cased, markets lower-cased.
    pub fn new(ticker: &str, security_type: SecurityType, market: &str) -> Self {
        Self {
            ticker: ticker.to_ascii_uppercase(),
            security_type,
            market: market.to_ascii_lowercase(),
            listing_date: None,
            underlying: None,
            canonical: false,
        }
    }

    pub fn with_listing_date(mut self, date: NaiveDate) -> Self {
        self.listing_date = Some(date);
        self
    }

    pub fn with_underlying(mut self, underlying: Symbol) -> Self {
        self.underlying = Some(Box::new(underlying));
        self
    }

    /// Mark this symbol as a chain root.
    pub fn into_canonical(mut self) -> Self {
        self.canonical = true;
        self
    }

    pub fn is_chain_root(&self) -> bool {
        self.canonical
    }

    pub fn underlying(&self) -> Option<&Symbol> {
        self.underlying.as_deref()
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.canonical {
            write!(f, "{}*", self.ticker)
        } else {
            f.write_str(&self.ticker)
        }
    }
}
