//! Provider configuration, loaded from TOML.
//!
//! ```toml
//! data_downloader = "csv"
//! data_dir = "data"
//! data_update_period_days = 7
//!
//! [csv]
//! source_dir = "mirror"
//!
//! [[calendar]]
//! market = "fred"
//! security_type = "index"
//! time_zone = "America/New_York"
//!
//! [listings]
//! SPY = "1993-01-29"
//! ```

use crate::calendar::MarketCalendar;
use crate::domain::SecurityType;
use crate::error::ConfigError;
use crate::key::ListingDirectory;
use crate::staleness::{StalenessPolicy, DEFAULT_UPDATE_PERIOD_DAYS};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Name of the remote downloader to bind. Required.
    #[serde(default)]
    pub data_downloader: Option<String>,

    /// Root of the local artifact store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Age in days after which hour/daily artifacts are re-downloaded.
    #[serde(default = "default_update_period_days")]
    pub data_update_period_days: i64,

    #[serde(default)]
    pub csv: CsvSourceConfig,

    #[serde(default)]
    pub yahoo: YahooConfig,

    /// Extra time zone entries, layered over the built-in table.
    #[serde(default)]
    pub calendar: Vec<CalendarEntry>,

    /// Listing dates by ticker.
    #[serde(default)]
    pub listings: BTreeMap<String, NaiveDate>,
}

/// Settings for the local CSV mirror downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvSourceConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
}

impl Default for CsvSourceConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
        }
    }
}

/// Settings for the Yahoo chart API downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YahooConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// One calendar row: either a (market, security type) zone or, when
/// `ticker` is set, a per-ticker override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub market: String,
    #[serde(default)]
    pub security_type: Option<SecurityType>,
    #[serde(default)]
    pub ticker: Option<String>,
    pub time_zone: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("mirror")
}

fn default_update_period_days() -> i64 {
    DEFAULT_UPDATE_PERIOD_DAYS
}

fn default_base_url() -> String {
    "https://query2.finance.yahoo.com/v8/finance/chart".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            data_downloader: None,
            data_dir: default_data_dir(),
            data_update_period_days: default_update_period_days(),
            csv: CsvSourceConfig::default(),
            yahoo: YahooConfig::default(),
            calendar: Vec::new(),
            listings: BTreeMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Load and parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Config bound to a named downloader with every other setting at its default.
    pub fn with_downloader(name: &str) -> Self {
        Self {
            data_downloader: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn staleness_policy(&self) -> Result<StalenessPolicy, ConfigError> {
        if self.data_update_period_days <= 0 {
            return Err(ConfigError::Invalid {
                key: "data_update_period_days".into(),
                reason: format!("must be positive, got {}", self.data_update_period_days),
            });
        }
        Ok(StalenessPolicy::new(chrono::Duration::days(
            self.data_update_period_days,
        )))
    }

    /// Built-in calendar with the configured entries layered on top.
    pub fn market_calendar(&self) -> Result<MarketCalendar, ConfigError> {
        let mut calendar = MarketCalendar::with_defaults();
        for entry in &self.calendar {
            let zone: Tz = entry
                .time_zone
                .parse()
                .map_err(|_| ConfigError::InvalidTimeZone(entry.time_zone.clone()))?;
            match (&entry.ticker, entry.security_type) {
                (Some(ticker), _) => calendar.insert_override(&entry.market, ticker, zone),
                (None, Some(security_type)) => {
                    calendar.insert(&entry.market, security_type, zone)
                }
                (None, None) => {
                    return Err(ConfigError::Invalid {
                        key: "calendar".into(),
                        reason: format!(
                            "entry for market '{}' needs a security_type or a ticker",
                            entry.market
                        ),
                    })
                }
            }
        }
        Ok(calendar)
    }

    pub fn listing_directory(&self) -> ListingDirectory {
        let mut listings = ListingDirectory::new();
        for (ticker, date) in &self.listings {
            listings.insert(ticker, *date);
        }
        listings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarReference;
    use crate::domain::Symbol;

    const SAMPLE: &str = r#"
data_downloader = "csv"
data_dir = "/srv/bars"
data_update_period_days = 3

[csv]
source_dir = "/srv/mirror"

[[calendar]]
market = "fred"
security_type = "index"
time_zone = "America/New_York"

[[calendar]]
market = "usa"
ticker = "VIX"
time_zone = "America/Chicago"

[listings]
SPY = "1993-01-29"
"#;

    #[test]
    fn parses_full_config() {
        let config = ProviderConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.data_downloader.as_deref(), Some("csv"));
        assert_eq!(config.data_dir, PathBuf::from("/srv/bars"));
        assert_eq!(config.csv.source_dir, PathBuf::from("/srv/mirror"));
        assert_eq!(config.yahoo, YahooConfig::default());
        assert_eq!(
            config.staleness_policy().unwrap().max_age(),
            chrono::Duration::days(3)
        );
        assert_eq!(
            config.listing_directory().get("spy"),
            NaiveDate::from_ymd_opt(1993, 1, 29)
        );
    }

    #[test]
    fn calendar_entries_extend_defaults() {
        let config = ProviderConfig::from_toml_str(SAMPLE).unwrap();
        let calendar = config.market_calendar().unwrap();
        let sofr = Symbol::new("SOFR", SecurityType::Index, "fred");
        assert_eq!(
            calendar.data_time_zone("fred", &sofr, SecurityType::Index),
            Ok(chrono_tz::America::New_York)
        );
        let vix = Symbol::new("VIX", SecurityType::Index, "usa");
        assert_eq!(
            calendar.data_time_zone("usa", &vix, SecurityType::Index),
            Ok(chrono_tz::America::Chicago)
        );
    }

    #[test]
    fn downloader_is_optional_at_parse_time() {
        let config = ProviderConfig::from_toml_str("data_dir = \"data\"").unwrap();
        assert_eq!(config.data_downloader, None);
    }

    #[test]
    fn rejects_bad_time_zone() {
        let config = ProviderConfig::from_toml_str(
            r#"
[[calendar]]
market = "usa"
security_type = "equity"
time_zone = "Mars/Olympus"
"#,
        )
        .unwrap();
        assert!(matches!(
            config.market_calendar(),
            Err(ConfigError::InvalidTimeZone(_))
        ));
    }

    #[test]
    fn rejects_non_positive_update_period() {
        let config = ProviderConfig {
            data_update_period_days: 0,
            ..ProviderConfig::default()
        };
        assert!(config.staleness_policy().is_err());
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            ProviderConfig::from_toml_str("data_downloader = "),
            Err(ConfigError::Parse(_))
        ));
    }
}
