//! Yahoo Finance downloader.
//!
//! Pulls hourly and daily trade bars from Yahoo's v8 chart API, with retries
//! and exponential backoff. Only equities, indexes and crypto pairs quoted in
//! USD are served; everything else is `Unsupported`.
//!
//! Yahoo has no official API and is subject to unannounced format changes.

use super::{DownloadRequest, RemoteDownloader};
use crate::config::YahooConfig;
use crate::domain::{MarketBar, Resolution, SecurityType, Symbol, TickType};
use crate::error::{ConfigError, DataError};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

/// Largest multiplier applied to the base retry delay.
const MAX_BACKOFF_FACTOR: u32 = 1 << 10;

/// Exponential backoff before retry `attempt` (1-based), capped.
fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32
        .saturating_pow(attempt.saturating_sub(1))
        .min(MAX_BACKOFF_FACTOR);
    base.saturating_mul(factor)
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

pub struct YahooDownloader {
    client: reqwest::blocking::Client,
    base_url: String,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooDownloader {
    pub fn new(config: &YahooConfig) -> Result<Self, ConfigError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "yahoo".into(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        })
    }

    fn chart_url(&self, yahoo_symbol: &str, request: &DownloadRequest) -> Result<String, DataError> {
        let interval = match request.resolution {
            Resolution::Daily => "1d",
            Resolution::Hour => "1h",
            other => {
                return Err(DataError::Unsupported(format!(
                    "yahoo serves hour and daily bars, not {other}"
                )))
            }
        };
        Ok(format!(
            "{}/{yahoo_symbol}?period1={}&period2={}&interval={interval}",
            self.base_url,
            request.start_utc.timestamp(),
            request.end_utc.timestamp(),
        ))
    }

    fn fetch_with_retry(&self, url: &str, symbol: &Symbol) -> Result<ChartResponse, DataError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(self.base_delay, attempt);
                tracing::debug!(%symbol, attempt, ?delay, "retrying yahoo request");
                std::thread::sleep(delay);
            }

            match self.client.get(url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(DataError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(DataError::SymbolNotFound {
                            symbol: symbol.ticker.clone(),
                        });
                    }

                    if !status.is_success() {
                        last_error = Some(DataError::Other(format!(
                            "HTTP {status} for {}",
                            symbol.ticker
                        )));
                        continue;
                    }

                    return resp.json::<ChartResponse>().map_err(|e| {
                        DataError::ResponseFormatChanged(format!(
                            "failed to parse response for {}: {e}",
                            symbol.ticker
                        ))
                    });
                }
                Err(e) if e.is_connect() || e.is_timeout() => {
                    last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                }
                Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
            }
        }

        Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
    }
}

impl RemoteDownloader for YahooDownloader {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn get(&self, request: &DownloadRequest) -> Result<Vec<MarketBar>, DataError> {
        if request.tick_type != TickType::Trade {
            return Err(DataError::Unsupported(format!(
                "yahoo serves trade bars only, not {}",
                request.tick_type
            )));
        }
        let yahoo_symbol = yahoo_ticker(&request.symbol)?;
        let url = self.chart_url(&yahoo_symbol, request)?;
        let chart = self.fetch_with_retry(&url, &request.symbol)?;
        let bars = parse_response(&request.symbol, chart)?;
        Ok(bars
            .into_iter()
            .filter(|bar| request.contains(bar.time))
            .collect())
    }
}

/// Yahoo's spelling of a ticker: `^` for indexes, `BASE-USD` for crypto.
fn yahoo_ticker(symbol: &Symbol) -> Result<String, DataError> {
    match symbol.security_type {
        SecurityType::Equity => Ok(symbol.ticker.replace('.', "-")),
        SecurityType::Index => Ok(format!("^{}", symbol.ticker)),
        SecurityType::Crypto => match symbol.ticker.strip_suffix("USD") {
            Some(base) if !base.is_empty() => Ok(format!("{base}-USD")),
            _ => Err(DataError::Unsupported(format!(
                "yahoo quotes crypto against USD only, not {}",
                symbol.ticker
            ))),
        },
        other => Err(DataError::Unsupported(format!(
            "yahoo does not serve {other} data"
        ))),
    }
}

fn parse_response(symbol: &Symbol, resp: ChartResponse) -> Result<Vec<MarketBar>, DataError> {
    let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
        Some(err) if err.code == "Not Found" => DataError::SymbolNotFound {
            symbol: symbol.ticker.clone(),
        },
        Some(err) => DataError::ResponseFormatChanged(format!("{}: {}", err.code, err.description)),
        None => DataError::ResponseFormatChanged("empty result with no error".into()),
    })?;

    let data = result
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

    // No timestamps at all: nothing traded in the window.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let time = DateTime::<Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}")))?;

        let open = quote.open.get(i).copied().flatten();
        let high = quote.high.get(i).copied().flatten();
        let low = quote.low.get(i).copied().flatten();
        let close = quote.close.get(i).copied().flatten();
        let volume = quote.volume.get(i).copied().flatten();

        // Holidays come back as all-null rows.
        if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
            continue;
        }

        bars.push(MarketBar::trade(
            symbol.clone(),
            time,
            open.unwrap_or(f64::NAN),
            high.unwrap_or(f64::NAN),
            low.unwrap_or(f64::NAN),
            close.unwrap_or(f64::NAN),
            volume.unwrap_or(0.0),
        ));
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn spy() -> Symbol {
        Symbol::new("SPY", SecurityType::Equity, "usa")
    }

    fn chart(json: &str) -> ChartResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn backoff_doubles_then_caps() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(base, 40), base * MAX_BACKOFF_FACTOR);
        assert_eq!(backoff_delay(base, u32::MAX), base * MAX_BACKOFF_FACTOR);
    }

    #[test]
    fn parses_bars_and_skips_holidays() {
        let resp = chart(
            r#"{"chart":{"result":[{"timestamp":[1704205800,1704292200,1704378600],
            "indicators":{"quote":[{"open":[472.1,null,470.0],"high":[473.0,null,471.0],
            "low":[471.8,null,469.5],"close":[472.6,null,470.9],"volume":[1200,null,900]}]}}],
            "error":null}}"#,
        );
        let bars = parse_response(&spy(), resp).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].symbol, spy());
        assert_eq!(bars[0].time, Utc.timestamp_opt(1704205800, 0).unwrap());
        assert_eq!(bars[1].volume, 900.0);
    }

    #[test]
    fn not_found_maps_to_symbol_not_found() {
        let resp = chart(
            r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found"}}}"#,
        );
        assert!(matches!(
            parse_response(&spy(), resp),
            Err(DataError::SymbolNotFound { .. })
        ));
    }

    #[test]
    fn missing_timestamps_mean_no_data() {
        let resp = chart(
            r#"{"chart":{"result":[{"indicators":{"quote":[{"open":[],"high":[],"low":[],"close":[],"volume":[]}]}}],"error":null}}"#,
        );
        assert!(parse_response(&spy(), resp).unwrap().is_empty());
    }

    #[test]
    fn ticker_spelling() {
        assert_eq!(yahoo_ticker(&spy()).unwrap(), "SPY");
        assert_eq!(
            yahoo_ticker(&Symbol::new("BRK.B", SecurityType::Equity, "usa")).unwrap(),
            "BRK-B"
        );
        assert_eq!(
            yahoo_ticker(&Symbol::new("SPX", SecurityType::Index, "usa")).unwrap(),
            "^SPX"
        );
        assert_eq!(
            yahoo_ticker(&Symbol::new("BTCUSD", SecurityType::Crypto, "coinbase")).unwrap(),
            "BTC-USD"
        );
        assert!(yahoo_ticker(&Symbol::new("ES", SecurityType::Future, "cme")).is_err());
    }

    #[test]
    fn rejects_unsupported_requests_before_any_io() {
        let downloader = YahooDownloader::new(&YahooConfig::default()).unwrap();
        let request = DownloadRequest {
            symbol: spy(),
            resolution: Resolution::Minute,
            start_utc: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            end_utc: Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap(),
            tick_type: TickType::Trade,
        };
        assert!(matches!(
            downloader.get(&request),
            Err(DataError::Unsupported(_))
        ));

        let quotes = DownloadRequest {
            resolution: Resolution::Daily,
            tick_type: TickType::Quote,
            ..request
        };
        assert!(matches!(
            downloader.get(&quotes),
            Err(DataError::Unsupported(_))
        ));
    }
}
