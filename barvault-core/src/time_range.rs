//! Fetch window resolution.
//!
//! Windows never reach into the current UTC day: the newest instant any
//! request may cover is midnight UTC of yesterday. Sub-hourly artifacts cover
//! exactly one local trading date; hour and daily artifacts cover the whole
//! history of the symbol.

use crate::calendar::CalendarReference;
use crate::domain::Symbol;
use crate::key::ArtifactKey;
use crate::warnings::WarningRegistry;
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;

/// Listing dates at or before this are placeholders, not real listings.
pub const BEGINNING_OF_TIME: NaiveDate = match NaiveDate::from_ymd_opt(1998, 1, 2) {
    Some(date) => date,
    None => panic!("invalid sentinel date"),
};

/// Start of history when no usable listing date exists.
pub const DEFAULT_HISTORY_START: NaiveDate = match NaiveDate::from_ymd_opt(1998, 1, 2) {
    Some(date) => date,
    None => panic!("invalid default start date"),
};

/// Start of history for crypto, before any crypto market traded.
pub const CRYPTO_HISTORY_START: NaiveDate = match NaiveDate::from_ymd_opt(2009, 1, 1) {
    Some(date) => date,
    None => panic!("invalid crypto start date"),
};

/// Half-open UTC interval `[start_utc, end_utc)`; always non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

impl FetchWindow {
    /// `None` when the interval would be empty.
    pub fn new(start_utc: DateTime<Utc>, end_utc: DateTime<Utc>) -> Option<Self> {
        (start_utc < end_utc).then_some(Self { start_utc, end_utc })
    }

    pub fn duration(&self) -> Duration {
        self.end_utc - self.start_utc
    }
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start_utc.to_rfc3339(),
            self.end_utc.to_rfc3339()
        )
    }
}

/// Newest instant a window may end at: midnight UTC of the day before `now`.
pub fn end_limit(now: DateTime<Utc>) -> DateTime<Utc> {
    utc_midnight(now.date_naive()) - Duration::days(1)
}

/// Window for `key` given the data time zone of its symbol.
///
/// Returns `None` when nothing should be fetched: the day is not over yet,
/// or the symbol's history starts after the limit.
pub fn resolve_in_zone(key: &ArtifactKey, zone: Tz, now: DateTime<Utc>) -> Option<FetchWindow> {
    let limit = end_limit(now);

    if key.resolution.is_date_partitioned() {
        let date = key.date?;
        let start = local_midnight_utc(date, zone);
        let end = local_midnight_utc(date.succ_opt()?, zone);
        if end > limit {
            return None;
        }
        return FetchWindow::new(start, end);
    }

    FetchWindow::new(utc_midnight(history_start(&key.symbol)), limit)
}

/// First date to request for a whole-history artifact.
pub fn history_start(symbol: &Symbol) -> NaiveDate {
    let listed = if symbol.security_type.is_crypto() {
        Some(CRYPTO_HISTORY_START)
    } else if let Some(underlying) = symbol.underlying() {
        underlying.listing_date
    } else {
        symbol.listing_date
    };

    match listed {
        Some(date) if date > BEGINNING_OF_TIME => date,
        _ => DEFAULT_HISTORY_START,
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// UTC instant of local midnight on `date` in `zone`.
///
/// A midnight skipped by a DST jump moves forward to the first valid local
/// time; an ambiguous midnight takes the earlier instant.
fn local_midnight_utc(date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
    let mut probe = midnight;
    for _ in 0..=4 {
        match zone.from_local_datetime(&probe) {
            LocalResult::Single(t) => return t.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => probe += Duration::minutes(30),
        }
    }
    midnight.and_utc()
}

/// Resolves windows, looking up each symbol's zone in the calendar.
///
/// Symbols with no calendar entry use UTC; the first miss per symbol is
/// logged.
pub struct TimeRangeResolver {
    calendar: Arc<dyn CalendarReference>,
    warnings: Arc<WarningRegistry>,
}

impl TimeRangeResolver {
    pub fn new(calendar: Arc<dyn CalendarReference>, warnings: Arc<WarningRegistry>) -> Self {
        Self { calendar, warnings }
    }

    /// Native data zone of `symbol`, or UTC when the calendar has no entry.
    pub fn data_time_zone(&self, symbol: &Symbol) -> Tz {
        match self
            .calendar
            .data_time_zone(&symbol.market, symbol, symbol.security_type)
        {
            Ok(zone) => zone,
            Err(e) => {
                self.warnings.warn_once(
                    symbol,
                    &format!("{e}; defaulting to UTC for {symbol}"),
                );
                chrono_tz::UTC
            }
        }
    }

    pub fn resolve(&self, key: &ArtifactKey, now: DateTime<Utc>) -> Option<FetchWindow> {
        let zone = self.data_time_zone(&key.symbol);
        resolve_in_zone(key, zone, now)
    }

    pub fn warnings(&self) -> &WarningRegistry {
        &self.warnings
    }
}
