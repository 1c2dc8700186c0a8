//! Filtering and partitioning of downloader output before persistence.

use crate::domain::{MarketBar, PayloadType, Symbol};
use std::collections::BTreeMap;

/// Bars for one concrete symbol, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolGroup {
    pub symbol: Symbol,
    pub bars: Vec<MarketBar>,
}

/// Keep bars matching `requested`; custom payloads always pass.
pub fn retain_payload(bars: Vec<MarketBar>, requested: PayloadType) -> Vec<MarketBar> {
    bars.into_iter()
        .filter(|bar| {
            requested == PayloadType::Custom
                || bar.payload == PayloadType::Custom
                || bar.payload == requested
        })
        .collect()
}

/// Partition bars by concrete symbol.
///
/// Groups come out in symbol order; bars within a group are stably sorted by
/// time.
pub fn group_by_symbol(bars: Vec<MarketBar>) -> Vec<SymbolGroup> {
    let mut groups: BTreeMap<Symbol, Vec<MarketBar>> = BTreeMap::new();
    for bar in bars {
        groups.entry(bar.symbol.clone()).or_default().push(bar);
    }
    groups
        .into_iter()
        .map(|(symbol, mut bars)| {
            bars.sort_by_key(|bar| bar.time);
            SymbolGroup { symbol, bars }
        })
        .collect()
}

/// Filter by payload, then group.
pub fn prepare_groups(bars: Vec<MarketBar>, requested: PayloadType) -> Vec<SymbolGroup> {
    group_by_symbol(retain_payload(bars, requested))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SecurityType;
    use chrono::{DateTime, TimeZone, Utc};

    fn t(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn bar(ticker: &str, day: u32) -> MarketBar {
        MarketBar::trade(
            Symbol::new(ticker, SecurityType::Equity, "usa"),
            t(day),
            1.0,
            2.0,
            0.5,
            1.5,
            100.0,
        )
    }

    #[test]
    fn mismatched_payloads_are_dropped() {
        let bars = vec![
            bar("XYZ", 2),
            bar("XYZ", 3).with_payload(PayloadType::QuoteBar),
            bar("XYZ", 4).with_payload(PayloadType::Custom),
        ];
        let kept = retain_payload(bars, PayloadType::TradeBar);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|b| b.payload != PayloadType::QuoteBar));
    }

    #[test]
    fn custom_request_keeps_everything() {
        let bars = vec![bar("W", 2), bar("W", 3).with_payload(PayloadType::Tick)];
        assert_eq!(retain_payload(bars, PayloadType::Custom).len(), 2);
    }

    #[test]
    fn groups_are_per_symbol_and_time_ordered() {
        let bars = vec![
            bar("XYZ-A", 5),
            bar("XYZ", 4),
            bar("XYZ", 2),
            bar("XYZ-A", 3),
            bar("XYZ", 3),
        ];
        let groups = group_by_symbol(bars);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].symbol.ticker, "XYZ");
        assert_eq!(groups[0].bars.len(), 3);
        assert_eq!(groups[1].symbol.ticker, "XYZ-A");
        for group in &groups {
            assert!(group.bars.windows(2).all(|w| w[0].time <= w[1].time));
        }
    }
}
