//! Criterion benchmarks for the cache hot paths.
//!
//! Benchmarks:
//! 1. Key decoding (path codec)
//! 2. Fetch window resolution (sub-hourly and whole-history)
//! 3. Coordinator hit path (fresh artifact, no download)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

use barvault_core::calendar::MarketCalendar;
use barvault_core::coordinator::DownloadCoordinator;
use barvault_core::key::{KeyCodec, ListingDirectory, PathKeyCodec};
use barvault_core::time_range::TimeRangeResolver;
use barvault_core::warnings::WarningRegistry;
use chrono::{NaiveDate, TimeZone, Utc};

const KEYS: [&str; 4] = [
    "equity/usa/minute/spy/20240102_trade.parquet",
    "equity/usa/daily/spy_trade.parquet",
    "option/usa/hour/spy_openinterest.parquet",
    "crypto/coinbase/second/btcusd/20240102_quote.parquet",
];

fn codec() -> PathKeyCodec {
    PathKeyCodec::new(
        ListingDirectory::new().with("SPY", NaiveDate::from_ymd_opt(1993, 1, 29).unwrap()),
    )
}

fn bench_codec(c: &mut Criterion) {
    let codec = codec();
    let mut group = c.benchmark_group("codec");
    for key in KEYS {
        group.bench_with_input(BenchmarkId::new("parse", key), key, |b, key| {
            b.iter(|| codec.parse(black_box(key)))
        });
    }
    group.finish();
}

fn bench_resolver(c: &mut Criterion) {
    let codec = codec();
    let resolver = TimeRangeResolver::new(
        Arc::new(MarketCalendar::with_defaults()),
        Arc::new(WarningRegistry::new()),
    );
    let now = Utc.with_ymd_and_hms(2024, 3, 15, 18, 0, 0).unwrap();

    let mut group = c.benchmark_group("resolver");
    for key in KEYS {
        let artifact = codec.parse(key).unwrap();
        group.bench_with_input(BenchmarkId::new("resolve", key), &artifact, |b, artifact| {
            b.iter(|| resolver.resolve(black_box(artifact), now))
        });
    }
    group.finish();
}

fn bench_coordinator_hit(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("equity/usa/daily/spy_trade.parquet");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"bars").unwrap();

    let coordinator = DownloadCoordinator::default();
    let artifact = codec().parse("equity/usa/daily/spy_trade.parquet").unwrap();
    let now = Utc::now();

    c.bench_function("coordinator/fresh_hit", |b| {
        b.iter(|| {
            coordinator.fetch(
                black_box("spy"),
                Some(&artifact),
                &path,
                now,
                || Ok(()),
            )
        })
    });
}

criterion_group!(benches, bench_codec, bench_resolver, bench_coordinator_hit);
criterion_main!(benches);
