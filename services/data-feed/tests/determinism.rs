//! Determinism tests for the data feed service
//!
//! Validates that identically-seeded feeds produce identical outputs:
//! - Dual-run comparison of full tick/candle/anomaly streams
//! - Order book checksum equality across runs
//! - Seed divergence (different seeds produce different streams)
//! - Stream invariants (price positivity, candle integrity, book ordering)

use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;

use data_feed::clock::ManualClock;
use data_feed::{Clock, DataFeed, HistoricalDataFeed, SimulatedDataFeed};
use types::candle::Timeframe;
use types::config::FeedConfig;
use types::symbol::Symbol;

const START: i64 = 1_708_041_600_000; // 2024-02-16 00:00 UTC

fn config(seed: u64) -> FeedConfig {
    FeedConfig::with_symbol_names(["BTC", "ETH"])
        .with_seed(seed)
        .with_anomalies(true, 100.0)
}

/// Full observable output of one simulated run.
#[derive(Debug, PartialEq)]
struct RunLog {
    ticks: Vec<(String, i64, Decimal, Decimal)>,
    candles: Vec<(String, i64, Decimal, Decimal)>,
    anomalies: Vec<(String, i64)>,
    book_checksums: Vec<String>,
}

fn run_simulated(seed: u64, steps: usize) -> RunLog {
    let clock = ManualClock::new(START);
    let mut feed = SimulatedDataFeed::new(clock.clone());
    feed.initialize(config(seed)).unwrap();

    let ticks = Arc::new(Mutex::new(Vec::new()));
    let candles = Arc::new(Mutex::new(Vec::new()));
    let anomalies = Arc::new(Mutex::new(Vec::new()));

    let sink = ticks.clone();
    feed.on_tick(Box::new(move |tick| {
        sink.lock().unwrap().push((
            tick.symbol.to_string(),
            tick.timestamp_ms,
            tick.price,
            tick.volume,
        ));
        Ok(())
    }));
    let sink = candles.clone();
    feed.on_candle(Box::new(move |candle| {
        sink.lock().unwrap().push((
            candle.symbol.to_string(),
            candle.open_time_ms,
            candle.open,
            candle.close,
        ));
        Ok(())
    }));
    let sink = anomalies.clone();
    feed.on_anomaly(Box::new(move |anomaly| {
        sink.lock()
            .unwrap()
            .push((anomaly.kind.label().to_string(), anomaly.timestamp_ms));
        Ok(())
    }));

    feed.start().unwrap();
    for _ in 0..steps {
        feed.poll(clock.now_ms()).unwrap();
        clock.advance(1_000);
    }

    let mut book_checksums = Vec::new();
    for symbol in [Symbol::new("BTC"), Symbol::new("ETH")] {
        book_checksums.push(feed.order_book(&symbol).unwrap().checksum());
    }

    let ticks = ticks.lock().unwrap().clone();
    let candles = candles.lock().unwrap().clone();
    let anomalies = anomalies.lock().unwrap().clone();
    RunLog {
        ticks,
        candles,
        anomalies,
        book_checksums,
    }
}

#[test]
fn test_simulated_dual_run_identical() {
    let a = run_simulated(42, 300);
    let b = run_simulated(42, 300);

    assert_eq!(a.ticks.len(), 600); // 300 steps x 2 symbols
    assert_eq!(a, b);
}

#[test]
fn test_simulated_seed_divergence() {
    let a = run_simulated(42, 120);
    let b = run_simulated(43, 120);

    assert_ne!(a.ticks, b.ticks);
}

#[test]
fn test_simulated_stream_invariants() {
    let log = run_simulated(7, 400);

    for (_, _, price, volume) in &log.ticks {
        assert!(*price > Decimal::ZERO);
        assert!(*volume >= Decimal::ZERO);
    }
    // Per-symbol timestamps are non-decreasing.
    for symbol in ["BTC", "ETH"] {
        let times: Vec<i64> = log
            .ticks
            .iter()
            .filter(|(s, ..)| s == symbol)
            .map(|(_, t, ..)| *t)
            .collect();
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_simulated_candles_are_valid() {
    let clock = ManualClock::new(START);
    let mut feed = SimulatedDataFeed::new(clock.clone());
    feed.initialize(config(11)).unwrap();
    feed.start().unwrap();

    for _ in 0..600 {
        feed.poll(clock.now_ms()).unwrap();
        clock.advance(1_000);
    }

    for symbol in [Symbol::new("BTC"), Symbol::new("ETH")] {
        let candles = feed.candles(&symbol, Timeframe::M1, 100);
        assert!(!candles.is_empty());
        for candle in &candles {
            assert!(candle.is_valid(), "invalid candle {candle:?}");
            assert!(candle.high >= candle.open.max(candle.close));
            assert!(candle.low <= candle.open.min(candle.close));
        }

        let m5 = feed.candles(&symbol, Timeframe::M5, 100);
        assert!(m5.iter().all(|c| c.is_valid()));
    }
}

#[test]
fn test_simulated_books_are_ordered() {
    let clock = ManualClock::new(START);
    let mut feed = SimulatedDataFeed::new(clock.clone());
    feed.initialize(config(13)).unwrap();
    feed.start().unwrap();

    let symbol = Symbol::new("BTC");
    for _ in 0..50 {
        feed.poll(clock.now_ms()).unwrap();
        clock.advance(1_000);

        let book = feed.order_book(&symbol).unwrap();
        assert!(book.is_valid());
        assert!(book.bids.windows(2).all(|w| w[0].price > w[1].price));
        assert!(book.asks.windows(2).all(|w| w[0].price < w[1].price));
        assert!(book.best_ask().unwrap() > book.best_bid().unwrap());
    }
}

fn run_historical_synthetic(seed: u64, polls: usize) -> Vec<(String, i64, Decimal)> {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(START);
    let mut feed = HistoricalDataFeed::new(clock.clone(), dir.path());
    feed.initialize(
        FeedConfig::with_symbol_names(["BTC", "ETH"])
            .with_seed(seed)
            .with_replay_speed(1_000.0),
    )
    .unwrap();

    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    feed.on_tick(Box::new(move |tick| {
        sink.lock()
            .unwrap()
            .push((tick.symbol.to_string(), tick.timestamp_ms, tick.price));
        Ok(())
    }));

    feed.start().unwrap();
    for _ in 0..polls {
        feed.poll(clock.now_ms()).unwrap();
        clock.advance(10);
    }

    let log = ticks.lock().unwrap().clone();
    log
}

#[test]
fn test_historical_synthetic_dual_run_identical() {
    let a = run_historical_synthetic(42, 200);
    let b = run_historical_synthetic(42, 200);

    assert_eq!(a.len(), 400); // 200 polls x 2 symbols
    assert_eq!(a, b);
}

#[test]
fn test_historical_synthetic_seed_divergence() {
    let a = run_historical_synthetic(1, 50);
    let b = run_historical_synthetic(2, 50);

    // Timestamps agree (same synthetic grid), prices do not.
    let prices_a: Vec<&Decimal> = a.iter().map(|(_, _, p)| p).collect();
    let prices_b: Vec<&Decimal> = b.iter().map(|(_, _, p)| p).collect();
    assert_ne!(prices_a, prices_b);
}

#[test]
fn test_historical_symbols_are_decorrelated() {
    let log = run_historical_synthetic(42, 100);

    let btc: Vec<Decimal> = log
        .iter()
        .filter(|(s, ..)| s == "BTC")
        .map(|(_, _, p)| *p)
        .collect();
    let eth: Vec<Decimal> = log
        .iter()
        .filter(|(s, ..)| s == "ETH")
        .map(|(_, _, p)| *p)
        .collect();

    // Same walk applied to both symbols would make the price ratios
    // constant; distinct sub-seeds keep the paths independent.
    let ratio_first = btc[0] / eth[0];
    let ratio_last = btc[btc.len() - 1] / eth[eth.len() - 1];
    assert_ne!(ratio_first, ratio_last);
}

#[test]
fn test_seek_then_replay_matches_straight_replay() {
    let dir = tempfile::tempdir().unwrap();
    let build = || {
        let clock = ManualClock::new(START);
        let mut feed = HistoricalDataFeed::new(clock, dir.path());
        feed.initialize(FeedConfig::with_symbol_names(["BTC"]).with_seed(9))
            .unwrap();
        feed
    };
    let symbol = Symbol::new("BTC");

    // Straight replay: pull everything, remember the ticks after `target`.
    let mut straight = build();
    let (start, end) = straight.time_range().unwrap();
    let target = start + (end - start) / 2;
    let mut expected = Vec::new();
    while let Some(tick) = straight.next_tick(&symbol) {
        if tick.timestamp_ms >= target {
            expected.push((tick.timestamp_ms, tick.price));
        }
        if expected.len() >= 20 {
            break;
        }
    }

    // Seek replay: jump to `target` and pull the same count.
    let mut seeked = build();
    seeked.jump_to_time(target).unwrap();
    let mut actual = Vec::new();
    for _ in 0..expected.len() {
        let tick = seeked.next_tick(&symbol).unwrap();
        actual.push((tick.timestamp_ms, tick.price));
    }

    assert_eq!(expected, actual);
}
