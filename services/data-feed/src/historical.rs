//! Historical data feed
//!
//! Replays per-symbol OHLCV series loaded from disk, falling back to a
//! synthesized 30-day 1-minute random walk when no usable file exists.
//! Replay time is data time: `current_time` tracks the timestamp of the
//! last emitted tick, not the wall clock.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use rust_decimal::Decimal;
use tracing::{info, warn};

use stochastic::{MevEventModel, RandomnessSource};
use types::anomaly::MarketAnomaly;
use types::book::{LiquidityMetrics, OrderBookSnapshot};
use types::candle::{Candle, Timeframe};
use types::config::FeedConfig;
use types::errors::{DataError, FeedError, SeekError};
use types::stats::{FeedKind, FeedStatistics};
use types::symbol::Symbol;
use types::tick::{Tick, TickSource};

use crate::candles::aggregate_series;
use crate::clock::Clock;
use crate::depth::{price_decimal, quantity_decimal, synthesize_order_book};
use crate::feed::{DataFeed, FeedCore, FeedState};
use crate::subscription::{Callback, SubscriptionId};

/// Base emission interval before replay-speed scaling.
const BASE_TICK_INTERVAL_MS: i64 = 1_000;
/// Emitted ticks retained per symbol.
const TICK_HISTORY_LIMIT: usize = 10_000;
/// Synthesized dataset length: 30 days of 1-minute candles.
const SYNTHETIC_MINUTES: i64 = 30 * 24 * 60;
/// Per-minute return sigma of the synthetic random walk.
const SYNTHETIC_STEP_SIGMA: f64 = 0.0008;
/// Base spread fraction used for book synthesis.
const BASE_SPREAD_FRACTION: f64 = 0.0005;

/// Reference prices for synthetic dataset generation, per symbol.
pub(crate) fn base_price(symbol: &Symbol) -> f64 {
    match symbol.as_str() {
        "BTC" | "WBTC" | "BTC/USDT" | "BTC/USDC" => 45_000.0,
        "ETH" | "WETH" | "ETH/USDT" | "ETH/USDC" => 2_500.0,
        "SOL" | "SOL/USDT" => 100.0,
        "USDT" | "USDC" | "DAI" => 1.0,
        _ => 100.0,
    }
}

/// Stable per-symbol stream index for deriving sub-seeds.
pub(crate) fn symbol_stream(symbol: &Symbol) -> u64 {
    symbol
        .as_str()
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64))
}

/// Raw row shapes accepted from historical files.
#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawRow {
    /// `[timestamp | iso-string, open, high, low, close, volume]`
    Array(Vec<serde_json::Value>),
    /// Object row with optional short aliases.
    Object(RawObjectRow),
}

#[derive(Debug, serde::Deserialize)]
struct RawObjectRow {
    timestamp: RawTimestamp,
    #[serde(alias = "o")]
    open: f64,
    #[serde(alias = "h")]
    high: f64,
    #[serde(alias = "l")]
    low: f64,
    #[serde(alias = "c")]
    close: f64,
    #[serde(alias = "v")]
    volume: f64,
    #[serde(default)]
    trades: Option<u64>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Numeric(i64),
    Iso(String),
}

/// Normalize a timestamp to Unix milliseconds.
///
/// Numeric values below 1e11 are interpreted as seconds.
fn normalize_timestamp(raw: &RawTimestamp) -> Result<i64, String> {
    match raw {
        RawTimestamp::Numeric(value) => {
            if *value >= 100_000_000_000 {
                Ok(*value)
            } else {
                Ok(value * 1_000)
            }
        }
        RawTimestamp::Iso(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| format!("bad ISO timestamp {text:?}: {e}")),
    }
}

fn value_to_f64(value: &serde_json::Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected number, got {value}"))
}

fn array_row_to_candle(symbol: &Symbol, values: &[serde_json::Value]) -> Result<Candle, String> {
    if values.len() < 6 {
        return Err(format!("expected 6 columns, got {}", values.len()));
    }

    let timestamp = match &values[0] {
        serde_json::Value::String(s) => normalize_timestamp(&RawTimestamp::Iso(s.clone()))?,
        serde_json::Value::Number(n) => {
            let raw = n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or_else(|| format!("bad timestamp {n}"))?;
            normalize_timestamp(&RawTimestamp::Numeric(raw))?
        }
        other => return Err(format!("bad timestamp column {other}")),
    };

    Ok(build_candle(
        symbol,
        timestamp,
        value_to_f64(&values[1])?,
        value_to_f64(&values[2])?,
        value_to_f64(&values[3])?,
        value_to_f64(&values[4])?,
        value_to_f64(&values[5])?,
        None,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_candle(
    symbol: &Symbol,
    timestamp_ms: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    trades: Option<u64>,
) -> Candle {
    let open_time = Timeframe::M1.align_to_boundary(timestamp_ms);
    Candle {
        symbol: symbol.clone(),
        timeframe: Timeframe::M1,
        open_time_ms: open_time,
        close_time_ms: open_time + Timeframe::M1.duration_ms() - 1,
        open: price_decimal(open),
        high: price_decimal(high),
        low: price_decimal(low),
        close: price_decimal(close),
        volume: quantity_decimal(volume.max(0.0)),
        trade_count: trades.unwrap_or(1),
    }
}

/// Candidate file locations for a symbol, first match wins.
pub(crate) fn candidate_paths(root: &Path, symbol: &Symbol) -> [PathBuf; 3] {
    let stem = symbol.file_stem();
    [
        root.join("data").join("historical").join(format!("{stem}.json")),
        root.join("data").join(format!("{stem}_candles.json")),
        root.join("historical_data").join(format!("{stem}.json")),
    ]
}

/// Load and normalize the OHLCV series for a symbol from the first
/// existing candidate file.
pub(crate) fn load_series(root: &Path, symbol: &Symbol) -> Result<Vec<Candle>, DataError> {
    let path = candidate_paths(root, symbol)
        .into_iter()
        .find(|p| p.is_file())
        .ok_or_else(|| DataError::NotFound {
            symbol: symbol.to_string(),
        })?;

    let text = std::fs::read_to_string(&path).map_err(|e| DataError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let raw_rows: Vec<RawRow> = serde_json::from_str(&text).map_err(|e| DataError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut rows = Vec::with_capacity(raw_rows.len());
    for (index, raw) in raw_rows.iter().enumerate() {
        let candle = match raw {
            RawRow::Array(values) => array_row_to_candle(symbol, values),
            RawRow::Object(obj) => normalize_timestamp(&obj.timestamp).map(|ts| {
                build_candle(
                    symbol, ts, obj.open, obj.high, obj.low, obj.close, obj.volume, obj.trades,
                )
            }),
        }
        .map_err(|reason| DataError::Parse {
            path: path.display().to_string(),
            reason: format!("row {index}: {reason}"),
        })?;
        rows.push(candle);
    }

    if rows.is_empty() {
        return Err(DataError::Empty {
            symbol: symbol.to_string(),
        });
    }

    rows.sort_by_key(|c| c.open_time_ms);
    Ok(rows)
}

/// Synthesize a 30-day, 1-minute random-walk dataset ending at `end_ms`.
///
/// The walk starts from the symbol's base price; per-symbol sub-seeds keep
/// different symbols decorrelated under one feed seed.
pub(crate) fn synthesize_series(
    symbol: &Symbol,
    rng: &mut RandomnessSource,
    end_ms: i64,
) -> Vec<Candle> {
    let end = Timeframe::M1.align_to_boundary(end_ms);
    let start = end - SYNTHETIC_MINUTES * Timeframe::M1.duration_ms();
    let base = base_price(symbol);
    let base_volume = 50.0;

    let mut rows = Vec::with_capacity(SYNTHETIC_MINUTES as usize);
    let mut price = base;

    for minute in 0..SYNTHETIC_MINUTES {
        let open_time = start + minute * Timeframe::M1.duration_ms();
        let (z, _) = rng.next_normal_pair();
        let open = price;
        let close = (open * (1.0 + z * SYNTHETIC_STEP_SIGMA)).max(base * 0.001);
        let high = open.max(close) * (1.0 + rng.next_f64() * 0.0005);
        let low = (open.min(close) * (1.0 - rng.next_f64() * 0.0005)).max(base * 0.0005);
        let volume = base_volume * rng.next_range(0.5, 1.5);
        let trades = rng.next_range(5.0, 120.0) as u64;

        rows.push(build_candle(
            symbol,
            open_time,
            open,
            high,
            low,
            close,
            volume,
            Some(trades),
        ));
        price = close;
    }

    rows
}

/// Feed that replays recorded or synthesized OHLCV datasets.
#[derive(Debug)]
pub struct HistoricalDataFeed {
    core: FeedCore,
    data_root: PathBuf,
    rng: RandomnessSource,
    mev: MevEventModel,
    /// 1-minute source rows per symbol, sorted by open time.
    series: BTreeMap<Symbol, Vec<Candle>>,
    /// Monotonic replay cursor per symbol.
    cursors: BTreeMap<Symbol, usize>,
    /// Emitted ticks retained for `tick_history`.
    history: BTreeMap<Symbol, VecDeque<Tick>>,
    time_range: Option<(i64, i64)>,
    current_time_ms: i64,
    next_due_ms: Option<i64>,
    book_sequence: u64,
}

impl HistoricalDataFeed {
    /// Create an unconfigured feed rooted at `data_root` for file lookups.
    pub fn new(clock: Arc<dyn Clock>, data_root: impl Into<PathBuf>) -> Self {
        Self {
            core: FeedCore::new(FeedKind::Historical, clock),
            data_root: data_root.into(),
            rng: RandomnessSource::new(0),
            mev: MevEventModel::default(),
            series: BTreeMap::new(),
            cursors: BTreeMap::new(),
            history: BTreeMap::new(),
            time_range: None,
            current_time_ms: 0,
            next_due_ms: None,
            book_sequence: 0,
        }
    }

    /// Directory the candidate data paths are resolved against.
    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Live anomalies at the feed's current data time.
    pub fn active_anomalies(&mut self) -> Vec<MarketAnomaly> {
        self.mev.get_active_anomalies(self.current_time_ms)
    }

    /// Aggregated adversarial pressure on one symbol at data time.
    pub fn mev_impact(&mut self, symbol: &Symbol, side: types::tick::Side) -> stochastic::MevImpact {
        self.mev.calculate_mev_impact(symbol, side, self.current_time_ms)
    }

    /// Advance one symbol's cursor, producing its next tick.
    ///
    /// Updates the feed's data time and the bounded tick history. Returns
    /// `None` permanently once the symbol's series is exhausted.
    fn take_tick(&mut self, symbol: &Symbol) -> Option<Tick> {
        let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
        let (timestamp_ms, price, volume) = {
            let row = self.series.get(symbol)?.get(cursor)?;
            (row.open_time_ms, row.close, row.volume)
        };

        let tick = Tick {
            symbol: symbol.clone(),
            timestamp_ms,
            price,
            volume,
            source: TickSource::Historical,
        };

        self.cursors.insert(symbol.clone(), cursor + 1);
        self.current_time_ms = tick.timestamp_ms;
        self.core.stats.record_tick(tick.timestamp_ms);

        let buffer = self.history.entry(symbol.clone()).or_default();
        if buffer.len() >= TICK_HISTORY_LIMIT {
            buffer.pop_front();
        }
        buffer.push_back(tick.clone());

        Some(tick)
    }

    /// Source row most recently consumed for a symbol.
    fn last_row(&self, symbol: &Symbol) -> Option<&Candle> {
        let rows = self.series.get(symbol)?;
        let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
        if cursor == 0 {
            None
        } else {
            rows.get(cursor - 1)
        }
    }

    fn all_exhausted(&self) -> bool {
        self.core.config.symbols.iter().all(|symbol| {
            let len = self.series.get(symbol).map_or(0, Vec::len);
            self.cursors.get(symbol).copied().unwrap_or(0) >= len
        })
    }

    fn price_f64(&self, symbol: &Symbol) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        self.current_price(symbol).and_then(|p| p.to_f64())
    }

    fn spread_f64(&self, price: f64) -> f64 {
        price * BASE_SPREAD_FRACTION * self.core.config.volatility_multiplier
            / self.core.config.liquidity_multiplier.max(0.1)
    }

    /// Ratio of the latest volume to the trailing 20-row average.
    fn volume_profile(&self, symbol: &Symbol) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        let rows = match self.series.get(symbol) {
            Some(rows) => rows,
            None => return 1.0,
        };
        let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
        if cursor == 0 {
            return 1.0;
        }
        let window_start = cursor.saturating_sub(20);
        let window = &rows[window_start..cursor];
        let total: f64 = window
            .iter()
            .map(|r| r.volume.to_f64().unwrap_or(0.0))
            .sum();
        let average = total / window.len() as f64;
        let latest = window
            .last()
            .and_then(|r| r.volume.to_f64())
            .unwrap_or(0.0);
        if average > 0.0 {
            latest / average
        } else {
            1.0
        }
    }
}

impl DataFeed for HistoricalDataFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Historical
    }

    fn state(&self) -> FeedState {
        self.core.state
    }

    fn initialize(&mut self, config: FeedConfig) -> Result<(), FeedError> {
        config.validate()?;

        self.rng.reset(config.seed);
        self.mev.reset();
        self.series.clear();
        self.cursors.clear();
        self.history.clear();

        let now = self.core.clock.now_ms();
        for symbol in &config.symbols {
            let rows = match load_series(&self.data_root, symbol) {
                Ok(rows) => {
                    info!(
                        symbol = %symbol,
                        rows = rows.len(),
                        "loaded historical series"
                    );
                    rows
                }
                Err(err) => {
                    warn!(
                        symbol = %symbol,
                        error = %err,
                        "historical data unavailable, synthesizing dataset"
                    );
                    let mut sub_rng = self.rng.derive(symbol_stream(symbol));
                    synthesize_series(symbol, &mut sub_rng, now)
                }
            };
            self.cursors.insert(symbol.clone(), 0);
            self.series.insert(symbol.clone(), rows);
        }

        let start = self
            .series
            .values()
            .filter_map(|rows| rows.first().map(|r| r.open_time_ms))
            .min();
        let end = self
            .series
            .values()
            .filter_map(|rows| rows.last().map(|r| r.open_time_ms))
            .max();
        self.time_range = start.zip(end);
        self.current_time_ms = start.unwrap_or(0);

        self.core.apply_config(config);
        self.core.stats = FeedStatistics::new(FeedKind::Historical);
        self.core.started_at_ms = None;
        self.next_due_ms = None;
        self.core.state = FeedState::Initialized;
        Ok(())
    }

    fn start(&mut self) -> Result<(), FeedError> {
        match self.core.state {
            FeedState::Running => Ok(()),
            FeedState::Created => Err(FeedError::NotInitialized),
            _ => {
                let now = self.core.clock.now_ms();
                self.core.started_at_ms = Some(now);
                self.next_due_ms = Some(now);
                self.core.state = FeedState::Running;
                info!(
                    symbols = self.core.config.symbols.len(),
                    replay_speed = self.core.replay_speed,
                    "historical feed started"
                );
                Ok(())
            }
        }
    }

    fn pause(&mut self) {
        if self.core.state == FeedState::Running {
            self.next_due_ms = None;
            self.core.state = FeedState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.core.state == FeedState::Paused {
            self.next_due_ms = Some(self.core.clock.now_ms());
            self.core.state = FeedState::Running;
        }
    }

    fn stop(&mut self) {
        self.next_due_ms = None;
        if matches!(self.core.state, FeedState::Running | FeedState::Paused) {
            self.core.state = FeedState::Stopped;
        }
    }

    fn reset(&mut self) -> Result<(), FeedError> {
        if self.core.state == FeedState::Created {
            return Err(FeedError::NotInitialized);
        }
        self.stop();
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
        self.history.clear();
        self.mev.reset();
        self.core.stats = FeedStatistics::new(FeedKind::Historical);
        self.current_time_ms = self.time_range.map(|(start, _)| start).unwrap_or(0);
        self.core.state = FeedState::Initialized;
        Ok(())
    }

    fn cleanup(&mut self) {
        self.stop();
        self.series.clear();
        self.cursors.clear();
        self.history.clear();
        self.mev.reset();
        self.core.clear_subscribers();
        self.time_range = None;
        self.core.state = FeedState::Created;
    }

    fn current_time(&self) -> i64 {
        self.current_time_ms
    }

    fn time_range(&self) -> Option<(i64, i64)> {
        self.time_range
    }

    fn jump_to_time(&mut self, timestamp_ms: i64) -> Result<(), FeedError> {
        let (start, end) = self.time_range.ok_or(FeedError::NotInitialized)?;
        if timestamp_ms < start || timestamp_ms > end {
            return Err(SeekError::OutOfRange {
                requested: timestamp_ms,
                start,
                end,
            }
            .into());
        }

        for (symbol, rows) in &self.series {
            let cursor = rows.partition_point(|row| row.open_time_ms < timestamp_ms);
            self.cursors.insert(symbol.clone(), cursor);
        }
        self.current_time_ms = timestamp_ms;
        Ok(())
    }

    fn set_replay_speed(&mut self, speed: f64) -> f64 {
        self.core.set_replay_speed(speed)
    }

    fn replay_speed(&self) -> f64 {
        self.core.replay_speed
    }

    fn next_tick(&mut self, symbol: &Symbol) -> Option<Tick> {
        self.take_tick(symbol)
    }

    fn current_price(&self, symbol: &Symbol) -> Option<Decimal> {
        match self.last_row(symbol) {
            Some(row) => Some(row.close),
            None => self
                .series
                .get(symbol)
                .and_then(|rows| rows.first())
                .map(|row| row.open),
        }
    }

    fn order_book(&mut self, symbol: &Symbol) -> Option<OrderBookSnapshot> {
        let price = self.price_f64(symbol)?;
        let spread = self.spread_f64(price);
        self.book_sequence += 1;
        synthesize_order_book(
            symbol,
            self.current_time_ms,
            self.book_sequence,
            price,
            spread,
            self.core.config.liquidity_multiplier,
        )
    }

    fn liquidity_metrics(&mut self, symbol: &Symbol) -> Option<LiquidityMetrics> {
        let profile = self.volume_profile(symbol);
        let snapshot = self.order_book(symbol)?;
        Some(LiquidityMetrics::from_snapshot(&snapshot, profile))
    }

    fn volume_estimate(&mut self, symbol: &Symbol) -> Option<Decimal> {
        let rows = self.series.get(symbol)?;
        let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
        let window_start = cursor.saturating_sub(20);
        let window = if cursor == 0 {
            &rows[..rows.len().min(20)]
        } else {
            &rows[window_start..cursor]
        };
        if window.is_empty() {
            return None;
        }
        let total: Decimal = window.iter().map(|r| r.volume).sum();
        let average = total / Decimal::from(window.len());
        Some(average * quantity_decimal(self.core.config.liquidity_multiplier))
    }

    fn candles(&self, symbol: &Symbol, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let rows = match self.series.get(symbol) {
            Some(rows) => rows,
            None => return Vec::new(),
        };
        let cursor = self.cursors.get(symbol).copied().unwrap_or(0);
        aggregate_series(&rows[..cursor], timeframe, limit)
    }

    fn tick_history(&self, symbol: &Symbol, limit: usize) -> Vec<Tick> {
        let buffer = match self.history.get(symbol) {
            Some(buffer) => buffer,
            None => return Vec::new(),
        };
        let skip = buffer.len().saturating_sub(limit);
        buffer.iter().skip(skip).cloned().collect()
    }

    fn on_tick(&mut self, callback: Callback<Tick>) -> SubscriptionId {
        self.core.tick_subs.subscribe(callback)
    }

    fn on_candle(&mut self, callback: Callback<Candle>) -> SubscriptionId {
        self.core.candle_subs.subscribe(callback)
    }

    fn on_order_book(&mut self, callback: Callback<OrderBookSnapshot>) -> SubscriptionId {
        self.core.book_subs.subscribe(callback)
    }

    fn on_anomaly(&mut self, callback: Callback<MarketAnomaly>) -> SubscriptionId {
        self.core.anomaly_subs.subscribe(callback)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.core.unsubscribe(id)
    }

    fn inject_anomaly(&mut self, anomaly: MarketAnomaly) -> Result<(), FeedError> {
        self.mev.inject(anomaly.clone());
        self.core
            .emit_anomaly(&anomaly)
            .map_err(|err| self.core.fail(&err.to_string()))
    }

    fn statistics(&self) -> FeedStatistics {
        self.core.statistics()
    }

    fn update_config(&mut self, config: FeedConfig) -> Result<(), FeedError> {
        config.validate()?;
        if config.symbols != self.core.config.symbols {
            // Symbol set changed: reload datasets from scratch.
            return self.initialize(config);
        }
        self.core.apply_config(config);
        Ok(())
    }

    fn next_due_ms(&self) -> Option<i64> {
        self.next_due_ms
    }

    fn poll(&mut self, now_ms: i64) -> Result<u32, FeedError> {
        if self.core.state != FeedState::Running {
            return Ok(0);
        }
        let due = match self.next_due_ms {
            Some(due) => due,
            None => return Ok(0),
        };
        if now_ms < due {
            return Ok(0);
        }

        let symbols = self.core.config.symbols.clone();
        let mut emitted = 0u32;

        // Symbols are processed sequentially within one iteration; ticks
        // for this feed never overlap.
        for symbol in &symbols {
            let tick = match self.take_tick(symbol) {
                Some(tick) => tick,
                None => continue,
            };

            if let Err(err) = self.core.tick_subs.emit(&tick) {
                self.next_due_ms = None;
                return Err(self.core.fail(&err.to_string()));
            }
            emitted += 1;

            // Each consumed source row is itself a closed 1-minute candle.
            if let Some(row) = self.last_row(symbol).cloned() {
                if let Err(err) = self.core.emit_candle(&row) {
                    self.next_due_ms = None;
                    return Err(self.core.fail(&err.to_string()));
                }
            }
        }

        if self.core.config.enable_anomalies {
            let quotes: Vec<(Symbol, f64)> = symbols
                .iter()
                .filter_map(|s| self.price_f64(s).map(|p| (s.clone(), p)))
                .collect();
            if let Some(anomaly) = self.mev.inject_random_mev_activity(
                &quotes,
                self.core.config.anomaly_frequency,
                &mut self.rng,
                self.current_time_ms,
            ) {
                if let Err(err) = self.core.emit_anomaly(&anomaly) {
                    self.next_due_ms = None;
                    return Err(self.core.fail(&err.to_string()));
                }
            }
        }

        if self.all_exhausted() {
            info!("historical series exhausted, feed stopped");
            self.stop();
        } else {
            self.next_due_ms = Some(now_ms + self.core.scaled_interval_ms(BASE_TICK_INTERVAL_MS));
        }
        Ok(emitted)
    }
}
