//! Simulated data feed
//!
//! Generates ticks live from the stochastic price process and MEV event
//! model. Feed time is wall-clock scaled by the replay speed; there is no
//! finite dataset and seeks are forward-only.
//!
//! Two independent timer chains run while the feed is live: the tick loop
//! and a slower 1-minute candle aggregation loop that closes candles
//! through quiet periods.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use stochastic::{
    MarketRegimeModel, MevEventModel, PriceProcess, RandomnessSource, SimulationParameters,
};
use types::anomaly::MarketAnomaly;
use types::book::{LiquidityMetrics, OrderBookSnapshot};
use types::candle::{Candle, Timeframe};
use types::config::FeedConfig;
use types::errors::{FeedError, SeekError};
use types::stats::{FeedKind, FeedStatistics};
use types::symbol::Symbol;
use types::tick::{Tick, TickSource};

use crate::candles::CandleBuilder;
use crate::clock::{hour_of_day, Clock};
use crate::depth::{price_decimal, quantity_decimal, synthesize_order_book};
use crate::feed::{DataFeed, FeedCore, FeedState};
use crate::historical::base_price;
use crate::subscription::{Callback, SubscriptionId};

/// Base tick interval before replay-speed scaling.
const BASE_TICK_INTERVAL_MS: i64 = 1_000;
/// Base candle-aggregation interval before replay-speed scaling.
const BASE_CANDLE_INTERVAL_MS: i64 = 60_000;
/// Ticks retained per symbol in the ring buffer.
const TICK_RING_LIMIT: usize = 10_000;
/// Closed 1-minute candles retained per symbol.
const CANDLE_LIMIT: usize = 1_000;
/// Base per-step volume before scaling.
const BASE_VOLUME: f64 = 1_000.0;
/// Base spread fraction of price.
const BASE_SPREAD_FRACTION: f64 = 0.0005;
/// Blend weight of the freshly drawn spread target against the stored one.
const SPREAD_BLEND: f64 = 0.2;

/// Feed that synthesizes market data live from stochastic processes.
#[derive(Debug)]
pub struct SimulatedDataFeed {
    core: FeedCore,
    rng: RandomnessSource,
    process: PriceProcess,
    regimes: MarketRegimeModel,
    mev: MevEventModel,
    /// Current price per symbol (f64 domain of the process).
    prices: BTreeMap<Symbol, f64>,
    /// Last generated volume per symbol.
    last_volume: BTreeMap<Symbol, f64>,
    /// Evolving spread state per symbol.
    spreads: BTreeMap<Symbol, f64>,
    /// Ring buffer of emitted ticks per symbol.
    ticks: BTreeMap<Symbol, VecDeque<Tick>>,
    /// 1-minute candle aggregation per symbol.
    builders: BTreeMap<Symbol, CandleBuilder>,
    /// Simulated instant corresponding to `wall_anchor_ms`.
    sim_anchor_ms: i64,
    /// Wall instant the anchor was taken at; `None` while not running.
    wall_anchor_ms: Option<i64>,
    /// Last computed simulated time.
    current_sim_ms: i64,
    /// Simulated time the feed was initialized at.
    range_start_ms: i64,
    tick_due_ms: Option<i64>,
    candle_due_ms: Option<i64>,
    book_sequence: u64,
}

impl SimulatedDataFeed {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let mut rng = RandomnessSource::new(0);
        let regimes = MarketRegimeModel::with_default_catalog(&mut rng, 0);
        Self {
            core: FeedCore::new(FeedKind::Simulated, clock),
            rng,
            process: PriceProcess::new(SimulationParameters::default()),
            regimes,
            mev: MevEventModel::default(),
            prices: BTreeMap::new(),
            last_volume: BTreeMap::new(),
            spreads: BTreeMap::new(),
            ticks: BTreeMap::new(),
            builders: BTreeMap::new(),
            sim_anchor_ms: 0,
            wall_anchor_ms: None,
            current_sim_ms: 0,
            range_start_ms: 0,
            tick_due_ms: None,
            candle_due_ms: None,
            book_sequence: 0,
        }
    }

    /// Live anomalies at the feed's current simulated time.
    pub fn active_anomalies(&mut self) -> Vec<MarketAnomaly> {
        let now = self.current_time();
        self.mev.get_active_anomalies(now)
    }

    /// Aggregated adversarial pressure on one symbol at simulated time.
    pub fn mev_impact(&mut self, symbol: &Symbol, side: types::tick::Side) -> stochastic::MevImpact {
        let now = self.current_time();
        self.mev.calculate_mev_impact(symbol, side, now)
    }

    /// Simulated time corresponding to the given wall instant.
    fn sim_time_at(&self, wall_now_ms: i64) -> i64 {
        match self.wall_anchor_ms {
            Some(anchor) => {
                let elapsed = (wall_now_ms - anchor).max(0) as f64;
                self.sim_anchor_ms + (elapsed * self.core.replay_speed) as i64
            }
            None => self.current_sim_ms,
        }
    }

    /// Re-anchor the sim/wall mapping at the current instant.
    ///
    /// Keeps simulated time continuous across speed changes and seeks.
    fn re_anchor(&mut self, sim_ms: i64) {
        self.sim_anchor_ms = sim_ms;
        self.current_sim_ms = sim_ms;
        if self.wall_anchor_ms.is_some() {
            self.wall_anchor_ms = Some(self.core.clock.now_ms());
        }
    }

    /// Advance the stored spread for a symbol through the evolution
    /// formula and return the new value. Shared by the tick loop and the
    /// book accessor, so reading the book also moves the spread.
    fn evolve_spread(&mut self, symbol: &Symbol, sim_now_ms: i64) -> f64 {
        let price = self.prices.get(symbol).copied().unwrap_or(0.0);
        let base = price * BASE_SPREAD_FRACTION;
        let hour = hour_of_day(sim_now_ms);
        let target = self.process.generate_spread(
            base,
            self.process.params().volatility,
            self.core.config.liquidity_multiplier,
            hour,
            &mut self.rng,
        );
        let current = self.spreads.get(symbol).copied().unwrap_or(target);
        let evolved = current * (1.0 - SPREAD_BLEND) + target * SPREAD_BLEND;
        self.spreads.insert(symbol.clone(), evolved);
        evolved
    }

    /// Generate the next tick for one symbol at the given simulated time.
    ///
    /// Updates price/volume/spread state, the ring buffer, the candle
    /// builder and the statistics. Returns the tick and any candle closed
    /// by it.
    fn generate_tick(&mut self, symbol: &Symbol, sim_now_ms: i64) -> (Tick, Option<Candle>) {
        let regime = self.regimes.current(&mut self.rng, sim_now_ms).clone();
        let current = self
            .prices
            .get(symbol)
            .copied()
            .unwrap_or_else(|| base_price(symbol));

        let mut price =
            self.process
                .generate_price(symbol, current, &regime, &mut self.rng, sim_now_ms);
        if let Some(factor) = self
            .process
            .simulate_volatility_burst(self.core.config.volatility_multiplier, &mut self.rng)
        {
            price = (price * factor).max(current * 0.001);
        }

        let hour = hour_of_day(sim_now_ms);
        let volume = self.process.generate_volume(
            BASE_VOLUME,
            hour,
            self.process.params().volatility,
            &regime,
            &mut self.rng,
        );

        self.prices.insert(symbol.clone(), price);
        self.last_volume.insert(symbol.clone(), volume);
        self.evolve_spread(symbol, sim_now_ms);

        let tick = Tick {
            symbol: symbol.clone(),
            timestamp_ms: sim_now_ms,
            price: price_decimal(price),
            volume: quantity_decimal(volume),
            source: TickSource::Simulated,
        };

        let ring = self.ticks.entry(symbol.clone()).or_default();
        if ring.len() >= TICK_RING_LIMIT {
            ring.pop_front();
        }
        ring.push_back(tick.clone());

        let closed = self
            .builders
            .entry(symbol.clone())
            .or_insert_with(|| CandleBuilder::new(Timeframe::M1, symbol.clone(), CANDLE_LIMIT))
            .process_tick(tick.price, tick.volume, sim_now_ms);

        self.core.stats.record_tick(sim_now_ms);
        (tick, closed)
    }

    /// One scheduled tick iteration across all symbols, in order.
    fn run_tick_step(&mut self, sim_now_ms: i64) -> Result<u32, FeedError> {
        let symbols = self.core.config.symbols.clone();
        let mut emitted = 0u32;

        for symbol in &symbols {
            let (tick, closed) = self.generate_tick(symbol, sim_now_ms);

            if let Err(err) = self.core.tick_subs.emit(&tick) {
                return Err(self.fail_loop(&err.to_string()));
            }
            emitted += 1;

            if let Some(candle) = closed {
                if let Err(err) = self.core.emit_candle(&candle) {
                    return Err(self.fail_loop(&err.to_string()));
                }
            }

            if !self.core.book_subs.is_empty() {
                if let Some(book) = self.order_book(symbol) {
                    if let Err(err) = self.core.book_subs.emit(&book) {
                        return Err(self.fail_loop(&err.to_string()));
                    }
                }
            }
        }

        if self.core.config.enable_anomalies {
            let quotes: Vec<(Symbol, f64)> = symbols
                .iter()
                .filter_map(|s| self.prices.get(s).map(|p| (s.clone(), *p)))
                .collect();
            if let Some(anomaly) = self.mev.inject_random_mev_activity(
                &quotes,
                self.core.config.anomaly_frequency,
                &mut self.rng,
                sim_now_ms,
            ) {
                if let Err(err) = self.core.emit_anomaly(&anomaly) {
                    return Err(self.fail_loop(&err.to_string()));
                }
            }
        }

        Ok(emitted)
    }

    /// Close any candles whose period has fully elapsed (quiet-period
    /// closure driven by the candle timer chain).
    fn run_candle_step(&mut self, sim_now_ms: i64) -> Result<(), FeedError> {
        let symbols: Vec<Symbol> = self.builders.keys().cloned().collect();
        for symbol in symbols {
            let closed = self
                .builders
                .get_mut(&symbol)
                .and_then(|builder| builder.flush(sim_now_ms));
            if let Some(candle) = closed {
                if let Err(err) = self.core.emit_candle(&candle) {
                    return Err(self.fail_loop(&err.to_string()));
                }
            }
        }
        Ok(())
    }

    fn fail_loop(&mut self, reason: &str) -> FeedError {
        self.tick_due_ms = None;
        self.candle_due_ms = None;
        self.core.fail(reason)
    }
}

impl DataFeed for SimulatedDataFeed {
    fn kind(&self) -> FeedKind {
        FeedKind::Simulated
    }

    fn state(&self) -> FeedState {
        self.core.state
    }

    fn initialize(&mut self, config: FeedConfig) -> Result<(), FeedError> {
        config.validate()?;

        let now = self.core.clock.now_ms();
        self.rng.reset(config.seed);
        self.process = PriceProcess::new(SimulationParameters {
            volatility: SimulationParameters::default().volatility * config.volatility_multiplier,
            ..SimulationParameters::default()
        });
        self.regimes = MarketRegimeModel::with_default_catalog(&mut self.rng, now);
        self.mev.reset();

        self.prices.clear();
        self.last_volume.clear();
        self.spreads.clear();
        self.ticks.clear();
        self.builders.clear();
        for symbol in &config.symbols {
            let price = base_price(symbol);
            self.prices.insert(symbol.clone(), price);
            self.spreads
                .insert(symbol.clone(), price * BASE_SPREAD_FRACTION);
            self.builders.insert(
                symbol.clone(),
                CandleBuilder::new(Timeframe::M1, symbol.clone(), CANDLE_LIMIT),
            );
        }

        self.sim_anchor_ms = now;
        self.current_sim_ms = now;
        self.range_start_ms = now;
        self.wall_anchor_ms = None;
        self.tick_due_ms = None;
        self.candle_due_ms = None;
        self.book_sequence = 0;

        self.core.apply_config(config);
        self.core.stats = FeedStatistics::new(FeedKind::Simulated);
        self.core.started_at_ms = None;
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
                self.wall_anchor_ms = Some(now);
                self.tick_due_ms = Some(now);
                self.candle_due_ms =
                    Some(now + self.core.scaled_interval_ms(BASE_CANDLE_INTERVAL_MS));
                self.core.state = FeedState::Running;
                info!(
                    symbols = self.core.config.symbols.len(),
                    replay_speed = self.core.replay_speed,
                    anomalies = self.core.config.enable_anomalies,
                    "simulated feed started"
                );
                Ok(())
            }
        }
    }

    fn pause(&mut self) {
        if self.core.state == FeedState::Running {
            let sim_now = self.sim_time_at(self.core.clock.now_ms());
            self.current_sim_ms = sim_now;
            self.sim_anchor_ms = sim_now;
            self.wall_anchor_ms = None;
            self.tick_due_ms = None;
            self.candle_due_ms = None;
            self.core.state = FeedState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.core.state == FeedState::Paused {
            let now = self.core.clock.now_ms();
            self.wall_anchor_ms = Some(now);
            self.tick_due_ms = Some(now);
            self.candle_due_ms = Some(now + self.core.scaled_interval_ms(BASE_CANDLE_INTERVAL_MS));
            self.core.state = FeedState::Running;
        }
    }

    fn stop(&mut self) {
        if self.core.state == FeedState::Running {
            let sim_now = self.sim_time_at(self.core.clock.now_ms());
            self.current_sim_ms = sim_now;
            self.sim_anchor_ms = sim_now;
        }
        self.wall_anchor_ms = None;
        self.tick_due_ms = None;
        self.candle_due_ms = None;
        if matches!(self.core.state, FeedState::Running | FeedState::Paused) {
            self.core.state = FeedState::Stopped;
        }
    }

    fn reset(&mut self) -> Result<(), FeedError> {
        if self.core.state == FeedState::Created {
            return Err(FeedError::NotInitialized);
        }
        // Rewind is a fresh initialization from the retained config.
        let config = self.core.config.clone();
        self.stop();
        self.initialize(config)
    }

    fn cleanup(&mut self) {
        self.stop();
        self.prices.clear();
        self.last_volume.clear();
        self.spreads.clear();
        self.ticks.clear();
        self.builders.clear();
        self.process.reset();
        self.mev.reset();
        self.core.clear_subscribers();
        self.core.state = FeedState::Created;
    }

    fn current_time(&self) -> i64 {
        self.sim_time_at(self.core.clock.now_ms())
    }

    fn time_range(&self) -> Option<(i64, i64)> {
        if self.core.state == FeedState::Created {
            return None;
        }
        Some((self.range_start_ms, self.current_time()))
    }

    fn jump_to_time(&mut self, timestamp_ms: i64) -> Result<(), FeedError> {
        if self.core.state == FeedState::Created {
            return Err(FeedError::NotInitialized);
        }
        let current = self.current_time();
        if timestamp_ms < current {
            return Err(SeekError::Backward {
                requested: timestamp_ms,
                current,
            }
            .into());
        }
        // Forward-only: move the anchor without emitting skipped ticks.
        self.re_anchor(timestamp_ms);
        Ok(())
    }

    fn set_replay_speed(&mut self, speed: f64) -> f64 {
        // Re-anchor first so already-elapsed time keeps the old scale.
        let sim_now = self.sim_time_at(self.core.clock.now_ms());
        self.re_anchor(sim_now);
        self.core.set_replay_speed(speed)
    }

    fn replay_speed(&self) -> f64 {
        self.core.replay_speed
    }

    fn next_tick(&mut self, symbol: &Symbol) -> Option<Tick> {
        if self.core.state == FeedState::Created || !self.prices.contains_key(symbol) {
            return None;
        }
        let sim_now = self.current_time();
        self.current_sim_ms = sim_now;
        let (tick, _closed) = self.generate_tick(symbol, sim_now);
        Some(tick)
    }

    fn current_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.get(symbol).map(|p| price_decimal(*p))
    }

    fn order_book(&mut self, symbol: &Symbol) -> Option<OrderBookSnapshot> {
        let price = self.prices.get(symbol).copied()?;
        let sim_now = self.current_time();
        // Not a pure read: every synthesis advances the stored spread.
        let spread = self.evolve_spread(symbol, sim_now);
        self.book_sequence += 1;
        synthesize_order_book(
            symbol,
            sim_now,
            self.book_sequence,
            price,
            spread,
            self.core.config.liquidity_multiplier,
        )
    }

    fn liquidity_metrics(&mut self, symbol: &Symbol) -> Option<LiquidityMetrics> {
        let profile = {
            let ring = self.ticks.get(symbol);
            let latest = ring
                .and_then(|r| r.back())
                .and_then(|t| {
                    use rust_decimal::prelude::ToPrimitive;
                    t.volume.to_f64()
                })
                .unwrap_or(0.0);
            let baseline = self.last_volume.get(symbol).copied().unwrap_or(BASE_VOLUME);
            if baseline > 0.0 {
                latest / baseline
            } else {
                1.0
            }
        };
        let snapshot = self.order_book(symbol)?;
        Some(LiquidityMetrics::from_snapshot(&snapshot, profile))
    }

    fn volume_estimate(&mut self, symbol: &Symbol) -> Option<Decimal> {
        if !self.prices.contains_key(symbol) {
            return None;
        }
        let volume = self
            .last_volume
            .get(symbol)
            .copied()
            .unwrap_or(BASE_VOLUME * self.core.config.liquidity_multiplier);
        Some(quantity_decimal(volume))
    }

    fn candles(&self, symbol: &Symbol, timeframe: Timeframe, limit: usize) -> Vec<Candle> {
        let builder = match self.builders.get(symbol) {
            Some(builder) => builder,
            None => return Vec::new(),
        };
        let m1 = builder.get_candles(limit.max(1) * (timeframe.duration_ms() / 60_000) as usize);
        if timeframe == Timeframe::M1 {
            let skip = m1.len().saturating_sub(limit);
            return m1.into_iter().skip(skip).collect();
        }
        crate::candles::aggregate_series(&m1, timeframe, limit)
    }

    fn tick_history(&self, symbol: &Symbol, limit: usize) -> Vec<Tick> {
        let ring = match self.ticks.get(symbol) {
            Some(ring) => ring,
            None => return Vec::new(),
        };
        let skip = ring.len().saturating_sub(limit);
        ring.iter().skip(skip).cloned().collect()
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
        match self.core.emit_anomaly(&anomaly) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail_loop(&err.to_string())),
        }
    }

    fn statistics(&self) -> FeedStatistics {
        let mut stats = self.core.statistics();
        stats.current_timestamp_ms = self.current_time();
        stats
    }

    fn update_config(&mut self, config: FeedConfig) -> Result<(), FeedError> {
        config.validate()?;
        if config.symbols != self.core.config.symbols
            || config.seed != self.core.config.seed
            || config.volatility_multiplier != self.core.config.volatility_multiplier
        {
            // Data-shaping fields changed: rebuild the stochastic state.
            return self.initialize(config);
        }
        self.core.apply_config(config);
        Ok(())
    }

    fn next_due_ms(&self) -> Option<i64> {
        match (self.tick_due_ms, self.candle_due_ms) {
            (Some(tick), Some(candle)) => Some(tick.min(candle)),
            (Some(tick), None) => Some(tick),
            (None, Some(candle)) => Some(candle),
            (None, None) => None,
        }
    }

    fn poll(&mut self, now_ms: i64) -> Result<u32, FeedError> {
        if self.core.state != FeedState::Running {
            return Ok(0);
        }

        let sim_now = self.sim_time_at(now_ms);
        self.current_sim_ms = sim_now;
        let mut emitted = 0u32;

        if self.tick_due_ms.is_some_and(|due| now_ms >= due) {
            emitted += self.run_tick_step(sim_now)?;
            self.tick_due_ms =
                Some(now_ms + self.core.scaled_interval_ms(BASE_TICK_INTERVAL_MS));
        }

        if self.candle_due_ms.is_some_and(|due| now_ms >= due) {
            self.run_candle_step(sim_now)?;
            self.candle_due_ms =
                Some(now_ms + self.core.scaled_interval_ms(BASE_CANDLE_INTERVAL_MS));
        }

        Ok(emitted)
    }
}
