//! The data feed contract
//!
//! Both feed implementations share one lifecycle and subscription surface:
//!
//! ```text
//! Created ──initialize──▶ Initialized ──start──▶ Running ◀─resume── Paused
//!                              ▲                    │  │              ▲
//!                              └───────reset────────┘  └────pause─────┘
//!                                                   │
//!                                        stop / loop failure
//!                                                   ▼
//!                                          Stopped / Failed
//! ```
//!
//! Scheduling is cooperative and single-threaded: a feed exposes its next
//! due time and a `poll(now)` that performs all work due at that instant,
//! re-arming itself afterwards. The async `drive` loop pumps a feed in real
//! time; tests pump it directly with a `ManualClock`.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::error;

use types::anomaly::MarketAnomaly;
use types::book::{LiquidityMetrics, OrderBookSnapshot};
use types::candle::{Candle, Timeframe};
use types::config::{clamp_replay_speed, FeedConfig};
use types::errors::FeedError;
use types::stats::{FeedKind, FeedStatistics};
use types::symbol::Symbol;
use types::tick::Tick;

use crate::clock::Clock;
use crate::subscription::{
    Callback, SubscriberError, SubscriberRegistry, SubscriptionChannel, SubscriptionId,
};

/// Lifecycle state of a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    /// Constructed, not yet configured.
    Created,
    /// Configured and loaded, ready to start.
    Initialized,
    /// Emitting on schedule.
    Running,
    /// Suspended; cursor and price state retained.
    Paused,
    /// Stopped explicitly or by data exhaustion.
    Stopped,
    /// Stopped by a replay-loop failure; requires `start` to recover.
    Failed,
}

/// Uniform lifecycle + subscription contract over feed implementations.
pub trait DataFeed: Send {
    /// Which implementation this is.
    fn kind(&self) -> FeedKind;

    /// Current lifecycle state.
    fn state(&self) -> FeedState;

    /// Load or generate per-symbol data and compute the time range.
    /// Replaces any previous configuration wholesale.
    fn initialize(&mut self, config: FeedConfig) -> Result<(), FeedError>;

    /// Begin emission. Idempotent while already running; also recovers a
    /// `Failed` feed.
    fn start(&mut self) -> Result<(), FeedError>;

    /// Suspend emission without losing cursor state.
    fn pause(&mut self);

    /// Continue emission from the retained state.
    fn resume(&mut self);

    /// Stop emission.
    fn stop(&mut self);

    /// Rewind to the start of data and clear statistics. Implies `stop`.
    fn reset(&mut self) -> Result<(), FeedError>;

    /// Release all data, state and subscribers.
    fn cleanup(&mut self);

    /// The feed's current simulated time, Unix milliseconds.
    fn current_time(&self) -> i64;

    /// Covered data range, when known.
    fn time_range(&self) -> Option<(i64, i64)>;

    /// Move the feed's cursor to `timestamp_ms`.
    fn jump_to_time(&mut self, timestamp_ms: i64) -> Result<(), FeedError>;

    /// Set the replay speed, clamped into [0.1, 1000]. Returns the value
    /// actually applied.
    fn set_replay_speed(&mut self, speed: f64) -> f64;

    /// Current replay speed.
    fn replay_speed(&self) -> f64;

    /// Pull the next tick for a symbol. Shares the cursor with the
    /// scheduled loop; `None` is terminal for exhausted historical data.
    fn next_tick(&mut self, symbol: &Symbol) -> Option<Tick>;

    /// Latest known price for a symbol.
    fn current_price(&self, symbol: &Symbol) -> Option<Decimal>;

    /// Synthesize an order book snapshot for a symbol.
    ///
    /// Takes `&mut self`: the simulated feed advances its stored spread as
    /// a side effect of every synthesis.
    fn order_book(&mut self, symbol: &Symbol) -> Option<OrderBookSnapshot>;

    /// Liquidity metrics derived from a fresh snapshot.
    fn liquidity_metrics(&mut self, symbol: &Symbol) -> Option<LiquidityMetrics>;

    /// Estimated current per-step volume for a symbol.
    fn volume_estimate(&mut self, symbol: &Symbol) -> Option<Decimal>;

    /// Closed candles for a symbol at the given timeframe, oldest first.
    fn candles(&self, symbol: &Symbol, timeframe: Timeframe, limit: usize) -> Vec<Candle>;

    /// Recently emitted ticks for a symbol, oldest first.
    fn tick_history(&self, symbol: &Symbol, limit: usize) -> Vec<Tick>;

    /// Subscribe to emitted ticks.
    fn on_tick(&mut self, callback: Callback<Tick>) -> SubscriptionId;

    /// Subscribe to closed candles.
    fn on_candle(&mut self, callback: Callback<Candle>) -> SubscriptionId;

    /// Subscribe to order book updates.
    fn on_order_book(&mut self, callback: Callback<OrderBookSnapshot>) -> SubscriptionId;

    /// Subscribe to anomalies.
    fn on_anomaly(&mut self, callback: Callback<MarketAnomaly>) -> SubscriptionId;

    /// Release a subscription on any channel.
    fn unsubscribe(&mut self, id: SubscriptionId) -> bool;

    /// Publish an anomaly directly to subscribers, bypassing the MEV model.
    fn inject_anomaly(&mut self, anomaly: MarketAnomaly) -> Result<(), FeedError>;

    /// Snapshot of the runtime statistics.
    fn statistics(&self) -> FeedStatistics;

    /// Replace the configuration wholesale. The feed must be re-`start`ed
    /// if data-affecting fields changed.
    fn update_config(&mut self, config: FeedConfig) -> Result<(), FeedError>;

    /// Next instant at which `poll` has work to do, if any.
    fn next_due_ms(&self) -> Option<i64>;

    /// Perform all work due at `now_ms` and re-arm. Returns the number of
    /// ticks emitted. On error the feed is in `Failed` state.
    fn poll(&mut self, now_ms: i64) -> Result<u32, FeedError>;
}

/// Pump a feed in real time until it has no more scheduled work.
///
/// Sleeps until each due instant using the tokio timer, then polls. A loop
/// failure is returned after the feed has already transitioned to `Failed`.
pub async fn drive(feed: &mut dyn DataFeed, clock: Arc<dyn Clock>) -> Result<(), FeedError> {
    while let Some(due) = feed.next_due_ms() {
        let now = clock.now_ms();
        if due > now {
            tokio::time::sleep(std::time::Duration::from_millis((due - now) as u64)).await;
        }
        if let Err(err) = feed.poll(clock.now_ms()) {
            error!(error = %err, "feed loop failed, stopping drive");
            return Err(err);
        }
    }
    Ok(())
}

/// State and plumbing shared by both feed implementations.
pub(crate) struct FeedCore {
    pub state: FeedState,
    pub config: FeedConfig,
    pub stats: FeedStatistics,
    pub clock: Arc<dyn Clock>,
    pub replay_speed: f64,
    pub started_at_ms: Option<i64>,
    pub tick_subs: SubscriberRegistry<Tick>,
    pub candle_subs: SubscriberRegistry<Candle>,
    pub book_subs: SubscriberRegistry<OrderBookSnapshot>,
    pub anomaly_subs: SubscriberRegistry<MarketAnomaly>,
}

impl FeedCore {
    pub fn new(kind: FeedKind, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: FeedState::Created,
            config: FeedConfig::default(),
            stats: FeedStatistics::new(kind),
            clock,
            replay_speed: 1.0,
            started_at_ms: None,
            tick_subs: SubscriberRegistry::new(SubscriptionChannel::Tick),
            candle_subs: SubscriberRegistry::new(SubscriptionChannel::Candle),
            book_subs: SubscriberRegistry::new(SubscriptionChannel::OrderBook),
            anomaly_subs: SubscriberRegistry::new(SubscriptionChannel::Anomaly),
        }
    }

    /// Adopt a validated config, refreshing derived fields.
    pub fn apply_config(&mut self, config: FeedConfig) {
        self.replay_speed = config.clamped_replay_speed();
        self.config = config;
    }

    /// Apply the speed clamp and store the result.
    pub fn set_replay_speed(&mut self, speed: f64) -> f64 {
        self.replay_speed = clamp_replay_speed(speed);
        self.replay_speed
    }

    /// Emission interval after replay-speed scaling, at least 1ms.
    pub fn scaled_interval_ms(&self, base_interval_ms: i64) -> i64 {
        ((base_interval_ms as f64 / self.replay_speed) as i64).max(1)
    }

    /// Mark the feed failed after a loop error.
    pub fn fail(&mut self, reason: &str) -> FeedError {
        error!(reason, "replay loop failure, feed stopped");
        self.state = FeedState::Failed;
        FeedError::LoopFailure {
            reason: reason.to_string(),
        }
    }

    /// Release a subscription on whichever channel the token names.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match id.channel {
            SubscriptionChannel::Tick => self.tick_subs.unsubscribe(id),
            SubscriptionChannel::Candle => self.candle_subs.unsubscribe(id),
            SubscriptionChannel::OrderBook => self.book_subs.unsubscribe(id),
            SubscriptionChannel::Anomaly => self.anomaly_subs.unsubscribe(id),
        }
    }

    /// Drop all subscribers across every channel.
    pub fn clear_subscribers(&mut self) {
        self.tick_subs.clear();
        self.candle_subs.clear();
        self.book_subs.clear();
        self.anomaly_subs.clear();
    }

    /// Emit a closed candle and update counters.
    pub fn emit_candle(&mut self, candle: &Candle) -> Result<(), SubscriberError> {
        self.stats.record_candle();
        self.candle_subs.emit(candle)
    }

    /// Emit an anomaly and update counters.
    pub fn emit_anomaly(&mut self, anomaly: &MarketAnomaly) -> Result<(), SubscriberError> {
        self.stats.record_anomaly();
        self.anomaly_subs.emit(anomaly)
    }

    /// Statistics snapshot with wall-clock derived fields refreshed.
    pub fn statistics(&self) -> FeedStatistics {
        let mut stats = self.stats.clone();
        stats.observe_clock(self.clock.now_ms(), self.started_at_ms);
        stats
    }
}

impl std::fmt::Debug for FeedCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedCore")
            .field("state", &self.state)
            .field("kind", &self.stats.feed_kind)
            .field("replay_speed", &self.replay_speed)
            .field("symbols", &self.config.symbols.len())
            .finish()
    }
}
