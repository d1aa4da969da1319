//! Per-feed runtime statistics
//!
//! Statistics are owned and mutated only by the feed they describe, so a
//! plain value type is enough under the single-threaded feed model.

use serde::{Deserialize, Serialize};

/// Concrete feed implementation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedKind {
    /// Replays recorded or synthesized OHLCV data.
    Historical,
    /// Generates data live from stochastic processes.
    Simulated,
}

impl FeedKind {
    /// Wire label for this kind, also used in factory-issued feed ids.
    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Historical => "historical",
            FeedKind::Simulated => "simulated",
        }
    }
}

/// Runtime counters and timing for one feed instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedStatistics {
    /// Which implementation produced these statistics.
    pub feed_kind: FeedKind,
    /// Total ticks emitted since the last reset.
    pub ticks_processed: u64,
    /// Total candles emitted since the last reset.
    pub candles_processed: u64,
    /// Total anomalies generated or injected since the last reset.
    pub anomalies_generated: u64,
    /// The feed's current simulated time, Unix milliseconds.
    pub current_timestamp_ms: i64,
    /// Lag between wall clock and the feed's data time.
    pub data_latency_ms: i64,
    /// Whether the feed tracks wall-clock time (simulated) or data time.
    pub is_real_time: bool,
    /// Milliseconds since the feed was last started.
    pub uptime_ms: i64,
}

impl FeedStatistics {
    /// Fresh statistics for a feed of the given kind.
    pub fn new(feed_kind: FeedKind) -> Self {
        Self {
            feed_kind,
            ticks_processed: 0,
            candles_processed: 0,
            anomalies_generated: 0,
            current_timestamp_ms: 0,
            data_latency_ms: 0,
            is_real_time: matches!(feed_kind, FeedKind::Simulated),
            uptime_ms: 0,
        }
    }

    /// Record an emitted tick at the given data time.
    pub fn record_tick(&mut self, timestamp_ms: i64) {
        self.ticks_processed += 1;
        self.current_timestamp_ms = timestamp_ms;
    }

    /// Record an emitted candle.
    pub fn record_candle(&mut self) {
        self.candles_processed += 1;
    }

    /// Record a generated or injected anomaly.
    pub fn record_anomaly(&mut self) {
        self.anomalies_generated += 1;
    }

    /// Update wall-clock derived fields.
    pub fn observe_clock(&mut self, wall_now_ms: i64, started_at_ms: Option<i64>) {
        self.data_latency_ms = (wall_now_ms - self.current_timestamp_ms).max(0);
        self.uptime_ms = started_at_ms.map_or(0, |t| (wall_now_ms - t).max(0));
    }
}
