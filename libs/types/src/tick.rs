//! Tick types
//!
//! A tick is a single timestamped price/volume observation emitted by a
//! feed for one symbol per scheduling step. All timestamps in this
//! workspace are Unix milliseconds.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Origin of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickSource {
    /// Replayed from a recorded or synthesized OHLCV dataset.
    Historical,
    /// Produced live by the stochastic price process.
    Simulated,
    /// Pushed in manually (e.g. test fixtures).
    Injected,
}

/// Trade side from the taker's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// A single price/volume observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    /// Instrument this tick belongs to.
    pub symbol: Symbol,
    /// Observation time, Unix milliseconds.
    pub timestamp_ms: i64,
    /// Last price. Always strictly positive.
    pub price: Decimal,
    /// Volume traded in this step. Never negative.
    pub volume: Decimal,
    /// Where this tick came from.
    pub source: TickSource,
}

impl Tick {
    /// Check the tick invariants: price > 0 and volume >= 0.
    pub fn is_valid(&self) -> bool {
        self.price > Decimal::ZERO && self.volume >= Decimal::ZERO
    }
}
