//! Order book snapshots and liquidity metrics
//!
//! Snapshots are synthesized by feeds from the current price and spread.
//! Bids are strictly decreasing, asks strictly increasing, and the best ask
//! is always above the best bid. A SHA-256 content checksum supports
//! integrity comparison across replays.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::symbol::Symbol;

/// A single price level in a synthesized order book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// The price of this level.
    pub price: Decimal,
    /// Total quantity resting at this level.
    pub quantity: Decimal,
    /// Number of orders aggregated into this level.
    pub order_count: u32,
}

/// A point-in-time view of the order book for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// Trading symbol.
    pub symbol: Symbol,
    /// Snapshot time, Unix milliseconds.
    pub timestamp_ms: i64,
    /// Monotonic per-feed snapshot sequence number.
    pub sequence: u64,
    /// Bid levels in descending price order (best first).
    pub bids: Vec<BookLevel>,
    /// Ask levels in ascending price order (best first).
    pub asks: Vec<BookLevel>,
    /// Absolute spread between best ask and best bid.
    pub spread: Decimal,
    /// Midpoint between best bid and best ask.
    pub mid_price: Decimal,
}

impl OrderBookSnapshot {
    /// Best bid price, if any bids exist.
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price, if any asks exist.
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Validate the book ordering invariants.
    ///
    /// Bids must be strictly decreasing, asks strictly increasing, and the
    /// best ask strictly above the best bid.
    pub fn is_valid(&self) -> bool {
        let bids_ordered = self.bids.windows(2).all(|w| w[0].price > w[1].price);
        let asks_ordered = self.asks.windows(2).all(|w| w[0].price < w[1].price);
        let crossed = match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask > bid,
            _ => true,
        };
        let positive = self
            .bids
            .iter()
            .chain(self.asks.iter())
            .all(|l| l.price > Decimal::ZERO && l.quantity >= Decimal::ZERO);
        bids_ordered && asks_ordered && crossed && positive
    }

    /// Compute a SHA-256 checksum over the full level content.
    ///
    /// Two snapshots with identical levels and sequence produce identical
    /// checksums, which determinism tests compare across replays.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.symbol.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.sequence.to_be_bytes());
        for level in &self.bids {
            hasher.update(level.price.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(level.quantity.to_string().as_bytes());
            hasher.update(b",");
        }
        hasher.update(b"---");
        for level in &self.asks {
            hasher.update(level.price.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(level.quantity.to_string().as_bytes());
            hasher.update(b",");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Aggregate liquidity measurements derived from a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityMetrics {
    /// Trading symbol.
    pub symbol: Symbol,
    /// Measurement time, Unix milliseconds.
    pub timestamp_ms: i64,
    /// Total quantity resting on the bid side.
    pub bid_liquidity: Decimal,
    /// Total quantity resting on the ask side.
    pub ask_liquidity: Decimal,
    /// Spread expressed in basis points of the mid price.
    pub spread_bps: f64,
    /// Depth score in [0, 1]: how evenly liquidity is distributed.
    pub depth_score: f64,
    /// Ratio of current volume to a recent baseline.
    pub volume_profile: f64,
}

impl LiquidityMetrics {
    /// Derive metrics from a snapshot and a volume baseline ratio.
    pub fn from_snapshot(snapshot: &OrderBookSnapshot, volume_profile: f64) -> Self {
        let bid_liquidity: Decimal = snapshot.bids.iter().map(|l| l.quantity).sum();
        let ask_liquidity: Decimal = snapshot.asks.iter().map(|l| l.quantity).sum();

        let spread_bps = if snapshot.mid_price > Decimal::ZERO {
            let ratio = snapshot.spread / snapshot.mid_price;
            ratio.to_f64().unwrap_or(0.0) * 10_000.0
        } else {
            0.0
        };

        // Depth score: balance between the two sides, 1.0 = perfectly even.
        let total = bid_liquidity + ask_liquidity;
        let depth_score = if total > Decimal::ZERO {
            let min_side = bid_liquidity.min(ask_liquidity);
            (min_side / total).to_f64().unwrap_or(0.0) * 2.0
        } else {
            0.0
        };

        Self {
            symbol: snapshot.symbol.clone(),
            timestamp_ms: snapshot.timestamp_ms,
            bid_liquidity,
            ask_liquidity,
            spread_bps,
            depth_score,
            volume_profile,
        }
    }
}
