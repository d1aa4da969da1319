//! OHLCV candle types
//!
//! Candle boundaries are aligned to epoch (e.g. 1m candles close on minute
//! boundaries). All arithmetic uses `Decimal`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Supported candle timeframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// 1 minute
    M1,
    /// 5 minutes
    M5,
    /// 15 minutes
    M15,
    /// 30 minutes
    M30,
    /// 1 hour
    H1,
    /// 4 hours
    H4,
    /// 1 day
    D1,
}

impl Timeframe {
    /// Duration of this timeframe in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60 * 1_000,
            Timeframe::M5 => 5 * 60 * 1_000,
            Timeframe::M15 => 15 * 60 * 1_000,
            Timeframe::M30 => 30 * 60 * 1_000,
            Timeframe::H1 => 3_600 * 1_000,
            Timeframe::H4 => 4 * 3_600 * 1_000,
            Timeframe::D1 => 86_400 * 1_000,
        }
    }

    /// All standard timeframes.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    /// Align a timestamp to this timeframe's boundary (floor).
    pub fn align_to_boundary(&self, timestamp_ms: i64) -> i64 {
        let duration = self.duration_ms();
        (timestamp_ms / duration) * duration
    }
}

/// A single OHLCV candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    /// Opening boundary of the candle period, Unix milliseconds.
    pub open_time_ms: i64,
    /// Last millisecond covered by this candle.
    pub close_time_ms: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub trade_count: u64,
}

impl Candle {
    /// Create a new candle from the first observation in this period.
    pub fn new(
        symbol: Symbol,
        timeframe: Timeframe,
        open_time_ms: i64,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        let close_time_ms = open_time_ms + timeframe.duration_ms() - 1;
        Self {
            symbol,
            timeframe,
            open_time_ms,
            close_time_ms,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
            trade_count: 1,
        }
    }

    /// Update the candle with a new observation.
    pub fn update(&mut self, price: Decimal, volume: Decimal) {
        if price > self.high {
            self.high = price;
        }
        if price < self.low {
            self.low = price;
        }
        self.close = price;
        self.volume += volume;
        self.trade_count += 1;
    }

    /// Create a flat (no-trade) candle for backfill.
    pub fn flat(symbol: Symbol, timeframe: Timeframe, open_time_ms: i64, prev_close: Decimal) -> Self {
        let close_time_ms = open_time_ms + timeframe.duration_ms() - 1;
        Self {
            symbol,
            timeframe,
            open_time_ms,
            close_time_ms,
            open: prev_close,
            high: prev_close,
            low: prev_close,
            close: prev_close,
            volume: Decimal::ZERO,
            trade_count: 0,
        }
    }

    /// Validate candle integrity (OHLCV invariants).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= Decimal::ZERO
            && self.close_time_ms > self.open_time_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute(m: i64) -> i64 {
        m * 60 * 1_000
    }

    #[test]
    fn test_timeframe_duration() {
        assert_eq!(Timeframe::M1.duration_ms(), 60_000);
        assert_eq!(Timeframe::H1.duration_ms(), 3_600_000);
        assert_eq!(Timeframe::D1.duration_ms(), 86_400_000);
    }

    #[test]
    fn test_timeframe_alignment() {
        let ts = minute(5) + 30_000; // 5m30s
        assert_eq!(Timeframe::M1.align_to_boundary(ts), minute(5));
        assert_eq!(Timeframe::M5.align_to_boundary(ts), minute(5));
        assert_eq!(Timeframe::M15.align_to_boundary(ts), minute(0));
    }

    #[test]
    fn test_candle_creation() {
        let candle = Candle::new(
            Symbol::new("BTC"),
            Timeframe::M1,
            minute(0),
            Decimal::from(50_000),
            Decimal::from(1),
        );

        assert_eq!(candle.open, Decimal::from(50_000));
        assert_eq!(candle.high, Decimal::from(50_000));
        assert_eq!(candle.low, Decimal::from(50_000));
        assert_eq!(candle.close, Decimal::from(50_000));
        assert_eq!(candle.trade_count, 1);
        assert!(candle.is_valid());
    }

    #[test]
    fn test_candle_update() {
        let mut candle = Candle::new(
            Symbol::new("BTC"),
            Timeframe::M1,
            minute(0),
            Decimal::from(50_000),
            Decimal::from(1),
        );

        candle.update(Decimal::from(51_000), Decimal::from(2)); // new high
        candle.update(Decimal::from(49_000), Decimal::from(3)); // new low
        candle.update(Decimal::from(50_500), Decimal::from(1)); // close

        assert_eq!(candle.open, Decimal::from(50_000));
        assert_eq!(candle.high, Decimal::from(51_000));
        assert_eq!(candle.low, Decimal::from(49_000));
        assert_eq!(candle.close, Decimal::from(50_500));
        assert_eq!(candle.volume, Decimal::from(7));
        assert_eq!(candle.trade_count, 4);
        assert!(candle.is_valid());
    }

    #[test]
    fn test_candle_integrity_validation() {
        let invalid = Candle {
            symbol: Symbol::new("BTC"),
            timeframe: Timeframe::M1,
            open_time_ms: minute(0),
            close_time_ms: minute(1) - 1,
            open: Decimal::from(50_000),
            high: Decimal::from(49_000), // high < open → invalid
            low: Decimal::from(48_000),
            close: Decimal::from(49_500),
            volume: Decimal::from(1),
            trade_count: 1,
        };
        assert!(!invalid.is_valid());
    }

    #[test]
    fn test_flat_candle() {
        let candle = Candle::flat(
            Symbol::new("ETH"),
            Timeframe::M1,
            minute(2),
            Decimal::from(2_500),
        );
        assert_eq!(candle.open, candle.close);
        assert_eq!(candle.volume, Decimal::ZERO);
        assert_eq!(candle.trade_count, 0);
        assert!(candle.is_valid());
    }

    #[test]
    fn test_candle_serialization() {
        let candle = Candle::new(
            Symbol::new("BTC"),
            Timeframe::M5,
            minute(10),
            Decimal::from(50_000),
            Decimal::from(1),
        );
        let json = serde_json::to_string(&candle).unwrap();
        let deserialized: Candle = serde_json::from_str(&json).unwrap();
        assert_eq!(candle, deserialized);
    }
}
