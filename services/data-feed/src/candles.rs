//! Candle aggregation
//!
//! Builds epoch-aligned OHLCV candles from emitted ticks for a single
//! symbol and timeframe, retaining a bounded closed-candle history.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use types::candle::{Candle, Timeframe};
use types::symbol::Symbol;

/// Builds candles for a single timeframe on a single symbol.
#[derive(Debug)]
pub struct CandleBuilder {
    timeframe: Timeframe,
    symbol: Symbol,
    /// Currently building candle (not yet closed).
    current: Option<Candle>,
    /// Closed candles stored by open time (BTreeMap for deterministic order).
    closed: BTreeMap<i64, Candle>,
    /// Max closed candles to retain.
    max_history: usize,
}

impl CandleBuilder {
    pub fn new(timeframe: Timeframe, symbol: Symbol, max_history: usize) -> Self {
        Self {
            timeframe,
            symbol,
            current: None,
            closed: BTreeMap::new(),
            max_history,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Process a tick: update or create the open candle, closing the
    /// previous one if the tick crosses a period boundary.
    ///
    /// Returns the closed candle when a boundary was crossed.
    pub fn process_tick(
        &mut self,
        price: Decimal,
        volume: Decimal,
        timestamp_ms: i64,
    ) -> Option<Candle> {
        let boundary = self.timeframe.align_to_boundary(timestamp_ms);

        let mut closed_candle = None;
        if let Some(ref current) = self.current {
            if boundary > current.open_time_ms {
                closed_candle = self.close_current();
            }
        }

        match &mut self.current {
            Some(candle) => candle.update(price, volume),
            None => {
                self.current = Some(Candle::new(
                    self.symbol.clone(),
                    self.timeframe,
                    boundary,
                    price,
                    volume,
                ));
            }
        }

        closed_candle
    }

    /// Close the open candle if its period has fully elapsed at `now`.
    ///
    /// Drives candle closure through quiet periods with no ticks.
    pub fn flush(&mut self, now_ms: i64) -> Option<Candle> {
        match &self.current {
            Some(candle) if now_ms > candle.close_time_ms => self.close_current(),
            _ => None,
        }
    }

    /// Force-close the open candle.
    pub fn close_current(&mut self) -> Option<Candle> {
        let candle = self.current.take()?;
        self.closed.insert(candle.open_time_ms, candle.clone());
        self.trim_history();
        Some(candle)
    }

    /// The most recent `limit` closed candles in chronological order.
    pub fn get_candles(&self, limit: usize) -> Vec<Candle> {
        let mut recent: Vec<Candle> = self.closed.values().rev().take(limit).cloned().collect();
        recent.reverse();
        recent
    }

    /// The open (unclosed) candle, if any.
    pub fn current_candle(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    /// Number of retained closed candles.
    pub fn closed_len(&self) -> usize {
        self.closed.len()
    }

    /// Discard all candle state.
    pub fn reset(&mut self) {
        self.current = None;
        self.closed.clear();
    }

    fn trim_history(&mut self) {
        while self.closed.len() > self.max_history {
            self.closed.pop_first();
        }
    }
}

/// Aggregate a pre-sorted OHLCV series into coarser candles.
///
/// Used by the historical feed to serve arbitrary timeframes from its
/// 1-minute source rows.
pub fn aggregate_series(rows: &[Candle], timeframe: Timeframe, limit: usize) -> Vec<Candle> {
    let mut aggregated: Vec<Candle> = Vec::new();

    for row in rows {
        let boundary = timeframe.align_to_boundary(row.open_time_ms);
        match aggregated.last_mut() {
            Some(current) if current.open_time_ms == boundary => {
                if row.high > current.high {
                    current.high = row.high;
                }
                if row.low < current.low {
                    current.low = row.low;
                }
                current.close = row.close;
                current.volume += row.volume;
                current.trade_count += row.trade_count;
            }
            _ => {
                let mut candle = Candle::new(
                    row.symbol.clone(),
                    timeframe,
                    boundary,
                    row.open,
                    Decimal::ZERO,
                );
                candle.high = row.high;
                candle.low = row.low;
                candle.close = row.close;
                candle.volume = row.volume;
                candle.trade_count = row.trade_count;
                aggregated.push(candle);
            }
        }
    }

    if aggregated.len() > limit {
        aggregated.drain(0..aggregated.len() - limit);
    }
    aggregated
}
