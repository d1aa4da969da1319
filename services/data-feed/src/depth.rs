//! Order book depth synthesis
//!
//! Feeds have no real resting orders; snapshots are synthesized on demand
//! from the current price and spread. Level construction is a pure function
//! of its inputs (no RNG draws), so reading the book never perturbs the
//! feed's randomness stream.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use types::book::{BookLevel, OrderBookSnapshot};
use types::symbol::Symbol;

/// Levels synthesized per side.
const BOOK_DEPTH: usize = 10;
/// Base quantity at the top level before liquidity scaling.
const DEPTH_BASE_QTY: f64 = 10.0;
/// Geometric decay of quantity away from the touch.
const LEVEL_DECAY: f64 = 0.85;

/// Convert an f64 price to `Decimal` at wire precision.
pub(crate) fn price_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(12)
}

/// Convert an f64 quantity to `Decimal` at wire precision.
pub(crate) fn quantity_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default().round_dp(8)
}

/// Synthesize a snapshot around `mid_price` with the given absolute spread.
///
/// Bids come out strictly decreasing and asks strictly increasing; the
/// quantity wobble is derived from the sequence number so repeated calls at
/// the same sequence reproduce the same book. Returns `None` for
/// non-positive prices or spreads.
pub(crate) fn synthesize_order_book(
    symbol: &Symbol,
    timestamp_ms: i64,
    sequence: u64,
    mid_price: f64,
    spread: f64,
    liquidity_multiplier: f64,
) -> Option<OrderBookSnapshot> {
    if !(mid_price > 0.0) || !(spread > 0.0) {
        return None;
    }

    let half_spread = spread / 2.0;
    let best_bid = mid_price - half_spread;
    if best_bid <= 0.0 {
        return None;
    }
    let best_ask = mid_price + half_spread;
    let level_step = (spread * 0.5).max(mid_price * 1e-6);

    let mut bids = Vec::with_capacity(BOOK_DEPTH);
    let mut asks = Vec::with_capacity(BOOK_DEPTH);

    for i in 0..BOOK_DEPTH {
        let offset = level_step * i as f64;
        let wobble = 1.0 + ((sequence + i as u64) % 7) as f64 * 0.03;
        let quantity = DEPTH_BASE_QTY * liquidity_multiplier * LEVEL_DECAY.powi(i as i32) * wobble;
        let order_count = 1 + ((sequence + i as u64) % 5) as u32;

        let bid_price = best_bid - offset;
        if bid_price > 0.0 {
            bids.push(BookLevel {
                price: price_decimal(bid_price),
                quantity: quantity_decimal(quantity),
                order_count,
            });
        }
        asks.push(BookLevel {
            price: price_decimal(best_ask + offset),
            quantity: quantity_decimal(quantity),
            order_count,
        });
    }

    let best_bid_dec = bids.first()?.price;
    let best_ask_dec = asks.first()?.price;

    Some(OrderBookSnapshot {
        symbol: symbol.clone(),
        timestamp_ms,
        sequence,
        spread: best_ask_dec - best_bid_dec,
        mid_price: (best_ask_dec + best_bid_dec) / Decimal::from(2),
        bids,
        asks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_book_is_valid() {
        let book =
            synthesize_order_book(&Symbol::new("BTC"), 1_000, 1, 45_000.0, 22.5, 1.0).unwrap();

        assert!(book.is_valid());
        assert_eq!(book.bids.len(), BOOK_DEPTH);
        assert_eq!(book.asks.len(), BOOK_DEPTH);
        assert!(book.best_ask().unwrap() > book.best_bid().unwrap());
        assert!(book.spread > Decimal::ZERO);
    }

    #[test]
    fn test_book_is_reproducible_at_same_sequence() {
        let a = synthesize_order_book(&Symbol::new("ETH"), 5_000, 9, 2_500.0, 1.25, 2.0).unwrap();
        let b = synthesize_order_book(&Symbol::new("ETH"), 5_000, 9, 2_500.0, 1.25, 2.0).unwrap();
        assert_eq!(a.checksum(), b.checksum());

        let c = synthesize_order_book(&Symbol::new("ETH"), 5_000, 10, 2_500.0, 1.25, 2.0).unwrap();
        assert_ne!(a.checksum(), c.checksum());
    }

    #[test]
    fn test_liquidity_multiplier_deepens_book() {
        let thin = synthesize_order_book(&Symbol::new("BTC"), 0, 1, 45_000.0, 20.0, 0.5).unwrap();
        let deep = synthesize_order_book(&Symbol::new("BTC"), 0, 1, 45_000.0, 20.0, 4.0).unwrap();

        let thin_total: Decimal = thin.bids.iter().map(|l| l.quantity).sum();
        let deep_total: Decimal = deep.bids.iter().map(|l| l.quantity).sum();
        assert!(deep_total > thin_total * Decimal::from(4));
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        let symbol = Symbol::new("X");
        assert!(synthesize_order_book(&symbol, 0, 1, 0.0, 1.0, 1.0).is_none());
        assert!(synthesize_order_book(&symbol, 0, 1, -5.0, 1.0, 1.0).is_none());
        assert!(synthesize_order_book(&symbol, 0, 1, 100.0, 0.0, 1.0).is_none());
        // Spread wider than twice the mid would push bids negative.
        assert!(synthesize_order_book(&symbol, 0, 1, 1.0, 2.5, 1.0).is_none());
    }

    #[test]
    fn test_tiny_prices_keep_strict_ordering() {
        let book =
            synthesize_order_book(&Symbol::new("SHIB"), 0, 3, 0.00001, 0.000_000_2, 1.0).unwrap();
        assert!(book.is_valid());
    }
}
