//! Stochastic model library
//!
//! Deterministic, seeded building blocks for market data synthesis:
//!
//! - `rng` — the single randomness source every model draws from
//! - `regime` — discrete market-condition state with time-boxed transitions
//! - `price` — composed price/volume/spread process (GBM, trend,
//!   mean-reversion, microstructure noise)
//! - `mev` — adversarial event generator (sandwich, front-run, flash-loan,
//!   arbitrage) with bounded-lifetime anomalies
//!
//! Every stochastic computation draws exclusively from a `RandomnessSource`,
//! so a given (seed, call sequence) always reproduces the same outputs.

pub mod mev;
pub mod price;
pub mod regime;
pub mod rng;

pub use mev::{MevConfig, MevEventModel, MevImpact, TradeContext};
pub use price::{PriceProcess, SimulationParameters};
pub use regime::{MarketRegimeModel, RegimeProfile};
pub use rng::RandomnessSource;

/// Crate version constant
pub const VERSION: &str = "1.0.0";
