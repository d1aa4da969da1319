//! Data Feed Service
//!
//! Time-controllable market data feeds for strategy and backtesting
//! consumers:
//! - Historical replay of recorded or synthesized OHLCV datasets
//! - Live simulation driven by stochastic price/regime/MEV models
//! - A factory with a deterministic fallback chain and feed registry
//! - Synchronous multi-subscriber fan-out with disposer tokens
//!
//! # Architecture
//!
//! ```text
//!                DataFeedFactory
//!          (fallback chain + registry)
//!              │               │
//!      ┌───────▼─────┐  ┌──────▼───────┐
//!      │ Historical  │  │  Simulated   │
//!      │  DataFeed   │  │   DataFeed   │
//!      └──────┬──────┘  └──────┬───────┘
//!        files│synthetic       │PriceProcess + MevEventModel
//!             │                │
//!        ┌────▼────────────────▼────┐
//!        │  poll(now) tick loop     │  ← injectable Clock
//!        │  candle aggregation      │
//!        └────┬────────────────┬────┘
//!             │                │
//!      ┌──────▼──────┐  ┌──────▼──────┐
//!      │ Subscribers │  │ Pull access │
//!      │ (in order)  │  │ (books etc) │
//!      └─────────────┘  └─────────────┘
//! ```
//!
//! All scheduling is cooperative and single-threaded: feeds expose their
//! next due instant and a `poll` that performs the work, so tests replay
//! deterministically with a `ManualClock` while production pumps feeds
//! through the async `drive` loop.

pub mod candles;
pub mod clock;
mod depth;
pub mod factory;
pub mod feed;
pub mod historical;
pub mod simulated;
pub mod subscription;

pub use clock::{Clock, ManualClock, SystemClock};
pub use factory::{DataFeedFactory, FeedPreference, FeedRequest};
pub use feed::{drive, DataFeed, FeedState};
pub use historical::HistoricalDataFeed;
pub use simulated::SimulatedDataFeed;
pub use subscription::{SubscriptionChannel, SubscriptionId};

/// Service version constant
pub const SERVICE_VERSION: &str = "0.1.0";
