//! Error taxonomy for the simulation framework
//!
//! Comprehensive error taxonomy using thiserror. Data-source problems are
//! recovered internally by the historical loader (synthetic fallback) and
//! never surface through the feed API; everything else is explicit.

use thiserror::Error;

/// Top-level feed error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Seek error: {0}")]
    Seek(#[from] SeekError),

    #[error("Feed is not initialized")]
    NotInitialized,

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Replay loop failure, feed stopped: {reason}")]
    LoopFailure { reason: String },

    #[error("No feed could be created: {reason}")]
    FactoryExhausted { reason: String },
}

/// Configuration-specific errors, rejected from `initialize`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("no symbols configured")]
    NoSymbols,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("replay speed must be finite and positive, got {0}")]
    InvalidReplaySpeed(f64),

    #[error("anomaly frequency must be finite and non-negative, got {0}")]
    InvalidAnomalyFrequency(f64),

    #[error("{field} must be finite and positive, got {value}")]
    InvalidMultiplier { field: &'static str, value: f64 },
}

/// Time-seek errors. The feed state is unchanged when these are returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeekError {
    #[error("seek target {requested} outside loaded range [{start}, {end}]")]
    OutOfRange {
        requested: i64,
        start: i64,
        end: i64,
    },

    #[error("backward seek to {requested} rejected, feed time is {current}")]
    Backward { requested: i64, current: i64 },
}

/// Historical data source errors. Recovered locally by synthetic-data
/// generation and logged at warn level; never returned through the feed API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("no data file found for symbol {symbol}")]
    NotFound { symbol: String },

    #[error("failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("dataset for symbol {symbol} is empty")]
    Empty { symbol: String },
}
