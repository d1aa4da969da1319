//! Feed configuration
//!
//! `FeedConfig` is an immutable value object: updates go through `with_*`
//! operations that return a new instance, and feeds replace their config
//! wholesale on `initialize`/`update_config`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::errors::ConfigError;
use crate::symbol::Symbol;

/// Lower bound for the replay speed multiplier.
pub const REPLAY_SPEED_MIN: f64 = 0.1;
/// Upper bound for the replay speed multiplier.
pub const REPLAY_SPEED_MAX: f64 = 1000.0;

/// Clamp a requested replay speed into the supported range.
///
/// Non-finite inputs clamp to 1.0.
pub fn clamp_replay_speed(speed: f64) -> f64 {
    if !speed.is_finite() {
        return 1.0;
    }
    speed.clamp(REPLAY_SPEED_MIN, REPLAY_SPEED_MAX)
}

/// Configuration consumed by a feed at `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Instruments this feed emits data for.
    pub symbols: Vec<Symbol>,
    /// Multiplier mapping wall-clock time to simulated time, [0.1, 1000].
    pub replay_speed: f64,
    /// Whether adversarial anomalies are generated during emission.
    pub enable_anomalies: bool,
    /// Expected anomaly rate in events per hour.
    pub anomaly_frequency: f64,
    /// Scales the volatility of every stochastic component.
    pub volatility_multiplier: f64,
    /// Scales synthesized book depth and tightens/widens spreads.
    pub liquidity_multiplier: f64,
    /// Seed for the feed's private randomness source.
    pub seed: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            replay_speed: 1.0,
            enable_anomalies: false,
            anomaly_frequency: 5.0,
            volatility_multiplier: 1.0,
            liquidity_multiplier: 1.0,
            seed: 42,
        }
    }
}

impl FeedConfig {
    /// Convenience constructor from symbol names.
    pub fn with_symbol_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: names.into_iter().map(|s| Symbol::new(s.into())).collect(),
            ..Self::default()
        }
    }

    /// Return a new config with the given symbols.
    pub fn with_symbols(self, symbols: Vec<Symbol>) -> Self {
        Self { symbols, ..self }
    }

    /// Return a new config with the replay speed clamped into range.
    pub fn with_replay_speed(self, speed: f64) -> Self {
        Self {
            replay_speed: clamp_replay_speed(speed),
            ..self
        }
    }

    /// Return a new config with anomaly generation settings.
    pub fn with_anomalies(self, enabled: bool, frequency_per_hour: f64) -> Self {
        Self {
            enable_anomalies: enabled,
            anomaly_frequency: frequency_per_hour,
            ..self
        }
    }

    /// Return a new config with the given volatility multiplier.
    pub fn with_volatility_multiplier(self, multiplier: f64) -> Self {
        Self {
            volatility_multiplier: multiplier,
            ..self
        }
    }

    /// Return a new config with the given liquidity multiplier.
    pub fn with_liquidity_multiplier(self, multiplier: f64) -> Self {
        Self {
            liquidity_multiplier: multiplier,
            ..self
        }
    }

    /// Return a new config with the given randomness seed.
    pub fn with_seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    /// Validate the configuration for use by a feed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }

        let mut seen = BTreeSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.as_str()) {
                return Err(ConfigError::DuplicateSymbol(symbol.to_string()));
            }
        }

        if !self.replay_speed.is_finite() || self.replay_speed <= 0.0 {
            return Err(ConfigError::InvalidReplaySpeed(self.replay_speed));
        }
        if !self.anomaly_frequency.is_finite() || self.anomaly_frequency < 0.0 {
            return Err(ConfigError::InvalidAnomalyFrequency(self.anomaly_frequency));
        }
        if !self.volatility_multiplier.is_finite() || self.volatility_multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier {
                field: "volatility_multiplier",
                value: self.volatility_multiplier,
            });
        }
        if !self.liquidity_multiplier.is_finite() || self.liquidity_multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier {
                field: "liquidity_multiplier",
                value: self.liquidity_multiplier,
            });
        }

        Ok(())
    }

    /// Replay speed clamped into the supported range.
    pub fn clamped_replay_speed(&self) -> f64 {
        clamp_replay_speed(self.replay_speed)
    }
}
