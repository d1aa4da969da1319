//! Data feed factory
//!
//! Chooses and constructs a concrete feed per request with a deterministic
//! fallback chain, and tracks a registry of live feeds:
//!
//! 1. Historical — when explicitly requested, or on `Auto` with a
//!    historical root configured. Requires the root directory to exist.
//! 2. Hybrid — when explicitly requested, or on `Auto` with anomalies
//!    enabled: a historical feed reconfigured with elevated anomaly
//!    frequency and volatility.
//! 3. Simulated — the terminal fallback; this path never fails.
//!
//! The factory is an explicit value constructed with its clock and seed;
//! there are no global singletons.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use stochastic::RandomnessSource;
use types::config::FeedConfig;
use types::errors::FeedError;
use types::stats::FeedKind;

use crate::clock::Clock;
use crate::feed::DataFeed;
use crate::historical::HistoricalDataFeed;
use crate::simulated::SimulatedDataFeed;

/// Which feed implementation the caller prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPreference {
    Historical,
    Simulated,
    /// Historical data with elevated adversarial activity.
    Hybrid,
    /// Let the factory decide from the request shape.
    Auto,
}

/// A feed construction request.
#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub config: FeedConfig,
    pub preferred: FeedPreference,
    /// Whether the chain may terminate in a simulated feed.
    pub fallback_to_simulated: bool,
    /// Root directory for historical data lookups, when available.
    pub historical_root: Option<PathBuf>,
}

impl FeedRequest {
    /// An `Auto` request with simulated fallback enabled.
    pub fn auto(config: FeedConfig) -> Self {
        Self {
            config,
            preferred: FeedPreference::Auto,
            fallback_to_simulated: true,
            historical_root: None,
        }
    }

    pub fn with_preference(self, preferred: FeedPreference) -> Self {
        Self { preferred, ..self }
    }

    pub fn with_historical_root(self, root: impl Into<PathBuf>) -> Self {
        Self {
            historical_root: Some(root.into()),
            ..self
        }
    }

    pub fn without_fallback(self) -> Self {
        Self {
            fallback_to_simulated: false,
            ..self
        }
    }
}

/// Anomaly frequency floor applied to hybrid feeds, events per hour.
const HYBRID_MIN_ANOMALY_FREQUENCY: f64 = 10.0;
/// Anomaly frequency multiplier applied to hybrid feeds.
const HYBRID_ANOMALY_MULTIPLIER: f64 = 3.0;
/// Volatility multiplier applied to hybrid feeds.
const HYBRID_VOLATILITY_MULTIPLIER: f64 = 1.5;

/// Constructs feeds and tracks every live instance it has created.
pub struct DataFeedFactory {
    clock: Arc<dyn Clock>,
    rng: RandomnessSource,
    registry: BTreeMap<String, Box<dyn DataFeed>>,
}

impl DataFeedFactory {
    /// Create a factory with an explicit clock and id-generation seed.
    pub fn new(clock: Arc<dyn Clock>, seed: u64) -> Self {
        Self {
            clock,
            rng: RandomnessSource::new(seed),
            registry: BTreeMap::new(),
        }
    }

    /// Construct a feed per the request's preference and fallback chain,
    /// register it, and return its id.
    ///
    /// With `fallback_to_simulated` set (the default for `auto`), this
    /// never fails for a valid config: the simulated terminal stage always
    /// succeeds.
    pub fn create_auto_feed(&mut self, request: &FeedRequest) -> Result<String, FeedError> {
        let try_historical = request.preferred == FeedPreference::Historical
            || (request.preferred == FeedPreference::Auto && request.historical_root.is_some());
        if try_historical {
            match self.create_historical(request, request.config.clone()) {
                Ok(id) => return Ok(id),
                Err(err) => {
                    warn!(error = %err, "historical feed creation failed, falling through");
                }
            }
        }

        let try_hybrid = request.preferred == FeedPreference::Hybrid
            || (request.preferred == FeedPreference::Auto && request.config.enable_anomalies);
        if try_hybrid {
            match self.create_hybrid(request) {
                Ok(id) => return Ok(id),
                Err(err) => {
                    warn!(error = %err, "hybrid feed creation failed, falling back to simulated");
                }
            }
        }

        let simulated_allowed = request.fallback_to_simulated
            || matches!(
                request.preferred,
                FeedPreference::Simulated | FeedPreference::Auto
            );
        if simulated_allowed {
            return self.create_simulated(request.config.clone());
        }

        Err(FeedError::FactoryExhausted {
            reason: format!(
                "preference {:?} unavailable and simulated fallback disabled",
                request.preferred
            ),
        })
    }

    /// Construct a historical feed (no fallback).
    fn create_historical(
        &mut self,
        request: &FeedRequest,
        config: FeedConfig,
    ) -> Result<String, FeedError> {
        let root = request
            .historical_root
            .as_ref()
            .ok_or_else(|| FeedError::FactoryExhausted {
                reason: "no historical data root configured".to_string(),
            })?;
        if !root.is_dir() {
            return Err(FeedError::FactoryExhausted {
                reason: format!("historical data root {} does not exist", root.display()),
            });
        }

        let mut feed = HistoricalDataFeed::new(self.clock.clone(), root);
        feed.initialize(config)?;
        Ok(self.register(FeedKind::Historical, Box::new(feed)))
    }

    /// Hybrid: a historical feed reconfigured with elevated anomaly
    /// frequency and volatility.
    fn create_hybrid(&mut self, request: &FeedRequest) -> Result<String, FeedError> {
        let base = &request.config;
        let config = base
            .clone()
            .with_anomalies(
                true,
                (base.anomaly_frequency * HYBRID_ANOMALY_MULTIPLIER)
                    .max(HYBRID_MIN_ANOMALY_FREQUENCY),
            )
            .with_volatility_multiplier(base.volatility_multiplier * HYBRID_VOLATILITY_MULTIPLIER);
        self.create_historical(request, config)
    }

    /// Construct the terminal simulated feed. Never fails for a valid
    /// config.
    fn create_simulated(&mut self, config: FeedConfig) -> Result<String, FeedError> {
        let mut feed = SimulatedDataFeed::new(self.clock.clone());
        feed.initialize(config)?;
        Ok(self.register(FeedKind::Simulated, Box::new(feed)))
    }

    /// Register a feed under a generated `{kind}_{timestamp}_{random}` id.
    fn register(&mut self, kind: FeedKind, feed: Box<dyn DataFeed>) -> String {
        let id = format!(
            "{}_{}_{}",
            kind.label(),
            self.clock.now_ms(),
            (self.rng.next_f64() * 1_000_000.0) as u32
        );
        info!(feed_id = %id, "feed registered");
        self.registry.insert(id.clone(), feed);
        id
    }

    /// Access a registered feed.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut (dyn DataFeed + 'static)> {
        self.registry.get_mut(id).map(|feed| feed.as_mut())
    }

    /// Ids of every live feed, in sorted order.
    pub fn active_feeds(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// Number of live feeds.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Stop, clean and drop one feed. Returns false for unknown ids.
    pub fn shutdown(&mut self, id: &str) -> bool {
        match self.registry.remove(id) {
            Some(mut feed) => {
                feed.stop();
                feed.cleanup();
                info!(feed_id = %id, "feed shut down");
                true
            }
            None => false,
        }
    }

    /// Stop and clean every registered feed, then clear the registry.
    ///
    /// Each feed is attempted independently; one misbehaving feed never
    /// aborts the batch.
    pub fn cleanup(&mut self) {
        let feeds = std::mem::take(&mut self.registry);
        let total = feeds.len();
        for (id, mut feed) in feeds {
            feed.stop();
            feed.cleanup();
            info!(feed_id = %id, "feed cleaned up");
        }
        info!(count = total, "factory cleanup complete");
    }
}

impl std::fmt::Debug for DataFeedFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFeedFactory")
            .field("active_feeds", &self.registry.len())
            .finish()
    }
}
