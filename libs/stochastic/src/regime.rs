//! Market regime model
//!
//! A fixed catalog of named market conditions, each scaling volatility,
//! trend and momentum for the price process. The active regime is resampled
//! once its fixed duration has elapsed; the duration itself is a literal
//! threshold, never redrawn.

use tracing::debug;

use crate::rng::RandomnessSource;

/// One named market-condition profile.
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeProfile {
    /// Regime name (e.g. "bull").
    pub name: &'static str,
    /// Volatility multiplier applied to the price process.
    pub volatility: f64,
    /// Directional drift bias in [-1, 1].
    pub trend: f64,
    /// Strength of trend-following behavior in [0, 1].
    pub momentum: f64,
    /// How long the regime persists before resampling.
    pub duration_ms: i64,
    /// Selection probability; the catalog sums to 1.
    pub probability: f64,
}

/// The built-in regime catalog. Probabilities sum to exactly 1.0.
pub fn default_catalog() -> Vec<RegimeProfile> {
    vec![
        RegimeProfile {
            name: "bull",
            volatility: 0.8,
            trend: 0.6,
            momentum: 0.7,
            duration_ms: 4 * 3_600_000,
            probability: 0.25,
        },
        RegimeProfile {
            name: "bear",
            volatility: 1.2,
            trend: -0.6,
            momentum: 0.6,
            duration_ms: 3 * 3_600_000,
            probability: 0.20,
        },
        RegimeProfile {
            name: "sideways",
            volatility: 0.6,
            trend: 0.0,
            momentum: 0.3,
            duration_ms: 6 * 3_600_000,
            probability: 0.30,
        },
        RegimeProfile {
            name: "high_volatility",
            volatility: 2.0,
            trend: 0.0,
            momentum: 0.9,
            duration_ms: 3_600_000,
            probability: 0.15,
        },
        RegimeProfile {
            name: "low_volatility",
            volatility: 0.4,
            trend: 0.1,
            momentum: 0.2,
            duration_ms: 8 * 3_600_000,
            probability: 0.10,
        },
    ]
}

/// Discrete market-condition state with time-boxed transitions.
#[derive(Debug, Clone)]
pub struct MarketRegimeModel {
    catalog: Vec<RegimeProfile>,
    current: usize,
    regime_start_ms: i64,
}

impl MarketRegimeModel {
    /// Create a model over the given catalog, sampling the initial regime.
    ///
    /// # Panics
    /// Panics if the catalog is empty or its probabilities do not sum to 1.
    pub fn new(catalog: Vec<RegimeProfile>, rng: &mut RandomnessSource, now_ms: i64) -> Self {
        assert!(!catalog.is_empty(), "regime catalog must not be empty");
        let total: f64 = catalog.iter().map(|r| r.probability).sum();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "regime probabilities must sum to 1, got {total}"
        );

        let mut model = Self {
            catalog,
            current: 0,
            regime_start_ms: now_ms,
        };
        model.current = model.sample(rng);
        model
    }

    /// Model over the built-in catalog.
    pub fn with_default_catalog(rng: &mut RandomnessSource, now_ms: i64) -> Self {
        Self::new(default_catalog(), rng, now_ms)
    }

    /// The active regime, transitioning first if its duration has elapsed.
    ///
    /// Transition check happens on every access: once
    /// `now - regime_start > duration` the regime is resampled and the
    /// start time reset.
    pub fn current(&mut self, rng: &mut RandomnessSource, now_ms: i64) -> &RegimeProfile {
        let elapsed = now_ms - self.regime_start_ms;
        if elapsed > self.catalog[self.current].duration_ms {
            let next = self.sample(rng);
            debug!(
                previous = self.catalog[self.current].name,
                next = self.catalog[next].name,
                elapsed_ms = elapsed,
                "regime transition"
            );
            self.current = next;
            self.regime_start_ms = now_ms;
        }
        &self.catalog[self.current]
    }

    /// The active regime without a transition check.
    pub fn peek(&self) -> &RegimeProfile {
        &self.catalog[self.current]
    }

    /// When the active regime started, Unix milliseconds.
    pub fn regime_start_ms(&self) -> i64 {
        self.regime_start_ms
    }

    /// Draw one uniform value and walk the cumulative probabilities.
    fn sample(&self, rng: &mut RandomnessSource) -> usize {
        let u = rng.next_f64();
        let mut cumulative = 0.0;
        for (i, regime) in self.catalog.iter().enumerate() {
            cumulative += regime.probability;
            if u < cumulative {
                return i;
            }
        }
        // Cumulative rounding can leave u just above the final bound.
        self.catalog.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_probabilities_sum_to_one() {
        let total: f64 = default_catalog().iter().map(|r| r.probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "must sum to 1")]
    fn test_bad_catalog_rejected() {
        let mut catalog = default_catalog();
        catalog[0].probability = 0.9;
        let mut rng = RandomnessSource::new(1);
        MarketRegimeModel::new(catalog, &mut rng, 0);
    }

    #[test]
    fn test_regime_persists_within_duration() {
        let mut rng = RandomnessSource::new(42);
        let mut model = MarketRegimeModel::with_default_catalog(&mut rng, 0);
        let initial = model.peek().name;

        // Well inside any catalog duration.
        let name = model.current(&mut rng, 60_000).name;
        assert_eq!(name, initial);
    }

    #[test]
    fn test_regime_transitions_after_duration() {
        let mut rng = RandomnessSource::new(42);
        let mut model = MarketRegimeModel::with_default_catalog(&mut rng, 0);
        let duration = model.peek().duration_ms;

        // Exactly at the threshold no transition happens yet.
        model.current(&mut rng, duration);
        assert_eq!(model.regime_start_ms(), 0);

        // One past the threshold resamples and resets the start time.
        model.current(&mut rng, duration + 1);
        assert_eq!(model.regime_start_ms(), duration + 1);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut rng_a = RandomnessSource::new(9);
        let mut rng_b = RandomnessSource::new(9);
        let mut a = MarketRegimeModel::with_default_catalog(&mut rng_a, 0);
        let mut b = MarketRegimeModel::with_default_catalog(&mut rng_b, 0);

        for step in 0..200 {
            let now = step * 3_600_000;
            assert_eq!(
                a.current(&mut rng_a, now).name,
                b.current(&mut rng_b, now).name
            );
        }
    }

    #[test]
    fn test_all_regimes_reachable() {
        let mut rng = RandomnessSource::new(4);
        let mut model = MarketRegimeModel::with_default_catalog(&mut rng, 0);
        let mut seen = std::collections::BTreeSet::new();

        let mut now = 0;
        for _ in 0..500 {
            now += model.peek().duration_ms + 1;
            seen.insert(model.current(&mut rng, now).name);
        }
        assert_eq!(seen.len(), default_catalog().len());
    }
}
