//! Adversarial market event types
//!
//! Anomalies are synthetic MEV-style events with a bounded lifetime: they
//! are created by the MEV event model, read through `get_active_anomalies`
//! until `now - timestamp >= duration`, then evicted lazily.

use serde::{Deserialize, Serialize};

use crate::symbol::Symbol;

/// Kind of adversarial event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Front-run + back-run around a victim trade.
    MevSandwich,
    /// Stand-alone front-run of an anticipated order.
    MevFrontRun,
    /// Flash-loan funded price dislocation.
    FlashLoan,
    /// Cross-venue arbitrage burst.
    Arbitrage,
}

impl AnomalyKind {
    /// Wire label for this kind.
    pub fn label(&self) -> &'static str {
        match self {
            AnomalyKind::MevSandwich => "mev_sandwich",
            AnomalyKind::MevFrontRun => "mev_front_run",
            AnomalyKind::FlashLoan => "flash_loan",
            AnomalyKind::Arbitrage => "arbitrage",
        }
    }

    /// All kinds in fixed order, for random selection by index.
    pub fn all() -> &'static [AnomalyKind] {
        &[
            AnomalyKind::MevSandwich,
            AnomalyKind::MevFrontRun,
            AnomalyKind::FlashLoan,
            AnomalyKind::Arbitrage,
        ]
    }
}

/// Severity class of an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Extreme,
}

impl Severity {
    /// Map a uniform draw in [0, 1) onto the fixed severity bands:
    /// 40% low, 35% medium, 18% high, 7% extreme.
    pub fn from_uniform(u: f64) -> Self {
        if u < 0.40 {
            Severity::Low
        } else if u < 0.75 {
            Severity::Medium
        } else if u < 0.93 {
            Severity::High
        } else {
            Severity::Extreme
        }
    }
}

/// Closed-form parameter payload, one variant per anomaly kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "attack", rename_all = "snake_case")]
pub enum AnomalyParams {
    Sandwich {
        /// Size of the victim trade in base units.
        target_amount: f64,
        /// Attacker front-run size: target_amount x U(0.5, 1.0).
        front_run_amount: f64,
        /// Fractional slippage inflicted on the victim.
        slippage_impact: f64,
        /// Fractional price move caused by the front leg.
        price_impact: f64,
        /// trade_size_usd x slippage_impact x 0.5.
        estimated_profit_usd: f64,
    },
    FrontRun {
        /// Size of the anticipated order in base units.
        anticipated_amount: f64,
        /// Attacker size: anticipated_amount x U(1.2, 2.0).
        front_run_amount: f64,
        /// Fractional price move caused by the attacker.
        price_impact: f64,
        /// trade_size_usd x price_impact x 0.3.
        estimated_profit_usd: f64,
    },
    FlashLoan {
        /// Borrowed notional in USD.
        loan_amount_usd: f64,
        /// Fractional price discrepancy exploited.
        price_discrepancy: f64,
        /// max(0, loan x discrepancy - loan x 0.0009).
        estimated_profit_usd: f64,
    },
    Arbitrage {
        /// Position size in USD.
        base_size_usd: f64,
        /// Fractional spread between venues.
        spread: f64,
        /// max(0, size x spread - size x 0.003).
        estimated_profit_usd: f64,
    },
}

impl AnomalyParams {
    /// Fractional price impact contributed by this anomaly.
    pub fn price_impact(&self) -> f64 {
        match self {
            AnomalyParams::Sandwich { price_impact, .. } => *price_impact,
            AnomalyParams::FrontRun { price_impact, .. } => *price_impact,
            AnomalyParams::FlashLoan {
                price_discrepancy, ..
            } => *price_discrepancy,
            AnomalyParams::Arbitrage { .. } => 0.0,
        }
    }

    /// Fractional slippage contributed by this anomaly.
    pub fn slippage(&self) -> f64 {
        match self {
            AnomalyParams::Sandwich {
                slippage_impact, ..
            } => *slippage_impact,
            AnomalyParams::FrontRun { price_impact, .. } => *price_impact * 0.5,
            AnomalyParams::FlashLoan { .. } => 0.0,
            AnomalyParams::Arbitrage { spread, .. } => *spread,
        }
    }

    /// Estimated attacker profit in USD.
    pub fn estimated_profit_usd(&self) -> f64 {
        match self {
            AnomalyParams::Sandwich {
                estimated_profit_usd,
                ..
            }
            | AnomalyParams::FrontRun {
                estimated_profit_usd,
                ..
            }
            | AnomalyParams::FlashLoan {
                estimated_profit_usd,
                ..
            }
            | AnomalyParams::Arbitrage {
                estimated_profit_usd,
                ..
            } => *estimated_profit_usd,
        }
    }
}

/// A synthetic adversarial event with a bounded lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// Creation time, Unix milliseconds.
    pub timestamp_ms: i64,
    /// Lifetime after which the anomaly is evicted.
    pub duration_ms: i64,
    /// Symbols affected by this event.
    pub affected_symbols: Vec<Symbol>,
    /// Closed-form estimates for this event.
    pub params: AnomalyParams,
    /// Human-readable summary.
    pub description: String,
}

impl MarketAnomaly {
    /// An anomaly expires once `now - timestamp >= duration`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.timestamp_ms >= self.duration_ms
    }

    /// Whether the given symbol is affected by this anomaly.
    pub fn affects(&self, symbol: &Symbol) -> bool {
        self.affected_symbols.iter().any(|s| s == symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_anomaly() -> MarketAnomaly {
        MarketAnomaly {
            kind: AnomalyKind::MevSandwich,
            severity: Severity::Medium,
            timestamp_ms: 1_700_000_000_000,
            duration_ms: 60_000,
            affected_symbols: vec![Symbol::new("BTC")],
            params: AnomalyParams::Sandwich {
                target_amount: 5.0,
                front_run_amount: 3.5,
                slippage_impact: 0.01,
                price_impact: 0.005,
                estimated_profit_usd: 1_125.0,
            },
            description: "sandwich attack on BTC".to_string(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let anomaly = sample_anomaly();
        let created = anomaly.timestamp_ms;
        assert!(!anomaly.is_expired(created));
        assert!(!anomaly.is_expired(created + 59_999));
        // Expiry is inclusive at exactly `duration` elapsed.
        assert!(anomaly.is_expired(created + 60_000));
        assert!(anomaly.is_expired(created + 120_000));
    }

    #[test]
    fn test_affects_symbol() {
        let anomaly = sample_anomaly();
        assert!(anomaly.affects(&Symbol::new("BTC")));
        assert!(!anomaly.affects(&Symbol::new("ETH")));
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_uniform(0.0), Severity::Low);
        assert_eq!(Severity::from_uniform(0.39), Severity::Low);
        assert_eq!(Severity::from_uniform(0.40), Severity::Medium);
        assert_eq!(Severity::from_uniform(0.74), Severity::Medium);
        assert_eq!(Severity::from_uniform(0.75), Severity::High);
        assert_eq!(Severity::from_uniform(0.92), Severity::High);
        assert_eq!(Severity::from_uniform(0.93), Severity::Extreme);
        assert_eq!(Severity::from_uniform(0.999), Severity::Extreme);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(AnomalyKind::MevSandwich.label(), "mev_sandwich");
        assert_eq!(AnomalyKind::all().len(), 4);
    }

    #[test]
    fn test_params_accessors() {
        let anomaly = sample_anomaly();
        assert!((anomaly.params.price_impact() - 0.005).abs() < 1e-12);
        assert!((anomaly.params.slippage() - 0.01).abs() < 1e-12);
        assert!((anomaly.params.estimated_profit_usd() - 1_125.0).abs() < 1e-9);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let anomaly = sample_anomaly();
        let json = serde_json::to_string(&anomaly).unwrap();
        assert!(json.contains("mev_sandwich"));
        let deserialized: MarketAnomaly = serde_json::from_str(&json).unwrap();
        assert_eq!(anomaly, deserialized);
    }
}
