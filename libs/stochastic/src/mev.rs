//! Adversarial (MEV) event model
//!
//! Generates sandwich, front-run, flash-loan and arbitrage anomalies with
//! closed-form profit/impact estimates and bounded lifetimes. Expired
//! anomalies are evicted lazily on access; there is no background timer.

use serde::{Deserialize, Serialize};
use tracing::debug;

use types::anomaly::{AnomalyKind, AnomalyParams, MarketAnomaly, Severity};
use types::symbol::Symbol;
use types::tick::Side;

use crate::rng::RandomnessSource;

/// Flash-loan fee fraction charged on the borrowed notional.
const FLASH_LOAN_FEE: f64 = 0.0009;
/// Round-trip trading fees eaten by an arbitrage cycle.
const ARBITRAGE_FEES: f64 = 0.003;
/// Victim profit share captured by a sandwich.
const SANDWICH_CAPTURE: f64 = 0.5;
/// Profit share captured by a stand-alone front-run.
const FRONT_RUN_CAPTURE: f64 = 0.3;

/// Tunable bounds of the event model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MevConfig {
    /// Shortest anomaly lifetime.
    pub min_duration_ms: i64,
    /// Longest anomaly lifetime.
    pub max_duration_ms: i64,
    /// Per-anomaly price impact cap used in impact aggregation.
    pub max_price_impact: f64,
    /// Per-anomaly slippage cap used in impact aggregation.
    pub max_slippage: f64,
    /// Gas-competition multiplier applied per active front-run.
    pub gas_compound: f64,
    /// Upper bound of the compounded gas multiplier.
    pub gas_multiplier_cap: f64,
}

impl Default for MevConfig {
    fn default() -> Self {
        Self {
            min_duration_ms: 30_000,
            max_duration_ms: 300_000,
            max_price_impact: 0.05,
            max_slippage: 0.10,
            gas_compound: 1.5,
            gas_multiplier_cap: 3.0,
        }
    }
}

/// The victim/anticipated trade an attack is built around.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeContext {
    /// Trade size in base units.
    pub amount: f64,
    /// Expected execution price in USD.
    pub expected_price: f64,
}

impl TradeContext {
    /// Notional value of the trade in USD.
    pub fn size_usd(&self) -> f64 {
        self.amount * self.expected_price
    }
}

/// Aggregated adversarial pressure on one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MevImpact {
    /// Signed fractional price impact (positive pushes against the side).
    pub price_impact: f64,
    /// Fractional extra slippage.
    pub slippage: f64,
    /// Gas-competition multiplier in [1, cap].
    pub gas_multiplier: f64,
    /// Number of live anomalies affecting the symbol.
    pub active_anomalies: usize,
}

/// Generates adversarial anomalies and tracks their bounded lifetimes.
#[derive(Debug, Clone)]
pub struct MevEventModel {
    config: MevConfig,
    active: Vec<MarketAnomaly>,
    last_attack_ms: Option<i64>,
}

impl MevEventModel {
    pub fn new(config: MevConfig) -> Self {
        Self {
            config,
            active: Vec::new(),
            last_attack_ms: None,
        }
    }

    pub fn config(&self) -> &MevConfig {
        &self.config
    }

    /// Simulate a sandwich attack around the given victim trade.
    ///
    /// The attacker front-runs with 50–100% of the victim size and captures
    /// half of the slippage it inflicts.
    pub fn simulate_sandwich_attack(
        &mut self,
        symbol: &Symbol,
        trade: TradeContext,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> MarketAnomaly {
        let front_run_amount = trade.amount * rng.next_range(0.5, 1.0);
        let slippage_impact = rng.next_range(0.005, 0.03);
        let price_impact = rng.next_range(0.002, 0.02);
        let estimated_profit_usd = trade.size_usd() * slippage_impact * SANDWICH_CAPTURE;

        let params = AnomalyParams::Sandwich {
            target_amount: trade.amount,
            front_run_amount,
            slippage_impact,
            price_impact,
            estimated_profit_usd,
        };
        let description = format!(
            "sandwich attack on {symbol}: front-run {front_run_amount:.4} around \
             {:.4} target, est. profit ${estimated_profit_usd:.2}",
            trade.amount
        );
        self.record(AnomalyKind::MevSandwich, symbol, params, description, rng, now_ms)
    }

    /// Simulate a front-run of an anticipated order.
    ///
    /// The attacker oversizes to 120–200% of the anticipated amount and
    /// captures 30% of the inflicted price impact.
    pub fn simulate_front_run(
        &mut self,
        symbol: &Symbol,
        trade: TradeContext,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> MarketAnomaly {
        let front_run_amount = trade.amount * rng.next_range(1.2, 2.0);
        let price_impact = rng.next_range(0.003, 0.025);
        let estimated_profit_usd = trade.size_usd() * price_impact * FRONT_RUN_CAPTURE;

        let params = AnomalyParams::FrontRun {
            anticipated_amount: trade.amount,
            front_run_amount,
            price_impact,
            estimated_profit_usd,
        };
        let description = format!(
            "front-run on {symbol}: {front_run_amount:.4} ahead of anticipated \
             {:.4}, est. profit ${estimated_profit_usd:.2}",
            trade.amount
        );
        self.record(AnomalyKind::MevFrontRun, symbol, params, description, rng, now_ms)
    }

    /// Simulate a flash-loan exploit of a price discrepancy.
    ///
    /// Profit is the discrepancy on the borrowed notional minus the 0.09%
    /// loan fee, floored at zero.
    pub fn simulate_flash_loan(
        &mut self,
        symbol: &Symbol,
        loan_amount_usd: f64,
        price_discrepancy: f64,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> MarketAnomaly {
        let estimated_profit_usd =
            (loan_amount_usd * price_discrepancy - loan_amount_usd * FLASH_LOAN_FEE).max(0.0);

        let params = AnomalyParams::FlashLoan {
            loan_amount_usd,
            price_discrepancy,
            estimated_profit_usd,
        };
        let description = format!(
            "flash loan on {symbol}: ${loan_amount_usd:.0} borrowed against \
             {:.2}% discrepancy, est. profit ${estimated_profit_usd:.2}",
            price_discrepancy * 100.0
        );
        self.record(AnomalyKind::FlashLoan, symbol, params, description, rng, now_ms)
    }

    /// Simulate a cross-venue arbitrage burst.
    ///
    /// Profit is the spread on the position minus 0.3% round-trip fees,
    /// floored at zero.
    pub fn simulate_arbitrage(
        &mut self,
        symbol: &Symbol,
        base_size_usd: f64,
        spread: f64,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> MarketAnomaly {
        let estimated_profit_usd = (base_size_usd * spread - base_size_usd * ARBITRAGE_FEES).max(0.0);

        let params = AnomalyParams::Arbitrage {
            base_size_usd,
            spread,
            estimated_profit_usd,
        };
        let description = format!(
            "arbitrage on {symbol}: ${base_size_usd:.0} across {:.2}% spread, \
             est. profit ${estimated_profit_usd:.2}",
            spread * 100.0
        );
        self.record(AnomalyKind::Arbitrage, symbol, params, description, rng, now_ms)
    }

    /// Roll for spontaneous MEV activity.
    ///
    /// The configured hourly frequency and the elapsed time since the last
    /// attack combine into a per-invocation probability; on success a random
    /// attack kind, symbol and synthetic trade are drawn and dispatched.
    /// `quotes` supplies (symbol, current price) pairs.
    pub fn inject_random_mev_activity(
        &mut self,
        quotes: &[(Symbol, f64)],
        frequency_per_hour: f64,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> Option<MarketAnomaly> {
        if quotes.is_empty() || frequency_per_hour <= 0.0 {
            return None;
        }

        let last = match self.last_attack_ms {
            Some(last) => last,
            None => {
                // First invocation anchors the elapsed-time baseline.
                self.last_attack_ms = Some(now_ms);
                return None;
            }
        };

        let elapsed_ms = (now_ms - last).max(0);
        let probability = (frequency_per_hour * elapsed_ms as f64 / 3_600_000.0).min(1.0);
        if !rng.chance(probability) {
            return None;
        }

        let (symbol, price) = &quotes[rng.next_index(quotes.len())];
        let kind = AnomalyKind::all()[rng.next_index(AnomalyKind::all().len())];
        let trade = TradeContext {
            amount: rng.next_range(0.5, 20.0),
            expected_price: *price,
        };

        self.last_attack_ms = Some(now_ms);
        let anomaly = match kind {
            AnomalyKind::MevSandwich => {
                self.simulate_sandwich_attack(symbol, trade, rng, now_ms)
            }
            AnomalyKind::MevFrontRun => self.simulate_front_run(symbol, trade, rng, now_ms),
            AnomalyKind::FlashLoan => {
                let loan = rng.next_range(100_000.0, 5_000_000.0);
                let discrepancy = rng.next_range(0.001, 0.01);
                self.simulate_flash_loan(symbol, loan, discrepancy, rng, now_ms)
            }
            AnomalyKind::Arbitrage => {
                let size = rng.next_range(10_000.0, 500_000.0);
                let spread = rng.next_range(0.002, 0.012);
                self.simulate_arbitrage(symbol, size, spread, rng, now_ms)
            }
        };
        Some(anomaly)
    }

    /// Live anomalies, evicting expired ones first (lazy eviction).
    pub fn get_active_anomalies(&mut self, now_ms: i64) -> Vec<MarketAnomaly> {
        self.evict_expired(now_ms);
        self.active.clone()
    }

    /// Number of live anomalies without cloning.
    pub fn active_count(&mut self, now_ms: i64) -> usize {
        self.evict_expired(now_ms);
        self.active.len()
    }

    /// Aggregate adversarial pressure on a symbol.
    ///
    /// Sums per-anomaly price impact (capped at 5%) and slippage (capped at
    /// 10%) over the live anomalies affecting the symbol. Each active
    /// front-run compounds the gas multiplier by 1.5x, capped at 3x. Sell
    /// pressure is reported as negative price impact.
    pub fn calculate_mev_impact(&mut self, symbol: &Symbol, side: Side, now_ms: i64) -> MevImpact {
        self.evict_expired(now_ms);

        let mut price_impact = 0.0;
        let mut slippage = 0.0;
        let mut gas_multiplier = 1.0;
        let mut affecting = 0;

        for anomaly in self.active.iter().filter(|a| a.affects(symbol)) {
            affecting += 1;
            price_impact += anomaly.params.price_impact().min(self.config.max_price_impact);
            slippage += anomaly.params.slippage().min(self.config.max_slippage);
            if anomaly.kind == AnomalyKind::MevFrontRun {
                gas_multiplier =
                    (gas_multiplier * self.config.gas_compound).min(self.config.gas_multiplier_cap);
            }
        }

        let signed_impact = match side {
            Side::Buy => price_impact,
            Side::Sell => -price_impact,
        };

        MevImpact {
            price_impact: signed_impact,
            slippage,
            gas_multiplier,
            active_anomalies: affecting,
        }
    }

    /// Record an externally built anomaly (manual injection path).
    pub fn inject(&mut self, anomaly: MarketAnomaly) {
        self.active.push(anomaly);
    }

    /// Drop all anomalies and the attack-time anchor.
    pub fn reset(&mut self) {
        self.active.clear();
        self.last_attack_ms = None;
    }

    fn evict_expired(&mut self, now_ms: i64) {
        let before = self.active.len();
        self.active.retain(|a| !a.is_expired(now_ms));
        let evicted = before - self.active.len();
        if evicted > 0 {
            debug!(evicted, remaining = self.active.len(), "evicted expired anomalies");
        }
    }

    /// Build, store and return an anomaly with drawn severity and duration.
    fn record(
        &mut self,
        kind: AnomalyKind,
        symbol: &Symbol,
        params: AnomalyParams,
        description: String,
        rng: &mut RandomnessSource,
        now_ms: i64,
    ) -> MarketAnomaly {
        let severity = Severity::from_uniform(rng.next_f64());
        let duration_ms = rng.next_range(
            self.config.min_duration_ms as f64,
            self.config.max_duration_ms as f64,
        ) as i64;

        let anomaly = MarketAnomaly {
            kind,
            severity,
            timestamp_ms: now_ms,
            duration_ms,
            affected_symbols: vec![symbol.clone()],
            params,
            description,
        };
        debug!(
            kind = kind.label(),
            symbol = %symbol,
            severity = ?severity,
            duration_ms,
            "anomaly generated"
        );
        self.active.push(anomaly.clone());
        anomaly
    }
}

impl Default for MevEventModel {
    fn default() -> Self {
        Self::new(MevConfig::default())
    }
}
