//! Risk management: position book, opportunity gate, portfolio metrics
//!
//! Every detected opportunity passes through [`RiskManager::check_opportunity`]
//! before it is emitted. Rejections carry a reason and are logged at warn;
//! they are not errors.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod sizing;
pub mod var;

pub use sizing::kelly_fraction;
pub use var::VarCalculator;

use common::constants::{
    DEFAULT_POSITION_LIMIT, MAX_FUNDING_RATE_EXPOSURE, MAX_PORTFOLIO_EXPOSURE, MIN_LIQUIDITY_SCORE,
    PNL_HISTORY_CAP, RISK_FREE_RATE, VAR_CONFIDENCE_LEVEL, VAR_LOOKBACK,
};
use common::{ArbitrageOpportunity, InstrumentType, Position, Symbol, Venue};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Portfolio metrics are recomputed at most this often
const METRICS_CACHE_TTL: Duration = Duration::from_secs(5);

/// Outcome of the per-opportunity gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCheckResult {
    /// Opportunity may be emitted
    Approved,
    /// Opportunity rejected, with the limiting reason
    Rejected(String),
}

impl RiskCheckResult {
    /// Whether the gate approved
    pub fn is_approved(&self) -> bool {
        matches!(self, RiskCheckResult::Approved)
    }
}

/// Portfolio-level risk snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// Historical-simulation VaR at the configured confidence
    pub portfolio_var: f64,
    /// Worst peak-to-trough drawdown over the PnL history
    pub max_drawdown: f64,
    /// Annualized Sharpe ratio of the return window
    pub sharpe_ratio: f64,
    /// Perpetual exposure as a fraction of total exposure
    pub funding_rate_exposure: f64,
    /// Total notional exposure at current marks
    pub total_exposure: f64,
}

/// Risk limits and thresholds
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Maximum total portfolio exposure in USD
    pub max_portfolio_exposure: f64,
    /// Per-symbol position caps; `DEFAULT_POSITION_LIMIT` when absent
    pub position_limits: FxHashMap<Symbol, f64>,
    /// Per-venue notional caps
    pub venue_limits: FxHashMap<Venue, f64>,
    /// Reject opportunities above this execution risk
    pub max_execution_risk: f64,
    /// Reject opportunities above this funding exposure
    pub max_funding_exposure: f64,
    /// Reject opportunities below this liquidity score
    pub min_liquidity_score: f64,
    /// Annualized risk-free rate for the Sharpe ratio
    pub risk_free_rate: f64,
    /// Confidence level for VaR
    pub var_confidence: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        let mut position_limits = FxHashMap::default();
        position_limits.insert(Symbol::from("BTC-USDT"), 10.0);
        position_limits.insert(Symbol::from("ETH-USDT"), 100.0);
        position_limits.insert(Symbol::from("SOL-USDT"), 1_000.0);

        let mut venue_limits = FxHashMap::default();
        venue_limits.insert(Venue::Okx, 300_000.0);
        venue_limits.insert(Venue::Binance, 400_000.0);
        venue_limits.insert(Venue::Bybit, 300_000.0);

        Self {
            max_portfolio_exposure: MAX_PORTFOLIO_EXPOSURE,
            position_limits,
            venue_limits,
            max_execution_risk: 0.7,
            max_funding_exposure: MAX_FUNDING_RATE_EXPOSURE,
            min_liquidity_score: MIN_LIQUIDITY_SCORE,
            risk_free_rate: RISK_FREE_RATE,
            var_confidence: VAR_CONFIDENCE_LEVEL,
        }
    }
}

#[derive(Default)]
struct RiskState {
    positions: FxHashMap<(Symbol, Venue), Position>,
    returns_history: VecDeque<f64>,
    pnl_history: VecDeque<f64>,
}

impl RiskState {
    fn total_exposure(&self) -> f64 {
        self.positions.values().map(Position::exposure).sum()
    }

    fn symbol_quantity(&self, symbol: &Symbol) -> f64 {
        self.positions
            .iter()
            .filter(|((s, _), _)| s == symbol)
            .map(|(_, p)| p.quantity)
            .sum()
    }

    fn venue_exposure(&self, venue: Venue) -> f64 {
        self.positions
            .iter()
            .filter(|((_, v), _)| *v == venue)
            .map(|(_, p)| p.exposure())
            .sum()
    }
}

/// Position book plus the per-opportunity risk gate
pub struct RiskManager {
    config: RiskConfig,
    state: Mutex<RiskState>,
    metrics_cache: Mutex<Option<(Instant, RiskMetrics)>>,
}

impl RiskManager {
    /// Create a manager with the given limits
    pub fn new(config: RiskConfig) -> Self {
        Self {
            config,
            state: Mutex::new(RiskState::default()),
            metrics_cache: Mutex::new(None),
        }
    }

    /// Gate one opportunity; the first breached limit wins
    pub fn check_opportunity(&self, opportunity: &ArbitrageOpportunity) -> RiskCheckResult {
        if opportunity.execution_risk > self.config.max_execution_risk {
            return self.reject(
                opportunity,
                format!("high execution risk: {:.2}", opportunity.execution_risk),
            );
        }

        if opportunity.funding_risk > self.config.max_funding_exposure {
            return self.reject(
                opportunity,
                format!("high funding risk: {:.4}", opportunity.funding_risk),
            );
        }

        if opportunity.liquidity_score < self.config.min_liquidity_score {
            return self.reject(
                opportunity,
                format!("low liquidity: {:.2}", opportunity.liquidity_score),
            );
        }

        let state = self.state.lock();
        for leg in &opportunity.legs {
            let limit = self
                .config
                .position_limits
                .get(&leg.symbol)
                .copied()
                .unwrap_or(DEFAULT_POSITION_LIMIT);
            let current = state.symbol_quantity(&leg.symbol);
            if current + leg.quantity > limit {
                drop(state);
                return self.reject(
                    opportunity,
                    format!(
                        "position limit on {}: {:.4} + {:.4} > {:.4}",
                        leg.symbol, current, leg.quantity, limit
                    ),
                );
            }
        }

        let total = state.total_exposure();
        drop(state);
        if total + opportunity.required_capital > self.config.max_portfolio_exposure {
            return self.reject(
                opportunity,
                format!(
                    "portfolio exposure: {:.0} + {:.0} > {:.0}",
                    total, opportunity.required_capital, self.config.max_portfolio_exposure
                ),
            );
        }

        RiskCheckResult::Approved
    }

    fn reject(&self, opportunity: &ArbitrageOpportunity, reason: String) -> RiskCheckResult {
        warn!(id = %opportunity.id, %reason, "opportunity rejected");
        RiskCheckResult::Rejected(reason)
    }

    /// Whether `additional` notional on `venue` stays inside its cap
    pub fn check_venue_exposure(&self, venue: Venue, additional: f64) -> bool {
        let Some(&limit) = self.config.venue_limits.get(&venue) else {
            return true;
        };
        self.state.lock().venue_exposure(venue) + additional <= limit
    }

    /// Open (or overwrite) a position
    pub fn add_position(&self, position: Position) {
        info!(
            symbol = %position.symbol,
            venue = %position.venue,
            side = ?position.side,
            quantity = position.quantity,
            price = position.average_price,
            "position opened"
        );
        self.state
            .lock()
            .positions
            .insert((position.symbol.clone(), position.venue), position);
    }

    /// Replace the position on (symbol, venue)
    pub fn update_position(&self, symbol: &Symbol, venue: Venue, position: Position) {
        self.state
            .lock()
            .positions
            .insert((symbol.clone(), venue), position);
    }

    /// Mark an open position to a new price
    pub fn mark_position(&self, symbol: &Symbol, venue: Venue, price: f64) {
        if let Some(p) = self
            .state
            .lock()
            .positions
            .get_mut(&(symbol.clone(), venue))
        {
            p.current_price = price;
        }
    }

    /// Close a position, realizing its PnL into the return window
    pub fn close_position(&self, symbol: &Symbol, venue: Venue) -> Option<f64> {
        let mut state = self.state.lock();
        let position = state.positions.remove(&(symbol.clone(), venue))?;
        let pnl = position.unrealized_pnl();
        Self::record_pnl_locked(&mut state, pnl);
        drop(state);

        info!(%symbol, %venue, pnl, "position closed");
        Some(pnl)
    }

    /// Record a realized PnL sample directly
    pub fn record_pnl(&self, pnl: f64) {
        Self::record_pnl_locked(&mut self.state.lock(), pnl);
    }

    fn record_pnl_locked(state: &mut RiskState, pnl: f64) {
        state.pnl_history.push_back(pnl);
        while state.pnl_history.len() > PNL_HISTORY_CAP {
            state.pnl_history.pop_front();
        }

        let exposure = state.total_exposure();
        if exposure > 0.0 {
            state.returns_history.push_back(pnl / exposure);
            while state.returns_history.len() > VAR_LOOKBACK {
                state.returns_history.pop_front();
            }
        }
    }

    /// Current position on (symbol, venue)
    pub fn position(&self, symbol: &Symbol, venue: Venue) -> Option<Position> {
        self.state
            .lock()
            .positions
            .get(&(symbol.clone(), venue))
            .cloned()
    }

    /// Every open position
    pub fn positions(&self) -> Vec<Position> {
        self.state.lock().positions.values().cloned().collect()
    }

    /// Total notional exposure at current marks
    pub fn total_exposure(&self) -> f64 {
        self.state.lock().total_exposure()
    }

    /// Portfolio metrics, cached for five seconds
    pub fn metrics(&self) -> RiskMetrics {
        {
            let cache = self.metrics_cache.lock();
            if let Some((at, metrics)) = cache.as_ref() {
                if at.elapsed() < METRICS_CACHE_TTL {
                    return metrics.clone();
                }
            }
        }

        let metrics = self.compute_metrics();
        *self.metrics_cache.lock() = Some((Instant::now(), metrics.clone()));
        metrics
    }

    fn compute_metrics(&self) -> RiskMetrics {
        let state = self.state.lock();
        let total_exposure = state.total_exposure();

        let portfolio_var = {
            let returns: Vec<f64> = state.returns_history.iter().copied().collect();
            var::historical_var(&returns, self.config.var_confidence)
                .map(|v| v * total_exposure)
                .unwrap_or(0.0)
        };

        let max_drawdown = max_drawdown(state.pnl_history.iter().copied());
        let sharpe_ratio = sharpe(
            state.returns_history.iter().copied(),
            self.config.risk_free_rate,
        );

        let perp_exposure: f64 = state
            .positions
            .values()
            .filter(|p| p.instrument == InstrumentType::Perpetual)
            .map(Position::exposure)
            .sum();
        let funding_rate_exposure = if total_exposure > 0.0 {
            perp_exposure / total_exposure
        } else {
            0.0
        };

        RiskMetrics {
            portfolio_var,
            max_drawdown,
            sharpe_ratio,
            funding_rate_exposure,
            total_exposure,
        }
    }
}

/// Worst peak-to-trough drawdown of a cumulative PnL path
fn max_drawdown(pnls: impl Iterator<Item = f64>) -> f64 {
    let mut peak = 0.0f64;
    let mut worst = 0.0f64;
    let mut cumulative = 0.0f64;

    for pnl in pnls {
        cumulative += pnl;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            worst = worst.max((peak - cumulative) / peak);
        }
    }

    worst
}

/// Annualized Sharpe ratio over per-period returns (365 periods/year)
fn sharpe(returns: impl Iterator<Item = f64>, risk_free_rate: f64) -> f64 {
    let samples: Vec<f64> = returns.collect();
    if samples.len() < 2 {
        return 0.0;
    }

    let n = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / n;
    let variance = samples.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();
    if std_dev < common::constants::EPSILON {
        return 0.0;
    }

    let annual_return = mean * 365.0;
    let annual_std = std_dev * (365.0f64).sqrt();
    (annual_return - risk_free_rate) / annual_std
}
