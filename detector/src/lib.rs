//! Arbitrage detection: periodic scans, opportunity lifecycle, fan-out
//!
//! The detector polls the consolidated market view once per period, runs the
//! spot, synthetic and funding scans, gates every candidate through the risk
//! manager, and fans approved opportunities out to subscribers. Opportunities
//! age out after their TTL.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Result;
use common::constants::{FUNDING_TTL_MS, TAKER_FEE_BPS};
use common::{
    ArbitrageConfig, ArbitrageOpportunity, InstrumentType, MarketDataKey, OpportunityLeg, Side,
    StrategyKind, Ts,
};
use feeds::Consolidator;
use metrics::MetricsCollector;
use parking_lot::{Mutex, RwLock};
use pricer::{FuturesPricer, PerpetualPricer, PricerConfig, SyntheticPricer};
use risk::{RiskCheckResult, RiskManager};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Subscriber invoked synchronously after each approved opportunity
pub type OpportunityCallback = Box<dyn Fn(&ArbitrageOpportunity) -> Result<()> + Send + Sync>;

/// Detector counters and a view over the live opportunity set
#[derive(Debug, Clone, Default)]
pub struct DetectorStats {
    /// Candidates constructed by the scans
    pub opportunities_detected: u64,
    /// Opportunities dropped by TTL eviction
    pub opportunities_expired: u64,
    /// Opportunities currently live
    pub current_opportunities: usize,
    /// Mean profit of the live set, in bps
    pub avg_profit_bps: f64,
    /// Sum of expected profit over the live set
    pub total_profit_potential: f64,
}

/// Periodic cross-venue arbitrage scanner
pub struct ArbitrageDetector {
    consolidator: Arc<Consolidator>,
    risk: Arc<RiskManager>,
    metrics: Arc<MetricsCollector>,
    config: ArbitrageConfig,
    synthetic: SyntheticPricer,
    perpetual: PerpetualPricer,
    futures: FuturesPricer,
    opportunities: Mutex<Vec<ArbitrageOpportunity>>,
    callbacks: RwLock<Vec<OpportunityCallback>>,
    detected: AtomicU64,
    expired: AtomicU64,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
}

impl ArbitrageDetector {
    /// Build a detector over the consolidated view
    pub fn new(
        consolidator: Arc<Consolidator>,
        risk: Arc<RiskManager>,
        metrics: Arc<MetricsCollector>,
        config: ArbitrageConfig,
    ) -> Self {
        let pricer_config = PricerConfig::default();
        Self {
            synthetic: SyntheticPricer::new(
                Arc::clone(&consolidator),
                pricer_config,
                config.fee_buffer_bps,
            ),
            perpetual: PerpetualPricer::new(Arc::clone(&consolidator), pricer_config),
            futures: FuturesPricer::new(Arc::clone(&consolidator), pricer_config),
            consolidator,
            risk,
            metrics,
            config,
            opportunities: Mutex::new(Vec::new()),
            callbacks: RwLock::new(Vec::new()),
            detected: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            running: AtomicBool::new(false),
            worker: Mutex::new(None),
            shutdown: Mutex::new(None),
        }
    }

    /// Futures pricer for calendar-spread queries
    pub fn futures_pricer(&self) -> &FuturesPricer {
        &self.futures
    }

    /// Register a subscriber; registrations are append-only
    pub fn register_opportunity_callback(&self, cb: OpportunityCallback) {
        self.callbacks.write().push(cb);
    }

    /// Start the detection worker; a no-op when already running
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let (tx, rx) = watch::channel(false);
        *self.shutdown.lock() = Some(tx);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.detection_loop(rx).await;
        });
        *self.worker.lock() = Some(handle);

        info!(
            period_ms = self.config.detection_period_ms,
            symbols = self.config.symbols.len(),
            "detector started"
        );
    }

    /// Stop the worker and join it; a no-op when already stopped
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown.lock().take() {
            let _ = tx.send(true);
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("detector stopped");
    }

    /// Whether the worker is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Scan loop: run a pass, then sleep out the remainder of the period
    ///
    /// An overrunning pass starts the next one immediately instead of
    /// accumulating lag.
    async fn detection_loop(&self, mut shutdown: watch::Receiver<bool>) {
        let period = Duration::from_millis(self.config.detection_period_ms);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            self.run_detection_pass();
            let elapsed = started.elapsed();

            if let Some(remaining) = period.checked_sub(elapsed) {
                tokio::select! {
                    _ = tokio::time::sleep(remaining) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    /// One full scan: spot, synthetic, funding, then TTL cleanup
    ///
    /// Public so tests and callers can drive detection without the worker.
    pub fn run_detection_pass(&self) {
        let started = Instant::now();

        self.detect_spot_arbitrage();
        self.detect_synthetic_arbitrage();
        self.detect_funding_arbitrage();
        self.cleanup_expired();

        self.metrics
            .record_detection_latency(started.elapsed().as_micros() as u64);
    }

    /// Cross-venue spot inversions over the configured symbols
    ///
    /// Symbols are independent: a skip on one never stops the rest.
    fn detect_spot_arbitrage(&self) {
        for symbol in &self.config.symbols {
            if let Some(opportunity) = self.spot_candidate(symbol) {
                self.submit_opportunity(opportunity);
            }
        }
    }

    /// Build the spot candidate for one symbol, absent when nothing qualifies
    fn spot_candidate(&self, symbol: &common::Symbol) -> Option<ArbitrageOpportunity> {
        let best = self.consolidator.best_prices(symbol, InstrumentType::Spot)?;

        // A single venue quoting both sides is just that venue's spread
        if best.best_bid_venue == best.best_ask_venue {
            return None;
        }

        // Require a real inversion before talking bps
        let spread = best.best_bid - best.best_ask;
        if spread <= 0.0 || best.best_ask <= 0.0 {
            return None;
        }

        // Crossed books on either venue disqualify the symbol
        let buy_key = MarketDataKey::new(symbol.clone(), best.best_ask_venue, InstrumentType::Spot);
        let sell_key =
            MarketDataKey::new(symbol.clone(), best.best_bid_venue, InstrumentType::Spot);
        let store = self.consolidator.store();
        for key in [&buy_key, &sell_key] {
            if store.snapshot(key).is_some() && !store.is_valid(key) {
                debug!(%key, "skipping symbol with invalid book");
                return None;
            }
        }

        let spread_bps = spread / best.best_ask * 10_000.0;
        let net_bps = spread_bps - 2.0 * TAKER_FEE_BPS;
        if net_bps <= self.config.min_profit_threshold_bps {
            return None;
        }

        let buy_data = self.consolidator.market_data(&buy_key)?;
        let sell_data = self.consolidator.market_data(&sell_key)?;

        let quantity = buy_data.ask_size.min(sell_data.bid_size);
        if quantity <= 0.0 {
            return None;
        }

        let buy_price = buy_data.ask_price;
        let sell_price = sell_data.bid_price;
        let legs = vec![
            OpportunityLeg {
                symbol: symbol.clone(),
                venue: best.best_ask_venue,
                side: Side::Buy,
                price: buy_price,
                quantity,
                instrument: InstrumentType::Spot,
                is_synthetic: false,
            },
            OpportunityLeg {
                symbol: symbol.clone(),
                venue: best.best_bid_venue,
                side: Side::Sell,
                price: sell_price,
                quantity,
                instrument: InstrumentType::Spot,
                is_synthetic: false,
            },
        ];

        let gross = (sell_price - buy_price) * quantity;
        let fees = (buy_price + sell_price) * quantity * TAKER_FEE_BPS / 10_000.0;
        let expected_profit = gross - fees;
        let required_capital = buy_price * quantity;

        let timestamp = Ts::now();
        let execution_risk = execution_risk(&legs);
        Some(ArbitrageOpportunity {
            id: ArbitrageOpportunity::make_id(StrategyKind::Spot, timestamp),
            strategy: StrategyKind::Spot,
            timestamp,
            expected_profit,
            profit_percentage: expected_profit / required_capital * 100.0,
            required_capital,
            execution_risk,
            funding_risk: 0.0,
            liquidity_score: 0.9,
            ttl_ms: self.config.opportunity_ttl_ms,
            is_executable: ArbitrageOpportunity::executable(
                expected_profit,
                required_capital,
                self.config.max_position_size,
            ),
            legs,
        })
    }

    /// Spot-vs-synthetic mispricings via the multi-leg pricer
    fn detect_synthetic_arbitrage(&self) {
        let candidates = self
            .synthetic
            .find_opportunities(&self.config.symbols, self.config.min_profit_threshold_bps);

        for arb in candidates {
            if arb.max_size <= 0.0 {
                continue;
            }

            let legs = vec![
                OpportunityLeg {
                    symbol: arb.symbol.clone(),
                    venue: arb.spot_venue,
                    side: Side::Buy,
                    price: arb.spot_price,
                    quantity: arb.max_size,
                    instrument: InstrumentType::Spot,
                    is_synthetic: false,
                },
                OpportunityLeg {
                    symbol: arb.symbol.clone(),
                    venue: arb.synthetic_venue,
                    side: Side::Sell,
                    price: arb.synthetic_price,
                    quantity: arb.max_size,
                    instrument: arb.synthetic_type,
                    is_synthetic: true,
                },
            ];

            let expected_profit =
                arb.expected_profit_bps / 10_000.0 * arb.spot_price * arb.max_size;
            let required_capital = arb.spot_price * arb.max_size;

            let timestamp = Ts::now();
            let execution_risk = execution_risk(&legs);
            let opportunity = ArbitrageOpportunity {
                id: ArbitrageOpportunity::make_id(StrategyKind::Synthetic, timestamp),
                strategy: StrategyKind::Synthetic,
                timestamp,
                expected_profit,
                profit_percentage: arb.expected_profit_bps / 100.0,
                required_capital,
                execution_risk,
                funding_risk: arb.funding_impact,
                liquidity_score: 0.8,
                ttl_ms: self.config.opportunity_ttl_ms,
                is_executable: ArbitrageOpportunity::executable(
                    expected_profit,
                    required_capital,
                    self.config.max_position_size,
                ),
                legs,
            };

            self.submit_opportunity(opportunity);
        }
    }

    /// Cross-venue funding dispersion via the perpetual pricer
    fn detect_funding_arbitrage(&self) {
        let candidates = self
            .perpetual
            .find_funding_arbitrage(&self.config.symbols, self.config.min_profit_threshold_bps);

        for arb in candidates {
            let leg_price = |venue| {
                self.consolidator
                    .market_data(&MarketDataKey::new(
                        arb.symbol.clone(),
                        venue,
                        InstrumentType::Perpetual,
                    ))
                    .and_then(|md| md.mid())
                    .unwrap_or(0.0)
            };

            let legs = vec![
                OpportunityLeg {
                    symbol: arb.symbol.clone(),
                    venue: arb.long_venue,
                    side: Side::Buy,
                    price: leg_price(arb.long_venue),
                    quantity: 1.0,
                    instrument: InstrumentType::Perpetual,
                    is_synthetic: false,
                },
                OpportunityLeg {
                    symbol: arb.symbol.clone(),
                    venue: arb.short_venue,
                    side: Side::Sell,
                    price: leg_price(arb.short_venue),
                    quantity: 1.0,
                    instrument: InstrumentType::Perpetual,
                    is_synthetic: false,
                },
            ];

            let expected_profit = arb.funding_spread * arb.required_capital;
            let timestamp = Ts::now();
            let execution_risk = execution_risk(&legs);
            let opportunity = ArbitrageOpportunity {
                id: ArbitrageOpportunity::make_id(StrategyKind::Funding, timestamp),
                strategy: StrategyKind::Funding,
                timestamp,
                expected_profit,
                profit_percentage: arb.annualized_return,
                required_capital: arb.required_capital,
                execution_risk,
                funding_risk: arb.funding_spread,
                liquidity_score: 0.8,
                // Funding is captured over the full 8h period
                ttl_ms: FUNDING_TTL_MS,
                is_executable: ArbitrageOpportunity::executable(
                    expected_profit,
                    arb.required_capital,
                    self.config.max_position_size,
                ),
                legs,
            };

            self.submit_opportunity(opportunity);
        }
    }

    /// Gate a candidate and, when approved, publish it
    ///
    /// Counts the candidate as detected either way; rejected candidates never
    /// reach the live set or subscribers.
    pub fn submit_opportunity(&self, opportunity: ArbitrageOpportunity) -> bool {
        self.detected.fetch_add(1, Ordering::Relaxed);
        self.metrics.increment_opportunities_detected();

        match self.risk.check_opportunity(&opportunity) {
            RiskCheckResult::Approved => {
                self.opportunities.lock().push(opportunity.clone());
                self.notify(&opportunity);
                true
            }
            RiskCheckResult::Rejected(_) => false,
        }
    }

    fn notify(&self, opportunity: &ArbitrageOpportunity) {
        for cb in self.callbacks.read().iter() {
            if let Err(e) = cb(opportunity) {
                warn!(id = %opportunity.id, error = %e, "opportunity subscriber failed");
            }
        }
    }

    /// Evict opportunities older than their TTL
    pub fn cleanup_expired(&self) {
        let now = Ts::now();
        let mut opportunities = self.opportunities.lock();
        let before = opportunities.len();
        opportunities.retain(|opp| !opp.is_expired(now));
        let evicted = before - opportunities.len();
        if evicted > 0 {
            self.expired.fetch_add(evicted as u64, Ordering::Relaxed);
            debug!(evicted, "expired opportunities evicted");
        }
    }

    /// Copy of the live opportunity set
    pub fn current_opportunities(&self) -> Vec<ArbitrageOpportunity> {
        self.opportunities.lock().clone()
    }

    /// Counters plus aggregates over the live set
    pub fn stats(&self) -> DetectorStats {
        let opportunities = self.opportunities.lock();
        let current = opportunities.len();
        let (profit_bps_sum, total_profit) = opportunities.iter().fold((0.0, 0.0), |(b, p), o| {
            (b + o.profit_percentage * 100.0, p + o.expected_profit)
        });
        drop(opportunities);

        DetectorStats {
            opportunities_detected: self.detected.load(Ordering::Relaxed),
            opportunities_expired: self.expired.load(Ordering::Relaxed),
            current_opportunities: current,
            avg_profit_bps: if current > 0 {
                profit_bps_sum / current as f64
            } else {
                0.0
            },
            total_profit_potential: total_profit,
        }
    }
}

/// Execution-risk heuristic over a leg set
///
/// +0.3 when legs span venues, +0.2 per synthetic leg, clamped to [0, 1].
pub fn execution_risk(legs: &[OpportunityLeg]) -> f64 {
    let mut risk = 0.0;

    if let Some(first) = legs.first() {
        if legs.iter().any(|leg| leg.venue != first.venue) {
            risk += 0.3;
        }
    }
    risk += 0.2 * legs.iter().filter(|leg| leg.is_synthetic).count() as f64;

    risk.clamp(0.0, 1.0)
}
