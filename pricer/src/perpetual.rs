//! Funding-implied pricing for perpetual swaps

use crate::PricerConfig;
use common::constants::{ANNUALIZATION_DAYS, FUNDING_PERIODS_PER_DAY};
use common::{InstrumentType, MarketDataKey, Symbol, Venue};
use feeds::Consolidator;
use std::sync::Arc;

/// A cross-venue funding-rate dispersion worth capturing
#[derive(Debug, Clone)]
pub struct FundingArbitrage {
    /// Underlying symbol
    pub symbol: Symbol,
    /// Venue to hold the long perp (lowest funding)
    pub long_venue: Venue,
    /// Venue to hold the short perp (highest funding)
    pub short_venue: Venue,
    /// Funding rate on the long venue
    pub long_funding_rate: f64,
    /// Funding rate on the short venue
    pub short_funding_rate: f64,
    /// Captured spread per 8h period
    pub funding_spread: f64,
    /// Spread annualized over 3 periods/day, 365 days
    pub annualized_return: f64,
    /// Capital for both legs (2x perp mid)
    pub required_capital: f64,
}

/// Perpetual fair-funding and synthetic-spot models
pub struct PerpetualPricer {
    consolidator: Arc<Consolidator>,
    #[allow(dead_code)]
    config: PricerConfig,
}

impl PerpetualPricer {
    /// Create a pricer over the consolidated ticker cache
    pub fn new(consolidator: Arc<Consolidator>, config: PricerConfig) -> Self {
        Self {
            consolidator,
            config,
        }
    }

    /// Funding rate for a perpetual, zero when unknown
    pub fn funding_rate(&self, symbol: &Symbol, venue: Venue) -> f64 {
        self.consolidator.funding_rate(symbol, venue).unwrap_or(0.0)
    }

    /// Fair 8h funding implied by the perp-spot basis on one venue
    ///
    /// `basis = (perp_mid - spot_mid) / spot_mid`, and with three funding
    /// periods a day the fair per-period rate is `3 * basis`.
    pub fn fair_funding_rate(&self, symbol: &Symbol, venue: Venue) -> Option<f64> {
        let spot_mid = self.mid(symbol, venue, InstrumentType::Spot)?;
        let perp_mid = self.mid(symbol, venue, InstrumentType::Perpetual)?;
        if spot_mid <= 0.0 {
            return None;
        }
        let basis = (perp_mid - spot_mid) / spot_mid;
        Some(basis * FUNDING_PERIODS_PER_DAY)
    }

    /// Synthetic spot from a perpetual, discounting expected funding
    ///
    /// `perp_mid * (1 - funding_rate * holding_hours / 8)`.
    pub fn synthetic_spot(
        &self,
        symbol: &Symbol,
        venue: Venue,
        holding_period_hours: f64,
    ) -> Option<f64> {
        let perp_mid = self.mid(symbol, venue, InstrumentType::Perpetual)?;
        let funding = self.funding_rate(symbol, venue);
        let periods = holding_period_hours / 8.0;
        Some(perp_mid * (1.0 - funding * periods))
    }

    /// Highest synthetic spot across venues
    pub fn best_synthetic_spot(&self, symbol: &Symbol) -> Option<f64> {
        Venue::ALL
            .iter()
            .filter_map(|&venue| self.synthetic_spot(symbol, venue, 8.0))
            .max_by(|a, b| a.total_cmp(b))
    }

    /// Long-cheap / short-rich funding scan across venues
    ///
    /// Venues with no cached funding participate at rate zero, so a single
    /// outlier venue is still caught.
    pub fn find_funding_arbitrage(
        &self,
        symbols: &[Symbol],
        min_spread_bps: f64,
    ) -> Vec<FundingArbitrage> {
        let mut opportunities = Vec::new();

        for symbol in symbols {
            let rates: Vec<(Venue, f64)> = Venue::ALL
                .iter()
                .map(|&venue| (venue, self.funding_rate(symbol, venue)))
                .collect();

            // ALL is non-empty, so min/max always exist
            let (long_venue, long_rate) = rates
                .iter()
                .copied()
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap();
            let (short_venue, short_rate) = rates
                .iter()
                .copied()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap();

            let funding_spread = short_rate - long_rate;
            if funding_spread * 10_000.0 <= min_spread_bps {
                continue;
            }

            let required_capital = self
                .mid(symbol, long_venue, InstrumentType::Perpetual)
                .map(|mid| mid * 2.0)
                .unwrap_or(0.0);

            opportunities.push(FundingArbitrage {
                symbol: symbol.clone(),
                long_venue,
                short_venue,
                long_funding_rate: long_rate,
                short_funding_rate: short_rate,
                funding_spread,
                annualized_return: funding_spread * ANNUALIZATION_DAYS * FUNDING_PERIODS_PER_DAY,
                required_capital,
            });
        }

        opportunities
    }

    fn mid(&self, symbol: &Symbol, venue: Venue, instrument: InstrumentType) -> Option<f64> {
        let key = MarketDataKey::new(symbol.clone(), venue, instrument);
        self.consolidator.market_data(&key).and_then(|md| md.mid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use common::{MarketData, Ts};
    use feeds::FeedEvent;
    use lob::BookStore;

    fn setup() -> (Arc<Consolidator>, PerpetualPricer) {
        let consolidator = Arc::new(Consolidator::new(Arc::new(BookStore::new(50)), 64));
        let pricer = PerpetualPricer::new(Arc::clone(&consolidator), PricerConfig::default());
        (consolidator, pricer)
    }

    fn perp(venue: Venue, mid: f64, funding: f64) -> MarketData {
        MarketData {
            symbol: Symbol::from("BTC-USDT"),
            venue,
            instrument: InstrumentType::Perpetual,
            ts: Ts::now(),
            bid_price: mid - 1.0,
            ask_price: mid + 1.0,
            bid_size: 1.0,
            ask_size: 1.0,
            last_price: mid,
            volume_24h: 0.0,
            funding_rate: Some(funding),
            expiry: None,
        }
    }

    fn spot(venue: Venue, mid: f64) -> MarketData {
        MarketData {
            instrument: InstrumentType::Spot,
            funding_rate: None,
            ..perp(venue, mid, 0.0)
        }
    }

    #[test]
    fn fair_funding_is_three_times_basis() {
        let (consolidator, pricer) = setup();
        consolidator.ingest(FeedEvent::Ticker(spot(Venue::Okx, 50_000.0)));
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Okx, 50_100.0, 0.0001)));

        let fair = pricer
            .fair_funding_rate(&Symbol::from("BTC-USDT"), Venue::Okx)
            .unwrap();
        let basis = 100.0 / 50_000.0;
        assert_relative_eq!(fair, basis * 3.0, epsilon = 1e-12);
    }

    #[test]
    fn synthetic_spot_discounts_funding() {
        let (consolidator, pricer) = setup();
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Binance, 50_000.0, 0.0004)));

        // 16 hours = 2 funding periods
        let synth = pricer
            .synthetic_spot(&Symbol::from("BTC-USDT"), Venue::Binance, 16.0)
            .unwrap();
        assert_relative_eq!(synth, 50_000.0 * (1.0 - 0.0004 * 2.0), epsilon = 1e-9);
    }

    #[test]
    fn funding_scan_longs_cheap_shorts_rich() {
        let (consolidator, pricer) = setup();
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Okx, 50_000.0, 0.0001)));
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Binance, 50_000.0, 0.0005)));
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Bybit, 50_000.0, 0.0002)));

        let arbs = pricer.find_funding_arbitrage(&[Symbol::from("BTC-USDT")], 2.0);
        assert_eq!(arbs.len(), 1);
        let arb = &arbs[0];
        assert_eq!(arb.long_venue, Venue::Okx);
        assert_eq!(arb.short_venue, Venue::Binance);
        assert_relative_eq!(arb.funding_spread, 0.0004, epsilon = 1e-12);
        assert_relative_eq!(arb.annualized_return, 0.0004 * 365.0 * 3.0, epsilon = 1e-9);
        assert_relative_eq!(arb.required_capital, 100_000.0, epsilon = 1e-6);
    }

    #[test]
    fn zero_funding_everywhere_yields_nothing() {
        let (consolidator, pricer) = setup();
        for venue in Venue::ALL {
            consolidator.ingest(FeedEvent::Ticker(perp(venue, 50_000.0, 0.0)));
        }
        let arbs = pricer.find_funding_arbitrage(&[Symbol::from("BTC-USDT")], 2.0);
        assert!(arbs.is_empty());
    }

    #[test]
    fn spread_below_threshold_skipped() {
        let (consolidator, pricer) = setup();
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Okx, 50_000.0, 0.00010)));
        consolidator.ingest(FeedEvent::Ticker(perp(Venue::Binance, 50_000.0, 0.00011)));
        // 0.1 bps spread vs 2 bps threshold
        let arbs = pricer.find_funding_arbitrage(&[Symbol::from("BTC-USDT")], 2.0);
        assert!(arbs.is_empty());
    }
}
