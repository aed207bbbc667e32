//! Spot vs synthetic-spot mispricing scan

use crate::perpetual::PerpetualPricer;
use crate::PricerConfig;
use common::constants::{ANNUALIZATION_DAYS, FUNDING_PERIODS_PER_DAY};
use common::{InstrumentType, MarketDataKey, Symbol, Venue};
use feeds::Consolidator;
use std::sync::Arc;

/// A spot-vs-synthetic mispricing across a venue pair
#[derive(Debug, Clone)]
pub struct SyntheticArbitrage {
    /// Underlying symbol
    pub symbol: Symbol,
    /// Venue quoting the cash leg
    pub spot_venue: Venue,
    /// Venue quoting the perpetual used for the synthetic leg
    pub synthetic_venue: Venue,
    /// Instrument of the synthetic leg
    pub synthetic_type: InstrumentType,
    /// Spot mid on `spot_venue`
    pub spot_price: f64,
    /// Perp mid on `synthetic_venue`
    pub synthetic_price: f64,
    /// Funding-discounted synthetic spot (the fair value)
    pub fair_value: f64,
    /// Perp-spot basis on the synthetic venue, in bps
    pub basis_bps: f64,
    /// Fair value minus spot mid, in bps of spot
    pub mispricing_bps: f64,
    /// `|mispricing| - fee_buffer`, in bps
    pub expected_profit_bps: f64,
    /// Executable size: min(spot bid size, perp ask size)
    pub max_size: f64,
    /// Funding rate carried by the synthetic leg
    pub funding_impact: f64,
    /// Execution risk score for the pair
    pub execution_risk: f64,
}

/// Scanner for spot-vs-synthetic dislocations
pub struct SyntheticPricer {
    consolidator: Arc<Consolidator>,
    perpetual: PerpetualPricer,
    /// Fees and slippage subtracted from the gross mispricing, in bps
    fee_buffer_bps: f64,
}

impl SyntheticPricer {
    /// Create a scanner; `fee_buffer_bps` is subtracted from gross mispricing
    pub fn new(consolidator: Arc<Consolidator>, config: PricerConfig, fee_buffer_bps: f64) -> Self {
        let perpetual = PerpetualPricer::new(Arc::clone(&consolidator), config);
        Self {
            consolidator,
            perpetual,
            fee_buffer_bps,
        }
    }

    /// Basis of a synthetic instrument against same-venue spot, in bps
    pub fn basis_bps(
        &self,
        symbol: &Symbol,
        synthetic_type: InstrumentType,
        venue: Venue,
    ) -> Option<f64> {
        let spot_mid = self.mid(symbol, venue, InstrumentType::Spot)?;
        let synth_mid = self.mid(symbol, venue, synthetic_type)?;
        if spot_mid <= 0.0 {
            return None;
        }
        Some((synth_mid - spot_mid) / spot_mid * 10_000.0)
    }

    /// Annualized funding implied by the perp-spot basis
    pub fn implied_funding_rate(&self, symbol: &Symbol, venue: Venue) -> Option<f64> {
        let basis_bps = self.basis_bps(symbol, InstrumentType::Perpetual, venue)?;
        Some(basis_bps * ANNUALIZATION_DAYS * FUNDING_PERIODS_PER_DAY / 10_000.0)
    }

    /// Scan every (spot venue, perp venue) pair of each symbol
    pub fn find_opportunities(
        &self,
        symbols: &[Symbol],
        min_profit_bps: f64,
    ) -> Vec<SyntheticArbitrage> {
        let mut opportunities = Vec::new();

        for symbol in symbols {
            for spot_venue in Venue::ALL {
                let Some(spot_md) = self.consolidator.market_data(&MarketDataKey::new(
                    symbol.clone(),
                    spot_venue,
                    InstrumentType::Spot,
                )) else {
                    continue;
                };
                let Some(spot_mid) = spot_md.mid() else {
                    continue;
                };

                for perp_venue in Venue::ALL {
                    let Some(perp_md) = self.consolidator.market_data(&MarketDataKey::new(
                        symbol.clone(),
                        perp_venue,
                        InstrumentType::Perpetual,
                    )) else {
                        continue;
                    };
                    let Some(perp_mid) = perp_md.mid() else {
                        continue;
                    };

                    // One funding period of carry on the synthetic leg
                    let Some(fair_value) = self.perpetual.synthetic_spot(symbol, perp_venue, 8.0)
                    else {
                        continue;
                    };

                    let mispricing_bps = (fair_value - spot_mid) / spot_mid * 10_000.0;
                    if mispricing_bps.abs() <= min_profit_bps {
                        continue;
                    }

                    opportunities.push(SyntheticArbitrage {
                        symbol: symbol.clone(),
                        spot_venue,
                        synthetic_venue: perp_venue,
                        synthetic_type: InstrumentType::Perpetual,
                        spot_price: spot_mid,
                        synthetic_price: perp_mid,
                        fair_value,
                        basis_bps: self
                            .basis_bps(symbol, InstrumentType::Perpetual, perp_venue)
                            .unwrap_or(0.0),
                        mispricing_bps,
                        expected_profit_bps: mispricing_bps.abs() - self.fee_buffer_bps,
                        max_size: spot_md.bid_size.min(perp_md.ask_size),
                        funding_impact: self.perpetual.funding_rate(symbol, perp_venue),
                        execution_risk: 0.3,
                    });
                }
            }
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

    fn setup(fee_buffer_bps: f64) -> (Arc<Consolidator>, SyntheticPricer) {
        let consolidator = Arc::new(Consolidator::new(Arc::new(BookStore::new(50)), 64));
        let pricer = SyntheticPricer::new(
            Arc::clone(&consolidator),
            PricerConfig::default(),
            fee_buffer_bps,
        );
        (consolidator, pricer)
    }

    fn entry(venue: Venue, instrument: InstrumentType, mid: f64, funding: Option<f64>) -> MarketData {
        MarketData {
            symbol: Symbol::from("BTC-USDT"),
            venue,
            instrument,
            ts: Ts::now(),
            bid_price: mid - 1.0,
            ask_price: mid + 1.0,
            bid_size: 2.0,
            ask_size: 3.0,
            last_price: mid,
            volume_24h: 0.0,
            funding_rate: funding,
            expiry: None,
        }
    }

    #[test]
    fn basis_bps_same_venue() {
        let (consolidator, pricer) = setup(10.0);
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Spot,
            50_000.0,
            None,
        )));
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Perpetual,
            50_050.0,
            Some(0.0001),
        )));

        let basis = pricer
            .basis_bps(&Symbol::from("BTC-USDT"), InstrumentType::Perpetual, Venue::Okx)
            .unwrap();
        assert_relative_eq!(basis, 50.0 / 50_000.0 * 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn implied_funding_annualizes_basis() {
        let (consolidator, pricer) = setup(10.0);
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Spot,
            50_000.0,
            None,
        )));
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Perpetual,
            50_050.0,
            None,
        )));

        let implied = pricer
            .implied_funding_rate(&Symbol::from("BTC-USDT"), Venue::Okx)
            .unwrap();
        let basis_bps = 10.0;
        assert_relative_eq!(implied, basis_bps * 365.0 * 3.0 / 10_000.0, epsilon = 1e-9);
    }

    #[test]
    fn scan_flags_rich_perp() {
        let (consolidator, pricer) = setup(10.0);
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Spot,
            50_000.0,
            None,
        )));
        // Perp 1% rich with no funding discount
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Binance,
            InstrumentType::Perpetual,
            50_500.0,
            Some(0.0),
        )));

        let opportunities = pricer.find_opportunities(&[Symbol::from("BTC-USDT")], 20.0);
        assert_eq!(opportunities.len(), 1);
        let arb = &opportunities[0];
        assert_eq!(arb.spot_venue, Venue::Okx);
        assert_eq!(arb.synthetic_venue, Venue::Binance);
        assert_relative_eq!(arb.mispricing_bps, 100.0, epsilon = 1e-9);
        assert_relative_eq!(arb.expected_profit_bps, 90.0, epsilon = 1e-9);
        assert_relative_eq!(arb.max_size, 2.0);
        assert_relative_eq!(arb.execution_risk, 0.3);
    }

    #[test]
    fn scan_quiet_inside_threshold() {
        let (consolidator, pricer) = setup(10.0);
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Spot,
            50_000.0,
            None,
        )));
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Perpetual,
            50_010.0,
            Some(0.0),
        )));

        // 2 bps rich vs 20 bps threshold
        assert!(pricer
            .find_opportunities(&[Symbol::from("BTC-USDT")], 20.0)
            .is_empty());
    }

    #[test]
    fn scan_needs_both_legs() {
        let (consolidator, pricer) = setup(10.0);
        consolidator.ingest(FeedEvent::Ticker(entry(
            Venue::Okx,
            InstrumentType::Spot,
            50_000.0,
            None,
        )));
        assert!(pricer
            .find_opportunities(&[Symbol::from("BTC-USDT")], 1.0)
            .is_empty());
    }
}
