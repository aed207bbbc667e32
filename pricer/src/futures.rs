//! Cost-of-carry pricing for dated futures

use crate::{time_to_expiry, PricerConfig};
use common::{InstrumentType, MarketDataKey, Symbol, Ts, Venue};
use feeds::Consolidator;
use std::sync::Arc;

/// A calendar-spread mispricing between two expiries
#[derive(Debug, Clone)]
pub struct CalendarSpread {
    /// Underlying symbol
    pub symbol: Symbol,
    /// Near-leg expiry
    pub near_expiry: Ts,
    /// Far-leg expiry
    pub far_expiry: Ts,
    /// Observed (or proxied) near-leg price
    pub near_price: f64,
    /// Observed (or proxied) far-leg price
    pub far_price: f64,
    /// Observed spread `far - near`
    pub spread: f64,
    /// Carry-model spread `far - near`
    pub theoretical_spread: f64,
    /// Observed minus theoretical, in bps of spot
    pub mispricing_bps: f64,
}

/// Futures fair values from the cost-of-carry model
pub struct FuturesPricer {
    consolidator: Arc<Consolidator>,
    config: PricerConfig,
}

impl FuturesPricer {
    /// Create a pricer over the consolidated ticker cache
    pub fn new(consolidator: Arc<Consolidator>, config: PricerConfig) -> Self {
        Self {
            consolidator,
            config,
        }
    }

    /// `F = S * exp((r + c) * T)` with `S` the best cross-venue spot bid
    pub fn fair_value(&self, symbol: &Symbol, expiry: Ts) -> Option<f64> {
        let spot = self
            .consolidator
            .best_prices(symbol, InstrumentType::Spot)?;
        let t = time_to_expiry(Ts::now(), expiry);
        Some(spot.best_bid * ((self.config.risk_free_rate + self.config.storage_cost) * t).exp())
    }

    /// Rate implied by an observed futures quote: `ln(F/S) / T`
    pub fn implied_rate(&self, futures_price: f64, spot_price: f64, expiry: Ts) -> Option<f64> {
        if spot_price <= 0.0 || futures_price <= 0.0 {
            return None;
        }
        let t = time_to_expiry(Ts::now(), expiry);
        if t <= 0.0 {
            return None;
        }
        Some((futures_price / spot_price).ln() / t)
    }

    /// Synthetic spot discounted back from the best futures bid
    pub fn spot_from_futures(&self, symbol: &Symbol, expiry: Ts) -> Option<f64> {
        let futures = self
            .consolidator
            .best_prices(symbol, InstrumentType::Futures)?;
        let t = time_to_expiry(Ts::now(), expiry);
        Some(futures.best_bid * (-self.config.risk_free_rate * t).exp())
    }

    /// Scan every (near, far) expiry pair of each symbol for spread mispricing
    ///
    /// Market legs come from quoted futures mids when available; otherwise
    /// the perpetual mid proxies the far leg against the theoretical near.
    pub fn find_calendar_spreads(
        &self,
        symbols: &[Symbol],
        expiries: &[Ts],
        min_profit_bps: f64,
    ) -> Vec<CalendarSpread> {
        let mut spreads = Vec::new();

        for symbol in symbols {
            let Some(spot) = self.consolidator.best_prices(symbol, InstrumentType::Spot) else {
                continue;
            };
            let spot_mid = (spot.best_bid + spot.best_ask) / 2.0;
            if spot_mid <= 0.0 {
                continue;
            }

            for (i, &near_expiry) in expiries.iter().enumerate() {
                for &far_expiry in &expiries[i + 1..] {
                    let (Some(near_theo), Some(far_theo)) = (
                        self.fair_value(symbol, near_expiry),
                        self.fair_value(symbol, far_expiry),
                    ) else {
                        continue;
                    };
                    if near_theo <= 0.0 || far_theo <= 0.0 {
                        continue;
                    }
                    let theoretical_spread = far_theo - near_theo;

                    let market_legs = self
                        .quoted_futures_mid(symbol)
                        .map(|mid| (mid, mid))
                        .or_else(|| {
                            self.perp_mid(symbol)
                                .map(|perp_mid| (near_theo, perp_mid))
                        });
                    let Some((near_price, far_price)) = market_legs else {
                        continue;
                    };

                    let spread = far_price - near_price;
                    let mispricing_bps = (spread - theoretical_spread) / spot_mid * 10_000.0;

                    if mispricing_bps.abs() > min_profit_bps {
                        spreads.push(CalendarSpread {
                            symbol: symbol.clone(),
                            near_expiry,
                            far_expiry,
                            near_price,
                            far_price,
                            spread,
                            theoretical_spread,
                            mispricing_bps,
                        });
                    }
                }
            }
        }

        spreads
    }

    fn quoted_futures_mid(&self, symbol: &Symbol) -> Option<f64> {
        let futures = self
            .consolidator
            .best_prices(symbol, InstrumentType::Futures)?;
        let mid = (futures.best_bid + futures.best_ask) / 2.0;
        (mid > 0.0).then_some(mid)
    }

    fn perp_mid(&self, symbol: &Symbol) -> Option<f64> {
        for venue in Venue::ALL {
            let key = MarketDataKey::new(symbol.clone(), venue, InstrumentType::Perpetual);
            if let Some(mid) = self.consolidator.market_data(&key).and_then(|md| md.mid()) {
                return Some(mid);
            }
        }
        None
    }
}
