//! Fair-value models for synthetic instruments
//!
//! Three pricers over the consolidated ticker cache: dated futures
//! (cost-of-carry), perpetuals (funding-implied), and the spot-vs-synthetic
//! mispricing scan feeding the detector.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod futures;
pub mod perpetual;
pub mod synthetic;

pub use futures::{CalendarSpread, FuturesPricer};
pub use perpetual::{FundingArbitrage, PerpetualPricer};
pub use synthetic::{SyntheticArbitrage, SyntheticPricer};

use common::constants::YEAR_DAYS;
use common::Ts;

/// Shared pricer parameters
#[derive(Debug, Clone, Copy)]
pub struct PricerConfig {
    /// Annualized risk-free rate
    pub risk_free_rate: f64,
    /// Annualized storage / carry cost
    pub storage_cost: f64,
}

impl Default for PricerConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: common::constants::RISK_FREE_RATE,
            storage_cost: 0.0,
        }
    }
}

/// Years from `now` until `expiry`, clamped at zero
pub fn time_to_expiry(now: Ts, expiry: Ts) -> f64 {
    now.days_until(expiry) / YEAR_DAYS
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn time_to_expiry_one_year() {
        let now = Ts::from_millis(0);
        let expiry = Ts::from_nanos((YEAR_DAYS * 24.0 * 3600.0 * 1e9) as u64);
        assert_relative_eq!(time_to_expiry(now, expiry), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn time_to_expiry_clamps_past() {
        let now = Ts::from_millis(10_000);
        let expiry = Ts::from_millis(0);
        assert_eq!(time_to_expiry(now, expiry), 0.0);
    }
}
