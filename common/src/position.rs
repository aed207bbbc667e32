//! Open position bookkeeping

use crate::types::{InstrumentType, Side, Symbol, Ts, Venue};
use serde::{Deserialize, Serialize};

/// One open position on a single (symbol, venue, instrument)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Normalized symbol
    pub symbol: Symbol,
    /// Venue holding the position
    pub venue: Venue,
    /// Instrument of the position
    pub instrument: InstrumentType,
    /// Long (Buy) or short (Sell)
    pub side: Side,
    /// Position size
    pub quantity: f64,
    /// Volume-weighted entry price
    pub average_price: f64,
    /// Latest mark price
    pub current_price: f64,
    /// Time the position was opened
    pub entry_time: Ts,
}

impl Position {
    /// Mark-to-market PnL: `(current - avg) * qty * sign(side)`
    pub fn unrealized_pnl(&self) -> f64 {
        (self.current_price - self.average_price) * self.quantity * self.side.sign()
    }

    /// Notional exposure at the current mark
    pub fn exposure(&self) -> f64 {
        self.quantity * self.current_price
    }
}
