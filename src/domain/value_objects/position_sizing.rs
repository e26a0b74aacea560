//! Position sizing request and result value objects

use crate::domain::entities::instrument::InstrumentSpec;
use crate::domain::errors::SizingError;

/// Inputs of one sizing calculation
#[derive(Debug, Clone)]
pub struct PositionSizingRequest {
    /// Account equity in quote currency
    pub equity: f64,
    /// Entry reference price
    pub price: f64,
    /// Current average true range
    pub atr: f64,
    /// Effective leverage applied to the notional cap
    pub leverage: f64,
    pub instrument: InstrumentSpec,
}

impl PositionSizingRequest {
    /// Build a request, rejecting inputs that would make sizing meaningless
    pub fn new(
        equity: f64,
        price: f64,
        atr: f64,
        leverage: f64,
        instrument: InstrumentSpec,
    ) -> Result<Self, SizingError> {
        if !(equity > 0.0) {
            return Err(SizingError::NonPositiveEquity(equity));
        }
        if !(price > 0.0) {
            return Err(SizingError::NonPositivePrice(price));
        }
        if !atr.is_finite() || atr < 0.0 {
            return Err(SizingError::InvalidAtr(atr));
        }

        Ok(Self {
            equity,
            price,
            atr,
            leverage,
            instrument,
        })
    }
}

/// Outcome of a sizing calculation
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizingResult {
    pub quantity: f64,
    /// Dollars at risk between entry and stop
    pub risk_amount: f64,
    pub stop_distance: f64,
    /// True when the notional cap, not the risk budget, bound the quantity
    pub capped_by_notional: bool,
}

impl PositionSizingResult {
    pub fn notional_value(&self, price: f64) -> f64 {
        self.quantity * price
    }
}

/// Exchange-side protective levels attached to an entry order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub stop_loss: f64,
    pub take_profit: f64,
}
