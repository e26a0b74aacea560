//! Risk-budgeted position sizing and bracket placement
//!
//! Quantity is derived from the dollars the account is willing to lose at the
//! stop, then bounded by:
//! - a notional cap of `equity × max position fraction × leverage`
//! - the instrument's quantity step (rounded down) and minimum quantity

use crate::domain::entities::position::PositionSide;
use crate::domain::errors::SizingError;
use crate::domain::value_objects::position_sizing::{
    Bracket, PositionSizingRequest, PositionSizingResult,
};
use crate::domain::value_objects::price::{ceil_to_step, floor_to_step};

/// Decimal places kept on the final quantity
const QUANTITY_DECIMALS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskParameters {
    /// Fraction of equity risked per trade
    pub risk_fraction: f64,
    /// Stop distance in ATR multiples
    pub stop_atr_multiplier: f64,
    /// Target distance in ATR multiples
    pub target_atr_multiplier: f64,
    /// Floor on the stop distance as a fraction of price
    pub min_stop_fraction: f64,
    /// Fraction of equity usable as margin for one position
    pub max_position_equity_fraction: f64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            risk_fraction: 0.003,
            stop_atr_multiplier: 1.5,
            target_atr_multiplier: 2.0,
            min_stop_fraction: 0.002,
            max_position_equity_fraction: 0.2,
        }
    }
}

/// PositionSizer service for calculating order quantity and bracket levels
#[derive(Debug, Clone)]
pub struct PositionSizer {
    params: RiskParameters,
}

impl PositionSizer {
    pub fn new(params: RiskParameters) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    /// Size a position for the given request
    ///
    /// The result is never below the instrument's minimum quantity, even when
    /// the risk budget alone would call for less.
    pub fn size_position(
        &self,
        req: &PositionSizingRequest,
    ) -> Result<PositionSizingResult, SizingError> {
        let risk_amount = req.equity * self.params.risk_fraction;
        let stop_distance = (req.atr * self.params.stop_atr_multiplier)
            .max(req.price * self.params.min_stop_fraction);
        if !(stop_distance > 0.0) {
            return Err(SizingError::ZeroStopDistance);
        }

        let raw_quantity = risk_amount / stop_distance;
        let max_notional =
            req.equity * self.params.max_position_equity_fraction * req.leverage;
        let max_quantity = max_notional / req.price;
        let capped_by_notional = max_quantity < raw_quantity;

        let stepped = floor_to_step(raw_quantity.min(max_quantity), req.instrument.quantity_step);
        let quantity = round_quantity(stepped.max(req.instrument.min_quantity));

        Ok(PositionSizingResult {
            quantity,
            risk_amount,
            stop_distance,
            capped_by_notional,
        })
    }

    /// Stop-loss and take-profit levels for an entry at `price`
    ///
    /// Levels are tick-aligned per side: the stop is rounded away from the
    /// entry and the target towards it. Returns `None` for a flat side, or
    /// when rounding leaves a level on the wrong side of the entry or at a
    /// non-positive price.
    pub fn bracket_prices(
        &self,
        side: PositionSide,
        price: f64,
        atr: f64,
        price_tick: f64,
    ) -> Option<Bracket> {
        let stop_offset = self.params.stop_atr_multiplier * atr;
        let target_offset = self.params.target_atr_multiplier * atr;

        let bracket = match side {
            PositionSide::Long => Bracket {
                stop_loss: floor_to_step(price - stop_offset, price_tick),
                take_profit: floor_to_step(price + target_offset, price_tick),
            },
            PositionSide::Short => Bracket {
                stop_loss: ceil_to_step(price + stop_offset, price_tick),
                take_profit: ceil_to_step(price - target_offset, price_tick),
            },
            PositionSide::Flat => return None,
        };

        let ordered = match side {
            PositionSide::Long => bracket.stop_loss < price && price < bracket.take_profit,
            _ => bracket.take_profit < price && price < bracket.stop_loss,
        };
        let positive = bracket.stop_loss > 0.0 && bracket.take_profit > 0.0;
        (ordered && positive).then_some(bracket)
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(RiskParameters::default())
    }
}

fn round_quantity(quantity: f64) -> f64 {
    let scale = 10f64.powi(QUANTITY_DECIMALS);
    (quantity * scale).round() / scale
}
