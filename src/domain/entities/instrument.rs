use crate::domain::errors::ValidationError;

/// Trading rules of the symbol, fetched once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentSpec {
    pub quantity_step: f64,
    pub min_quantity: f64,
    pub price_tick: f64,
    pub max_leverage: f64,
}

impl InstrumentSpec {
    pub fn new(
        quantity_step: f64,
        min_quantity: f64,
        price_tick: f64,
        max_leverage: f64,
    ) -> Result<Self, ValidationError> {
        if !(quantity_step > 0.0) || !quantity_step.is_finite() {
            return Err(ValidationError::InvalidQuantity(format!(
                "quantity step must be positive, got {}",
                quantity_step
            )));
        }
        if !(min_quantity >= 0.0) || !min_quantity.is_finite() {
            return Err(ValidationError::InvalidQuantity(format!(
                "minimum quantity must be non-negative, got {}",
                min_quantity
            )));
        }
        if !(price_tick > 0.0) || !price_tick.is_finite() {
            return Err(ValidationError::InvalidPrice(format!(
                "price tick must be positive, got {}",
                price_tick
            )));
        }
        if !(max_leverage >= 1.0) {
            return Err(ValidationError::InvalidQuantity(format!(
                "max leverage must be at least 1, got {}",
                max_leverage
            )));
        }

        Ok(Self {
            quantity_step,
            min_quantity,
            price_tick,
            max_leverage,
        })
    }

    /// Leverage actually requested from the exchange: the configured cap
    /// bounded by what the instrument allows, truncated to a whole number.
    pub fn effective_leverage(&self, configured: u32) -> u32 {
        let allowed = self.max_leverage.floor().max(1.0) as u32;
        configured.min(allowed).max(1)
    }
}
