use crate::domain::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Result<Self, ValidationError> {
        if !value.is_finite() {
            Err(ValidationError::MustBeFinite)
        } else if value < 0.0 {
            Err(ValidationError::InvalidPrice(format!(
                "{} is negative",
                value
            )))
        } else {
            Ok(Price(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Absorbs binary representation noise such as `0.3 / 0.1 = 2.9999999999999996`.
const STEP_EPSILON: f64 = 1e-9;

/// Largest multiple of `step` that is `<= value`. A non-positive step leaves
/// the value untouched.
pub fn floor_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    round_to_step_precision((value / step + STEP_EPSILON).floor() * step, step)
}

/// Smallest multiple of `step` that is `>= value`.
pub fn ceil_to_step(value: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return value;
    }
    round_to_step_precision((value / step - STEP_EPSILON).ceil() * step, step)
}

fn round_to_step_precision(value: f64, step: f64) -> f64 {
    let decimals = decimals_of(step);
    let scale = 10f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Number of decimal places needed to represent `step` (capped at 12).
pub fn decimals_of(step: f64) -> u32 {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 12 && (scaled - scaled.round()).abs() > STEP_EPSILON {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals
}
