//! Trend-following entry/exit rules with an ATR trailing stop.

use crate::domain::entities::position::{Position, PositionSide};
use crate::domain::services::indicators::IndicatorSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Hold,
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    Manage,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Decision::Hold => "hold",
            Decision::OpenLong => "open_long",
            Decision::OpenShort => "open_short",
            Decision::CloseLong => "close_long",
            Decision::CloseShort => "close_short",
            Decision::Manage => "manage",
        };
        write!(f, "{}", name)
    }
}

/// Thresholds of the entry and trailing rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParameters {
    /// RSI must exceed this for a long entry
    pub rsi_long: f64,
    /// RSI must stay below this for a short entry
    pub rsi_short: f64,
    /// Trailing distance in ATR multiples
    pub trail_atr_multiplier: f64,
}

impl Default for SignalParameters {
    fn default() -> Self {
        Self {
            rsi_long: 55.0,
            rsi_short: 45.0,
            trail_atr_multiplier: 1.5,
        }
    }
}

/// Result of one evaluation.
///
/// `trailing_stop` is the stop the held position should carry after this
/// cycle; it is set whenever a position is open and ATR is available, and
/// never looser than the current stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub trailing_stop: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SignalEngine {
    params: SignalParameters,
}

impl SignalEngine {
    pub fn new(params: SignalParameters) -> Self {
        Self { params }
    }

    pub fn long_entry(&self, s: &IndicatorSnapshot) -> bool {
        match (s.sma_fast, s.sma_slow, s.ema_trend, s.rsi) {
            (Some(fast), Some(slow), Some(trend), Some(rsi)) => {
                fast > slow && s.close > trend && rsi > self.params.rsi_long
            }
            _ => false,
        }
    }

    pub fn short_entry(&self, s: &IndicatorSnapshot) -> bool {
        match (s.sma_fast, s.sma_slow, s.ema_trend, s.rsi) {
            (Some(fast), Some(slow), Some(trend), Some(rsi)) => {
                fast < slow && s.close < trend && rsi < self.params.rsi_short
            }
            _ => false,
        }
    }

    pub fn evaluate(&self, snapshot: &IndicatorSnapshot, position: &Position) -> Evaluation {
        let trail_distance = snapshot
            .atr
            .map(|atr| self.params.trail_atr_multiplier * atr);

        match position.side() {
            PositionSide::Flat => {
                let decision = if self.long_entry(snapshot) {
                    Decision::OpenLong
                } else if self.short_entry(snapshot) {
                    Decision::OpenShort
                } else {
                    Decision::Hold
                };
                Evaluation {
                    decision,
                    trailing_stop: None,
                }
            }
            PositionSide::Long => Evaluation {
                decision: if self.short_entry(snapshot) {
                    Decision::CloseLong
                } else {
                    Decision::Manage
                },
                trailing_stop: trail_distance
                    .map(|d| position.stop_loss().max(snapshot.close - d)),
            },
            PositionSide::Short => Evaluation {
                decision: if self.long_entry(snapshot) {
                    Decision::CloseShort
                } else {
                    Decision::Manage
                },
                trailing_stop: trail_distance
                    .map(|d| position.stop_loss().min(snapshot.close + d)),
            },
        }
    }
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(SignalParameters::default())
    }
}
