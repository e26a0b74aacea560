//! Technical indicators over a bounded candle window.
//!
//! Every function is pure and returns `None` when the series is too short for
//! its period, so callers never mistake a warm-up artefact for a signal.

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::price::Price;

#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64) -> Result<Self, ValidationError> {
        Ok(Candle {
            open: Price::new(open)?,
            high: Price::new(high)?,
            low: Price::new(low)?,
            close: Price::new(close)?,
        })
    }
}

/// Simple moving average of the trailing `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average seeded inside the supplied window.
///
/// The seed is the mean of the oldest `period` values, then the remainder of
/// the window is smoothed with `2 / (period + 1)`. Nothing is carried between
/// calls, so the value depends on where the window starts and only
/// approximates an EMA maintained over the full history.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    Some(
        values[period..]
            .iter()
            .fold(seed, |ema, &v| v * multiplier + ema * (1.0 - multiplier)),
    )
}

/// Relative strength index over the last `period` changes, unsmoothed.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let window = &values[values.len() - period - 1..];

    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change >= 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Average true range with Wilder smoothing.
///
/// `high`, `low` and `close` must be aligned; the shortest slice bounds the
/// series.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    let len = high.len().min(low.len()).min(close.len());
    if period == 0 || len < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = (1..len)
        .map(|i| {
            let prev_close = close[i - 1];
            (high[i] - low[i])
                .max((high[i] - prev_close).abs())
                .max((low[i] - prev_close).abs())
        })
        .collect();

    let seed = true_ranges[..period].iter().sum::<f64>() / period as f64;
    let n = period as f64;
    Some(
        true_ranges[period..]
            .iter()
            .fold(seed, |a, &tr| (a * (n - 1.0) + tr) / n),
    )
}

/// Indicator values of one cycle. `None` marks an indicator still warming up.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub ema_trend: Option<f64>,
    pub sma_fast: Option<f64>,
    pub sma_slow: Option<f64>,
    pub rsi: Option<f64>,
    pub atr: Option<f64>,
    pub close: f64,
}

/// Periods used to build a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorPeriods {
    pub ema_trend: usize,
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub rsi: usize,
    pub atr: usize,
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            ema_trend: 200,
            sma_fast: 20,
            sma_slow: 50,
            rsi: 14,
            atr: 14,
        }
    }
}

impl IndicatorPeriods {
    /// Bars needed before every indicator is available
    pub fn warmup(&self) -> usize {
        self.ema_trend
            .max(self.sma_fast)
            .max(self.sma_slow)
            .max(self.rsi + 1)
            .max(self.atr + 1)
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorPipeline {
    periods: IndicatorPeriods,
}

impl IndicatorPipeline {
    pub fn new(periods: IndicatorPeriods) -> Self {
        Self { periods }
    }

    pub fn periods(&self) -> &IndicatorPeriods {
        &self.periods
    }

    /// Compute every indicator over `candles`. `None` for an empty series.
    pub fn snapshot(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        let close: Vec<f64> = candles.iter().map(|c| c.close.value()).collect();
        let high: Vec<f64> = candles.iter().map(|c| c.high.value()).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low.value()).collect();
        let last = *close.last()?;

        Some(IndicatorSnapshot {
            ema_trend: ema(&close, self.periods.ema_trend),
            sma_fast: sma(&close, self.periods.sma_fast),
            sma_slow: sma(&close, self.periods.sma_slow),
            rsi: rsi(&close, self.periods.rsi),
            atr: atr(&high, &low, &close, self.periods.atr),
            close: last,
        })
    }
}
