use chrono::NaiveDate;

/// Account-level risk limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerConfig {
    /// Loss against the daily baseline that pauses trading (e.g. 0.02 = 2%)
    pub daily_loss_limit: f64,
    /// Loss against the session baseline that stops the bot for good
    pub global_drawdown_limit: f64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit: 0.02,
            global_drawdown_limit: 0.05,
        }
    }
}

/// Verdict of one breaker evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakerStatus {
    /// Limits respected, trading may proceed
    Clear,
    /// Daily loss limit reached: skip trading this cycle
    Pause { change: f64 },
    /// Global drawdown limit reached: terminate
    Halt { change: f64 },
}

impl BreakerStatus {
    pub fn is_clear(&self) -> bool {
        matches!(self, BreakerStatus::Clear)
    }
}

/// Equity baselines the breakers measure against
#[derive(Debug, Clone, PartialEq)]
pub struct EquityState {
    session_start_equity: f64,
    daily_baseline_equity: f64,
    baseline_date: NaiveDate,
}

impl EquityState {
    /// Both baselines start at the equity observed at process start.
    pub fn new(equity: f64, today: NaiveDate) -> Self {
        Self {
            session_start_equity: equity,
            daily_baseline_equity: equity,
            baseline_date: today,
        }
    }

    pub fn session_start_equity(&self) -> f64 {
        self.session_start_equity
    }

    pub fn daily_baseline_equity(&self) -> f64 {
        self.daily_baseline_equity
    }

    pub fn baseline_date(&self) -> NaiveDate {
        self.baseline_date
    }

    /// Reset the daily baseline to `equity` on the first observation of a new
    /// date. Returns whether a rollover happened.
    pub fn roll_daily(&mut self, today: NaiveDate, equity: f64) -> bool {
        if today <= self.baseline_date {
            return false;
        }
        self.daily_baseline_equity = equity;
        self.baseline_date = today;
        true
    }
}

/// Relative change of `equity` against `baseline`; `None` when the baseline
/// cannot anchor a ratio.
fn relative_change(equity: f64, baseline: f64) -> Option<f64> {
    if baseline > 0.0 {
        Some((equity - baseline) / baseline)
    } else {
        None
    }
}

/// Evaluates drawdown limits against freshly polled equity.
///
/// The halt check runs first so a simultaneous pause never masks it.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    pub fn evaluate(&self, state: &EquityState, equity: f64) -> BreakerStatus {
        if let Some(change) = relative_change(equity, state.session_start_equity) {
            if change <= -self.config.global_drawdown_limit {
                return BreakerStatus::Halt { change };
            }
        }
        if let Some(change) = relative_change(equity, state.daily_baseline_equity) {
            if change <= -self.config.daily_loss_limit {
                return BreakerStatus::Pause { change };
            }
        }
        BreakerStatus::Clear
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
