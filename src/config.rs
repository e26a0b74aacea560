use crate::domain::services::circuit_breaker::CircuitBreakerConfig;
use crate::domain::services::indicators::IndicatorPeriods;
use crate::domain::services::position_sizer::RiskParameters;
use crate::domain::services::signal_engine::SignalParameters;
use std::str::FromStr;
use std::time::Duration;

/// Exchange environment the bot connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// `main` selects mainnet, anything else testnet
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("main") {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Mainnet => write!(f, "main"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings of one run, built once and passed to every component
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub symbol: String,
    pub network: Network,
    /// Log orders instead of transmitting them
    pub dry_run: bool,
    /// Equity reported by the dry-run gateway when no credentials are set
    pub dry_run_equity: f64,
    /// Kline interval in exchange notation ("5" = 5 minutes)
    pub candle_interval: String,
    /// Bars fetched per cycle
    pub candle_limit: usize,
    pub poll_interval: Duration,
    /// Idle time after a daily-loss pause
    pub pause_interval: Duration,
    pub request_timeout: Duration,
    /// Upper bound on the leverage requested from the exchange
    pub max_leverage: u32,
    pub periods: IndicatorPeriods,
    pub signal: SignalParameters,
    pub risk: RiskParameters,
    pub breaker: CircuitBreakerConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            symbol: "ETHUSDT".to_string(),
            network: Network::Testnet,
            dry_run: true,
            dry_run_equity: 10_000.0,
            candle_interval: "5".to_string(),
            candle_limit: 200,
            poll_interval: Duration::from_secs(15),
            pause_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            max_leverage: 5,
            periods: IndicatorPeriods::default(),
            signal: SignalParameters::default(),
            risk: RiskParameters::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Parse `name` from the environment, keeping `current` when it is unset,
/// unparsable or rejected by `accept`.
fn env_override<T, F>(name: &str, current: T, accept: F) -> T
where
    T: FromStr + std::fmt::Debug,
    T::Err: std::fmt::Display,
    F: Fn(&T) -> bool,
{
    let Ok(raw) = std::env::var(name) else {
        return current;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => value,
        Ok(value) => {
            tracing::warn!(
                "Invalid {} value: {:?}, using default: {:?}",
                name,
                value,
                current
            );
            current
        }
        Err(e) => {
            tracing::warn!(
                "Failed to parse {} '{}': {}, using default: {:?}",
                name,
                raw,
                e,
                current
            );
            current
        }
    }
}

fn env_flag(name: &str, current: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => value.trim().eq_ignore_ascii_case("true") || value.trim() == "1",
        Err(_) => current,
    }
}

fn fraction(v: &f64) -> bool {
    *v > 0.0 && *v < 1.0
}

fn positive(v: &f64) -> bool {
    *v > 0.0 && v.is_finite()
}

impl TradingConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> TradingConfig {
        let mut config = TradingConfig::default();

        if let Ok(symbol) = std::env::var("TRADING_SYMBOL") {
            if !symbol.trim().is_empty() {
                config.symbol = symbol.trim().to_uppercase();
            }
        }
        if let Ok(env) = std::env::var("BYBIT_ENV") {
            config.network = Network::from_env_value(&env);
        }
        config.dry_run = env_flag("DRY_RUN", config.dry_run);
        config.dry_run_equity = env_override("DRY_RUN_EQUITY", config.dry_run_equity, positive);

        if let Ok(interval) = std::env::var("CANDLE_INTERVAL") {
            if !interval.trim().is_empty() {
                config.candle_interval = interval.trim().to_string();
            }
        }
        config.candle_limit =
            env_override("CANDLE_LIMIT", config.candle_limit, |v| (1..=1000).contains(v));

        let poll = env_override("POLL_SECONDS", config.poll_interval.as_secs(), |v| *v > 0);
        config.poll_interval = Duration::from_secs(poll);
        let pause = env_override("PAUSE_SECONDS", config.pause_interval.as_secs(), |v| *v > 0);
        config.pause_interval = Duration::from_secs(pause);
        let timeout = env_override(
            "REQUEST_TIMEOUT_SECONDS",
            config.request_timeout.as_secs(),
            |v| (1..=120).contains(v),
        );
        config.request_timeout = Duration::from_secs(timeout);

        config.max_leverage =
            env_override("MAX_LEVERAGE", config.max_leverage, |v| (1..=100).contains(v));

        config.periods.sma_fast = env_override("SMA_FAST", config.periods.sma_fast, |v| *v > 0);
        config.periods.sma_slow = env_override("SMA_SLOW", config.periods.sma_slow, |v| *v > 0);
        config.periods.ema_trend =
            env_override("EMA_TREND", config.periods.ema_trend, |v| *v > 0);
        config.periods.rsi = env_override("RSI_LEN", config.periods.rsi, |v| *v > 0);
        config.periods.atr = env_override("ATR_LEN", config.periods.atr, |v| *v > 0);

        config.signal.rsi_long =
            env_override("RSI_LONG", config.signal.rsi_long, |v| (0.0..=100.0).contains(v));
        config.signal.rsi_short =
            env_override("RSI_SHORT", config.signal.rsi_short, |v| (0.0..=100.0).contains(v));

        config.risk.stop_atr_multiplier =
            env_override("ATR_SL_MULT", config.risk.stop_atr_multiplier, positive);
        config.risk.target_atr_multiplier =
            env_override("ATR_TP_MULT", config.risk.target_atr_multiplier, positive);
        config.risk.risk_fraction = env_override("RISK_PCT", config.risk.risk_fraction, fraction);
        config.risk.min_stop_fraction =
            env_override("MIN_STOP_PCT", config.risk.min_stop_fraction, fraction);
        config.risk.max_position_equity_fraction = env_override(
            "MAX_POS_EQUITY_FRAC",
            config.risk.max_position_equity_fraction,
            |v| *v > 0.0 && *v <= 1.0,
        );
        // The trailing stop keeps the entry stop distance
        config.signal.trail_atr_multiplier = config.risk.stop_atr_multiplier;

        config.breaker.daily_loss_limit =
            env_override("DAILY_LOSS_LIMIT", config.breaker.daily_loss_limit, fraction);
        config.breaker.global_drawdown_limit = env_override(
            "GLOBAL_DD_LIMIT",
            config.breaker.global_drawdown_limit,
            fraction,
        );

        config
    }

    /// Builder-style symbol override, used for the command line flag
    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = symbol.trim().to_uppercase();
        self
    }

    /// Reject combinations the trading loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::Invalid("symbol cannot be empty".to_string()));
        }
        if self.periods.sma_fast >= self.periods.sma_slow {
            return Err(ConfigError::Invalid(format!(
                "fast SMA period ({}) must be shorter than slow SMA period ({})",
                self.periods.sma_fast, self.periods.sma_slow
            )));
        }
        if self.signal.rsi_short > self.signal.rsi_long {
            return Err(ConfigError::Invalid(format!(
                "short RSI threshold ({}) above long RSI threshold ({})",
                self.signal.rsi_short, self.signal.rsi_long
            )));
        }
        if self.candle_limit < self.periods.warmup() {
            tracing::warn!(
                "Candle limit {} is below the {} bars needed for every indicator; entries will never trigger",
                self.candle_limit,
                self.periods.warmup()
            );
        }
        if self.breaker.daily_loss_limit > self.breaker.global_drawdown_limit {
            return Err(ConfigError::Invalid(format!(
                "daily loss limit ({}) exceeds global drawdown limit ({})",
                self.breaker.daily_loss_limit, self.breaker.global_drawdown_limit
            )));
        }
        Ok(())
    }
}
