use thiserror::Error;

/// Errors raised by the exchange boundary.
///
/// Every variant is recoverable from the trading loop's point of view: the
/// current cycle is abandoned and retried after the poll interval.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    /// The exchange answered with a non-success status
    #[error("Exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// The request never produced a usable response
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out")]
    Timeout,

    /// The response arrived but could not be interpreted
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// A signed endpoint was called without credentials
    #[error("Missing API credentials for {0}")]
    MissingCredentials(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SizingError {
    #[error("Equity must be positive, got {0}")]
    NonPositiveEquity(f64),

    #[error("Price must be positive, got {0}")]
    NonPositivePrice(f64),

    #[error("ATR must be finite and non-negative, got {0}")]
    InvalidAtr(f64),

    #[error("Stop distance collapsed to zero")]
    ZeroStopDistance,
}

/// Failure of a single trading cycle.
#[derive(Debug, Error)]
pub enum TradingError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),
}

impl TradingError {
    /// Whether the loop must stop instead of retrying next cycle.
    ///
    /// Missing credentials on a signed endpoint cannot heal between cycles.
    /// Everything else is transient. A risk-limit halt is reported as a cycle
    /// outcome, not an error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TradingError::Gateway(GatewayError::MissingCredentials(_))
        )
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Value must be finite")]
    MustBeFinite,
}
