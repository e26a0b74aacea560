//! Exchange Gateway Trait
//!
//! The trading loop talks to the exchange only through `ExchangeGateway`.
//! The live REST client and the dry-run client both implement it, and one of
//! them is chosen once at startup.

use crate::domain::entities::instrument::InstrumentSpec;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::PositionSide;
use crate::domain::errors::GatewayError;
use crate::domain::services::indicators::Candle;
use async_trait::async_trait;

/// Common result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Entry order with optional exchange-side protection
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Name used in log lines
    fn name(&self) -> &str;

    /// Whether orders are only logged instead of transmitted
    fn is_simulated(&self) -> bool {
        false
    }

    /// Candles in ascending time order, at most `limit` of them
    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> GatewayResult<Vec<Candle>>;

    async fn get_instrument_spec(&self, symbol: &str) -> GatewayResult<InstrumentSpec>;

    /// Total account equity in quote currency
    async fn get_equity(&self) -> GatewayResult<f64>;

    /// Best-effort; callers treat a failure as a warning
    async fn set_leverage(&self, symbol: &str, leverage: u32) -> GatewayResult<()>;

    /// Submit a market entry order. Returns the exchange order id.
    async fn place_order(&self, order: &OrderRequest) -> GatewayResult<String>;

    /// Reduce-only market order flattening `held` for `quantity`.
    async fn close_position(
        &self,
        symbol: &str,
        held: PositionSide,
        quantity: f64,
    ) -> GatewayResult<String>;
}
