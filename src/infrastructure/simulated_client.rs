//! Dry-run gateway
//!
//! Reads go to the live exchange so signals are computed on real data.
//! Writes are logged and answered with a fixed order id.

use crate::domain::entities::instrument::InstrumentSpec;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::PositionSide;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::exchange_gateway::{ExchangeGateway, GatewayResult, OrderRequest};
use crate::domain::services::indicators::Candle;
use crate::infrastructure::bybit_client::{BybitClient, CreateOrderPayload, SetLeveragePayload};
use async_trait::async_trait;
use tracing::info;

/// Order id returned for every simulated submission
pub const DRY_RUN_ORDER_ID: &str = "DRYRUN";

pub struct SimulatedClient {
    market: BybitClient,
    /// Equity reported when the live account cannot be queried
    paper_equity: f64,
}

impl SimulatedClient {
    pub fn new(market: BybitClient, paper_equity: f64) -> Self {
        Self {
            market,
            paper_equity,
        }
    }

    fn log_payload<T: serde::Serialize>(action: &str, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(body) => info!("[DRY RUN] {} {}", action, body),
            Err(e) => info!("[DRY RUN] {} (payload not serializable: {})", action, e),
        }
    }
}

#[async_trait]
impl ExchangeGateway for SimulatedClient {
    fn name(&self) -> &str {
        "Bybit (dry run)"
    }

    fn is_simulated(&self) -> bool {
        true
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> GatewayResult<Vec<Candle>> {
        self.market.get_candles(symbol, interval, limit).await
    }

    async fn get_instrument_spec(&self, symbol: &str) -> GatewayResult<InstrumentSpec> {
        self.market.get_instrument_spec(symbol).await
    }

    async fn get_equity(&self) -> GatewayResult<f64> {
        if self.market.has_credentials() {
            self.market.get_equity().await
        } else {
            Ok(self.paper_equity)
        }
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> GatewayResult<()> {
        Self::log_payload("set-leverage", &SetLeveragePayload::new(symbol, leverage));
        Ok(())
    }

    async fn place_order(&self, order: &OrderRequest) -> GatewayResult<String> {
        Self::log_payload("order", &CreateOrderPayload::entry(order));
        Ok(DRY_RUN_ORDER_ID.to_string())
    }

    async fn close_position(
        &self,
        symbol: &str,
        held: PositionSide,
        quantity: f64,
    ) -> GatewayResult<String> {
        let side = OrderSide::closing(held)
            .ok_or_else(|| GatewayError::Decode("cannot close a flat position".to_string()))?;
        Self::log_payload("close", &CreateOrderPayload::close(symbol, side, quantity));
        Ok(DRY_RUN_ORDER_ID.to_string())
    }
}
