use crate::config::Network;
use crate::domain::entities::instrument::InstrumentSpec;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::PositionSide;
use crate::domain::errors::GatewayError;
use crate::domain::repositories::exchange_gateway::{ExchangeGateway, GatewayResult, OrderRequest};
use crate::domain::services::indicators::Candle;
use crate::secrets::ApiCredentials;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Bybit v5 API endpoints
const BYBIT_API_BASE: &str = "https://api.bybit.com";
const BYBIT_TESTNET_BASE: &str = "https://api-testnet.bybit.com";

/// Derivatives category traded by the bot
const CATEGORY: &str = "linear";
const RECV_WINDOW: &str = "5000";
/// Returned by set-leverage when the requested value is already active
const LEVERAGE_NOT_MODIFIED: i64 = 110043;
const DEFAULT_MAX_LEVERAGE: f64 = 10.0;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub api_base: String,
    pub timeout: Duration,
}

impl BybitConfig {
    pub fn new(network: Network, timeout: Duration) -> Self {
        Self {
            api_base: match network {
                Network::Mainnet => BYBIT_API_BASE.to_string(),
                Network::Testnet => BYBIT_TESTNET_BASE.to_string(),
            },
            timeout,
        }
    }
}

/// Common response wrapper of every v5 endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    ret_code: i64,
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct InstrumentsResult {
    list: Vec<InstrumentInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentInfo {
    lot_size_filter: LotSizeFilter,
    price_filter: PriceFilter,
    leverage_filter: Option<LeverageFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LotSizeFilter {
    qty_step: String,
    min_order_qty: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceFilter {
    tick_size: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverageFilter {
    max_leverage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WalletResult {
    list: Vec<WalletAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WalletAccount {
    total_equity: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_id: String,
}

/// Body of `POST /v5/order/create`
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderPayload {
    pub category: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub qty: String,
    pub time_in_force: String,
    pub reduce_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tpsl_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
}

impl CreateOrderPayload {
    /// Market entry, with a full-position bracket when levels are given
    pub fn entry(order: &OrderRequest) -> Self {
        let has_bracket = order.take_profit.is_some() || order.stop_loss.is_some();
        Self {
            category: CATEGORY.to_string(),
            symbol: order.symbol.clone(),
            side: order.side.as_str().to_string(),
            order_type: "Market".to_string(),
            qty: order.quantity.to_string(),
            time_in_force: "IOC".to_string(),
            reduce_only: false,
            tpsl_mode: has_bracket.then(|| "Full".to_string()),
            take_profit: order.take_profit.map(|p| p.to_string()),
            stop_loss: order.stop_loss.map(|p| p.to_string()),
        }
    }

    /// Reduce-only market order in the direction that flattens `side`
    pub fn close(symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Self {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
            side: side.as_str().to_string(),
            order_type: "Market".to_string(),
            qty: quantity.to_string(),
            time_in_force: "IOC".to_string(),
            reduce_only: true,
            tpsl_mode: None,
            take_profit: None,
            stop_loss: None,
        }
    }
}

/// Body of `POST /v5/position/set-leverage`
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SetLeveragePayload {
    pub category: String,
    pub symbol: String,
    pub buy_leverage: String,
    pub sell_leverage: String,
}

impl SetLeveragePayload {
    pub fn new(symbol: &str, leverage: u32) -> Self {
        Self {
            category: CATEGORY.to_string(),
            symbol: symbol.to_string(),
            buy_leverage: leverage.to_string(),
            sell_leverage: leverage.to_string(),
        }
    }
}

/// Hex HMAC-SHA256 over `timestamp + api_key + recv_window + payload`
pub fn sign_request(
    api_secret: &str,
    api_key: &str,
    timestamp: u64,
    payload: &str,
) -> Result<String, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(api_secret.as_bytes())
        .map_err(|e| GatewayError::Transport(format!("HMAC error: {}", e)))?;
    mac.update(format!("{}{}{}{}", timestamp, api_key, RECV_WINDOW, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn query_string(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

fn timestamp_ms() -> Result<u64, GatewayError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .map_err(|e| GatewayError::Transport(format!("Time error: {}", e)))
}

fn parse_number(field: &str, raw: &str) -> Result<f64, GatewayError> {
    raw.parse::<f64>()
        .map_err(|e| GatewayError::Decode(format!("{} '{}': {}", field, raw, e)))
}

/// Unwrap the v5 envelope, turning a non-zero `retCode` into an API error
fn into_result<T>(envelope: Envelope<T>) -> GatewayResult<T> {
    if envelope.ret_code != 0 {
        return Err(GatewayError::Api {
            code: envelope.ret_code,
            message: envelope.ret_msg,
        });
    }
    envelope
        .result
        .ok_or_else(|| GatewayError::Decode("response has no result".to_string()))
}

/// Kline rows arrive newest first as `[start, open, high, low, close, ...]`
fn parse_klines(rows: Vec<Vec<String>>) -> GatewayResult<Vec<Candle>> {
    let mut keyed = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 5 {
            return Err(GatewayError::Decode(format!(
                "kline row has {} fields, expected at least 5",
                row.len()
            )));
        }
        let start = row[0]
            .parse::<i64>()
            .map_err(|e| GatewayError::Decode(format!("kline start '{}': {}", row[0], e)))?;
        let candle = Candle::new(
            parse_number("open", &row[1])?,
            parse_number("high", &row[2])?,
            parse_number("low", &row[3])?,
            parse_number("close", &row[4])?,
        )
        .map_err(|e| GatewayError::Decode(e.to_string()))?;
        keyed.push((start, candle));
    }
    keyed.sort_by_key(|(start, _)| *start);
    Ok(keyed.into_iter().map(|(_, candle)| candle).collect())
}

fn parse_instrument(result: InstrumentsResult, symbol: &str) -> GatewayResult<InstrumentSpec> {
    let info = result
        .list
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::Decode(format!("no instrument info for {}", symbol)))?;

    let max_leverage = match info.leverage_filter.and_then(|f| f.max_leverage) {
        Some(raw) => parse_number("maxLeverage", &raw)?,
        None => DEFAULT_MAX_LEVERAGE,
    };

    InstrumentSpec::new(
        parse_number("qtyStep", &info.lot_size_filter.qty_step)?,
        parse_number("minOrderQty", &info.lot_size_filter.min_order_qty)?,
        parse_number("tickSize", &info.price_filter.tick_size)?,
        max_leverage,
    )
    .map_err(|e| GatewayError::Decode(e.to_string()))
}

fn parse_equity(result: WalletResult) -> GatewayResult<f64> {
    match result.list.first() {
        Some(account) => parse_number("totalEquity", &account.total_equity),
        None => Ok(0.0),
    }
}

/// Bybit v5 REST client
pub struct BybitClient {
    client: Client,
    config: BybitConfig,
    credentials: Option<ApiCredentials>,
}

impl BybitClient {
    /// Create a client. Without credentials only public endpoints work.
    pub fn new(config: BybitConfig, credentials: Option<ApiCredentials>) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("trendguard/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self, path: &str) -> GatewayResult<&ApiCredentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| GatewayError::MissingCredentials(path.to_string()))
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> GatewayResult<T> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                code: status.as_u16() as i64,
                message: error_text,
            });
        }
        let envelope: Envelope<T> = response.json().await?;
        into_result(envelope)
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<T> {
        let url = format!("{}{}?{}", self.config.api_base, path, query_string(params));
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await?;
        Self::decode(response).await
    }

    async fn private_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> GatewayResult<T> {
        let creds = self.credentials(path)?;
        let query = query_string(params);
        let timestamp = timestamp_ms()?;
        let signature = sign_request(creds.api_secret(), creds.api_key(), timestamp, &query)?;

        let url = format!("{}{}?{}", self.config.api_base, path, query);
        debug!("GET {} (signed)", path);
        let response = self
            .client
            .get(&url)
            .header("X-BAPI-API-KEY", creds.api_key())
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", signature)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn private_post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GatewayResult<T> {
        let creds = self.credentials(path)?;
        let body = serde_json::to_string(body)
            .map_err(|e| GatewayError::Decode(format!("Failed to serialize request: {}", e)))?;
        let timestamp = timestamp_ms()?;
        let signature = sign_request(creds.api_secret(), creds.api_key(), timestamp, &body)?;

        debug!("POST {} {}", path, body);
        let response = self
            .client
            .post(format!("{}{}", self.config.api_base, path))
            .header("Content-Type", "application/json")
            .header("X-BAPI-API-KEY", creds.api_key())
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-RECV-WINDOW", RECV_WINDOW)
            .header("X-BAPI-SIGN", signature)
            .body(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn create_order(&self, payload: &CreateOrderPayload) -> GatewayResult<String> {
        let result: OrderResult = self.private_post("/v5/order/create", payload).await?;
        info!("Order placed successfully: {}", result.order_id);
        Ok(result.order_id)
    }
}

#[async_trait]
impl ExchangeGateway for BybitClient {
    fn name(&self) -> &str {
        "Bybit"
    }

    async fn get_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> GatewayResult<Vec<Candle>> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ];
        let result: KlineResult = self.public_get("/v5/market/kline", &params).await?;
        parse_klines(result.list)
    }

    async fn get_instrument_spec(&self, symbol: &str) -> GatewayResult<InstrumentSpec> {
        let params = [
            ("category", CATEGORY.to_string()),
            ("symbol", symbol.to_string()),
        ];
        let result: InstrumentsResult = self
            .public_get("/v5/market/instruments-info", &params)
            .await?;
        parse_instrument(result, symbol)
    }

    async fn get_equity(&self) -> GatewayResult<f64> {
        let params = [("accountType", "UNIFIED".to_string())];
        let result: WalletResult = self
            .private_get("/v5/account/wallet-balance", &params)
            .await?;
        parse_equity(result)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> GatewayResult<()> {
        let payload = SetLeveragePayload::new(symbol, leverage);
        match self
            .private_post::<_, serde_json::Value>("/v5/position/set-leverage", &payload)
            .await
        {
            Ok(_) => Ok(()),
            Err(GatewayError::Api { code, .. }) if code == LEVERAGE_NOT_MODIFIED => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn place_order(&self, order: &OrderRequest) -> GatewayResult<String> {
        self.create_order(&CreateOrderPayload::entry(order)).await
    }

    async fn close_position(
        &self,
        symbol: &str,
        held: PositionSide,
        quantity: f64,
    ) -> GatewayResult<String> {
        let side = OrderSide::closing(held)
            .ok_or_else(|| GatewayError::Decode("cannot close a flat position".to_string()))?;
        self.create_order(&CreateOrderPayload::close(symbol, side, quantity))
            .await
    }
}
