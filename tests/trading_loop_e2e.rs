use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use trendguard::application::trading_loop::{CycleOutcome, LoopExit, TradingEngine};
use trendguard::config::TradingConfig;
use trendguard::domain::entities::instrument::InstrumentSpec;
use trendguard::domain::entities::order::OrderSide;
use trendguard::domain::entities::position::PositionSide;
use trendguard::domain::errors::{GatewayError, TradingError};
use trendguard::domain::repositories::exchange_gateway::{
    ExchangeGateway, GatewayResult, OrderRequest,
};
use trendguard::domain::services::indicators::{Candle, IndicatorPeriods};
use trendguard::domain::services::signal_engine::Decision;

#[derive(Default)]
struct MockState {
    candles: Vec<Candle>,
    equity: f64,
    fail_candles: bool,
    fail_leverage: bool,
    equity_error: Option<GatewayError>,
    candle_calls: usize,
    equity_calls: usize,
    leverage_requests: Vec<u32>,
    orders: Vec<OrderRequest>,
    closes: Vec<(PositionSide, f64)>,
}

struct MockGateway {
    instrument: InstrumentSpec,
    state: Mutex<MockState>,
}

impl MockGateway {
    fn new(equity: f64, candles: Vec<Candle>) -> Arc<Self> {
        Arc::new(Self {
            instrument: InstrumentSpec::new(0.001, 0.001, 0.01, 50.0).unwrap(),
            state: Mutex::new(MockState {
                candles,
                equity,
                ..MockState::default()
            }),
        })
    }

    fn set_equity(&self, equity: f64) {
        self.state.lock().unwrap().equity = equity;
    }

    fn set_candles(&self, candles: Vec<Candle>) {
        self.state.lock().unwrap().candles = candles;
    }
}

#[async_trait]
impl ExchangeGateway for MockGateway {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn get_candles(
        &self,
        _symbol: &str,
        _interval: &str,
        _limit: usize,
    ) -> GatewayResult<Vec<Candle>> {
        let mut state = self.state.lock().unwrap();
        state.candle_calls += 1;
        if state.fail_candles {
            return Err(GatewayError::Timeout);
        }
        Ok(state.candles.clone())
    }

    async fn get_instrument_spec(&self, _symbol: &str) -> GatewayResult<InstrumentSpec> {
        Ok(self.instrument)
    }

    async fn get_equity(&self) -> GatewayResult<f64> {
        let mut state = self.state.lock().unwrap();
        state.equity_calls += 1;
        match &state.equity_error {
            Some(e) => Err(e.clone()),
            None => Ok(state.equity),
        }
    }

    async fn set_leverage(&self, _symbol: &str, leverage: u32) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.leverage_requests.push(leverage);
        if state.fail_leverage {
            return Err(GatewayError::Api {
                code: 10001,
                message: "leverage invalid".to_string(),
            });
        }
        Ok(())
    }

    async fn place_order(&self, order: &OrderRequest) -> GatewayResult<String> {
        let mut state = self.state.lock().unwrap();
        state.orders.push(order.clone());
        Ok(format!("order-{}", state.orders.len()))
    }

    async fn close_position(
        &self,
        _symbol: &str,
        held: PositionSide,
        quantity: f64,
    ) -> GatewayResult<String> {
        let mut state = self.state.lock().unwrap();
        state.closes.push((held, quantity));
        Ok(format!("close-{}", state.closes.len()))
    }
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

/// Short periods so a handful of bars warms every indicator up
fn test_config() -> TradingConfig {
    let mut config = TradingConfig {
        poll_interval: Duration::from_millis(10),
        pause_interval: Duration::from_millis(10),
        ..TradingConfig::default()
    };
    config.periods = IndicatorPeriods {
        ema_trend: 5,
        sma_fast: 2,
        sma_slow: 4,
        rsi: 3,
        atr: 3,
    };
    config
}

/// Closes 90..=100 in steps of 1, each bar spanning close ± 1 (true range 2)
fn rising_candles() -> Vec<Candle> {
    (0..=10)
        .map(|i| {
            let close = 90.0 + i as f64;
            Candle::new(close - 1.0, close + 1.0, close - 1.0, close).unwrap()
        })
        .collect()
}

/// Closes 110 down to 100 in steps of 1, each bar spanning close ± 1
fn falling_candles() -> Vec<Candle> {
    (0..=10)
        .map(|i| {
            let close = 110.0 - i as f64;
            Candle::new(close + 1.0, close + 1.0, close - 1.0, close).unwrap()
        })
        .collect()
}

fn flat_candles(count: usize) -> Vec<Candle> {
    (0..count)
        .map(|_| Candle::new(100.0, 100.0, 100.0, 100.0).unwrap())
        .collect()
}

async fn engine_for(gateway: &Arc<MockGateway>, config: TradingConfig) -> TradingEngine {
    let gateway: Arc<dyn ExchangeGateway> = gateway.clone();
    TradingEngine::initialize_at(gateway, config, day(1))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_initialize_sets_baselines_and_leverage() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let engine = engine_for(&gateway, test_config()).await;

    assert_eq!(engine.equity_state().session_start_equity(), 10_000.0);
    assert_eq!(engine.equity_state().daily_baseline_equity(), 10_000.0);
    assert_eq!(engine.leverage(), 5);
    assert!(engine.position().is_flat());
    assert_eq!(gateway.state.lock().unwrap().leverage_requests, vec![5]);
}

#[tokio::test]
async fn test_leverage_failure_is_only_a_warning() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    gateway.state.lock().unwrap().fail_leverage = true;
    let gateway_dyn: Arc<dyn ExchangeGateway> = gateway.clone();

    let result = TradingEngine::initialize_at(gateway_dyn, test_config(), day(1)).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_flat_history_holds() {
    let gateway = MockGateway::new(10_000.0, flat_candles(60));
    let mut engine = engine_for(&gateway, TradingConfig::default()).await;

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::Hold));
    assert!(engine.position().is_flat());
    assert!(gateway.state.lock().unwrap().orders.is_empty());
}

#[tokio::test]
async fn test_bullish_history_opens_sized_long() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::OpenLong));

    let state = gateway.state.lock().unwrap();
    assert_eq!(state.orders.len(), 1);
    let order = &state.orders[0];
    assert_eq!(order.side, OrderSide::Buy);
    assert!((order.quantity - 10.0).abs() < 1e-9);
    assert!((order.stop_loss.unwrap() - 97.0).abs() < 1e-9);
    assert!((order.take_profit.unwrap() - 104.0).abs() < 1e-9);

    let position = engine.position();
    assert_eq!(position.side(), PositionSide::Long);
    assert_eq!(position.entry_price(), 100.0);
    assert!((position.stop_loss() - 97.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_entry_without_atr_holds() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut config = test_config();
    config.periods.atr = 20;
    let mut engine = engine_for(&gateway, config).await;

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::OpenLong));
    assert!(engine.position().is_flat());
    assert!(gateway.state.lock().unwrap().orders.is_empty());
}

#[tokio::test]
async fn test_stop_breach_triggers_emergency_close() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut config = test_config();
    // Short entries never fire, so only the stop can close the long
    config.signal.rsi_short = 0.0;
    let mut engine = engine_for(&gateway, config).await;

    engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(engine.position().side(), PositionSide::Long);

    let mut candles = rising_candles();
    candles.push(Candle::new(100.0, 100.5, 96.0, 96.5).unwrap());
    gateway.set_candles(candles);

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::Manage));
    assert!(engine.position().is_flat());

    let state = gateway.state.lock().unwrap();
    assert_eq!(state.closes.len(), 1);
    assert_eq!(state.closes[0].0, PositionSide::Long);
    assert!((state.closes[0].1 - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_trailing_stop_follows_price() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;
    engine.run_cycle_at(day(1)).await.unwrap();

    let mut candles = rising_candles();
    for close in [101.0, 102.0, 103.0] {
        candles.push(Candle::new(close - 1.0, close + 1.0, close - 1.0, close).unwrap());
    }
    gateway.set_candles(candles);

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::Manage));
    // close 103, ATR 2, trail 1.5 ATR
    assert!((engine.position().stop_loss() - 100.0).abs() < 1e-9);
    assert!(gateway.state.lock().unwrap().closes.is_empty());
}

#[tokio::test]
async fn test_daily_loss_pauses_without_trading() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;

    gateway.set_equity(9_750.0);
    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Paused);
    {
        let state = gateway.state.lock().unwrap();
        assert_eq!(state.candle_calls, 0);
        assert!(state.orders.is_empty());
    }

    // Polling continues and trading resumes once equity recovers
    gateway.set_equity(9_900.0);
    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::OpenLong));
}

#[tokio::test]
async fn test_global_drawdown_halts() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;

    gateway.set_equity(9_400.0);
    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    // Also beyond the daily limit; halt takes precedence
    assert_eq!(outcome, CycleOutcome::Halted);
    assert!(gateway.state.lock().unwrap().orders.is_empty());
}

#[tokio::test]
async fn test_run_stops_on_halt() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;
    gateway.set_equity(9_400.0);

    let (_tx, rx) = watch::channel(false);
    let exit = tokio::time::timeout(Duration::from_secs(5), engine.run(rx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit, LoopExit::Halted);
}

#[tokio::test]
async fn test_daily_baseline_rolls_over() {
    let gateway = MockGateway::new(10_000.0, flat_candles(60));
    let mut engine = engine_for(&gateway, TradingConfig::default()).await;

    gateway.set_equity(9_900.0);
    engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(engine.equity_state().daily_baseline_equity(), 10_000.0);

    engine.run_cycle_at(day(2)).await.unwrap();
    assert_eq!(engine.equity_state().daily_baseline_equity(), 9_900.0);
    assert_eq!(engine.equity_state().session_start_equity(), 10_000.0);

    // 2.5% from session start but only 1.5% from today's baseline
    gateway.set_equity(9_750.0);
    let outcome = engine.run_cycle_at(day(2)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::Hold));
}

#[tokio::test]
async fn test_gateway_error_is_recoverable() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    gateway.state.lock().unwrap().fail_candles = true;
    let mut engine = engine_for(&gateway, test_config()).await;

    let err = engine.run_cycle_at(day(1)).await.unwrap_err();
    assert!(matches!(err, TradingError::Gateway(GatewayError::Timeout)));
    assert!(!err.is_fatal());

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let exit = engine.run(rx).await;
        (exit, engine)
    });
    tokio::time::sleep(Duration::from_millis(60)).await;
    tx.send(true).unwrap();

    let (exit, _engine) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit.unwrap(), LoopExit::Shutdown);
    assert!(gateway.state.lock().unwrap().candle_calls >= 3);
}

#[tokio::test]
async fn test_shutdown_before_first_cycle() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;
    let equity_calls_after_init = gateway.state.lock().unwrap().equity_calls;

    let (_tx, rx) = watch::channel(true);
    let exit = engine.run(rx).await.unwrap();
    assert_eq!(exit, LoopExit::Shutdown);
    assert_eq!(
        gateway.state.lock().unwrap().equity_calls,
        equity_calls_after_init
    );
}

#[tokio::test]
async fn test_shutdown_leaves_position_open() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut config = test_config();
    config.poll_interval = Duration::from_secs(60);
    let mut engine = engine_for(&gateway, config).await;

    let (tx, rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let exit = engine.run(rx).await;
        (exit, engine)
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(true).unwrap();

    let (exit, engine) = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(exit.unwrap(), LoopExit::Shutdown);
    assert_eq!(engine.position().side(), PositionSide::Long);
    assert!(gateway.state.lock().unwrap().closes.is_empty());
}

#[tokio::test]
async fn test_bearish_history_opens_short_and_bullish_turn_closes_it() {
    let gateway = MockGateway::new(10_000.0, falling_candles());
    let mut engine = engine_for(&gateway, test_config()).await;

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::OpenShort));
    {
        let state = gateway.state.lock().unwrap();
        assert_eq!(state.orders.len(), 1);
        assert_eq!(state.orders[0].side, OrderSide::Sell);
        assert!((state.orders[0].stop_loss.unwrap() - 103.0).abs() < 1e-9);
        assert!((state.orders[0].take_profit.unwrap() - 96.0).abs() < 1e-9);
    }
    assert_eq!(engine.position().side(), PositionSide::Short);
    assert!((engine.position().quantity() - 10.0).abs() < 1e-9);

    // Long entry conditions hold at close 100, below the 103 stop
    gateway.set_candles(rising_candles());
    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::CloseShort));
    assert!(engine.position().is_flat());

    let state = gateway.state.lock().unwrap();
    assert_eq!(state.closes.len(), 1);
    assert_eq!(state.closes[0].0, PositionSide::Short);
    assert!((state.closes[0].1 - 10.0).abs() < 1e-9);
    assert_eq!(state.orders.len(), 1);
}

#[tokio::test]
async fn test_bearish_turn_closes_long_above_stop() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;

    engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(engine.position().side(), PositionSide::Long);

    // Two lower closes: fast SMA below slow, close under the EMA, RSI 33
    let mut candles = rising_candles();
    for close in [99.0, 98.0] {
        candles.push(Candle::new(close + 1.0, close + 1.0, close - 1.0, close).unwrap());
    }
    gateway.set_candles(candles);

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::CloseLong));
    assert!(engine.position().is_flat());

    let state = gateway.state.lock().unwrap();
    assert_eq!(state.closes.len(), 1);
    assert_eq!(state.closes[0].0, PositionSide::Long);
    assert!((state.closes[0].1 - 10.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_entry_with_sub_tick_bracket_holds() {
    // ATR of 0.0005 puts the target inside one 0.01 tick of the entry
    let candles = (0..=10)
        .map(|i| {
            let close = 100.0 + i as f64 * 0.0005;
            Candle::new(close, close, close, close).unwrap()
        })
        .collect();
    let gateway = MockGateway::new(10_000.0, candles);
    let mut engine = engine_for(&gateway, test_config()).await;

    let outcome = engine.run_cycle_at(day(1)).await.unwrap();
    assert_eq!(outcome, CycleOutcome::Traded(Decision::OpenLong));
    assert!(engine.position().is_flat());
    assert!(gateway.state.lock().unwrap().orders.is_empty());
}

#[tokio::test]
async fn test_missing_credentials_stops_the_loop() {
    let gateway = MockGateway::new(10_000.0, rising_candles());
    let mut engine = engine_for(&gateway, test_config()).await;
    gateway.state.lock().unwrap().equity_error = Some(GatewayError::MissingCredentials(
        "/v5/account/wallet-balance".to_string(),
    ));

    let (_tx, rx) = watch::channel(false);
    let result = tokio::time::timeout(Duration::from_secs(5), engine.run(rx))
        .await
        .unwrap();
    let err = result.unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(gateway.state.lock().unwrap().equity_calls, 2);
}
