//! Trading loop
//!
//! One sequential task: poll equity and candles, decide, act, sleep. The
//! engine owns the position and the equity baselines, so nothing here needs
//! locking.

use crate::config::TradingConfig;
use crate::domain::entities::instrument::InstrumentSpec;
use crate::domain::entities::order::OrderSide;
use crate::domain::entities::position::{Position, PositionSide};
use crate::domain::errors::TradingError;
use crate::domain::repositories::exchange_gateway::{ExchangeGateway, OrderRequest};
use crate::domain::services::circuit_breaker::{BreakerStatus, CircuitBreaker, EquityState};
use crate::domain::services::indicators::{IndicatorPipeline, IndicatorSnapshot};
use crate::domain::services::position_sizer::PositionSizer;
use crate::domain::services::signal_engine::{Decision, SignalEngine};
use crate::domain::value_objects::position_sizing::PositionSizingRequest;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Result of a single cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Signals were evaluated and acted upon
    Traded(Decision),
    /// Daily loss limit reached, trading skipped
    Paused,
    /// Global drawdown limit reached, the loop must stop
    Halted,
}

/// Why `TradingEngine::run` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Shutdown,
    Halted,
}

pub struct TradingEngine {
    gateway: Arc<dyn ExchangeGateway>,
    config: TradingConfig,
    pipeline: IndicatorPipeline,
    signals: SignalEngine,
    sizer: PositionSizer,
    breaker: CircuitBreaker,
    instrument: InstrumentSpec,
    leverage: u32,
    equity: EquityState,
    position: Position,
}

fn fmt_opt(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "n/a".to_string())
}

impl TradingEngine {
    /// Fetch the instrument, take the equity baselines and configure leverage.
    pub async fn initialize(
        gateway: Arc<dyn ExchangeGateway>,
        config: TradingConfig,
    ) -> Result<Self, TradingError> {
        Self::initialize_at(gateway, config, Utc::now().date_naive()).await
    }

    /// `initialize` with an explicit UTC date for the daily baseline
    pub async fn initialize_at(
        gateway: Arc<dyn ExchangeGateway>,
        config: TradingConfig,
        today: NaiveDate,
    ) -> Result<Self, TradingError> {
        let instrument = gateway.get_instrument_spec(&config.symbol).await?;
        let equity = gateway.get_equity().await?;
        let leverage = instrument.effective_leverage(config.max_leverage);

        if let Err(e) = gateway.set_leverage(&config.symbol, leverage).await {
            warn!(
                "Could not set leverage {}x on {}: {}",
                leverage, config.symbol, e
            );
        }

        info!(
            "Environment: {} | Mode: {} | Gateway: {}",
            config.network,
            if gateway.is_simulated() { "DRY RUN" } else { "LIVE" },
            gateway.name()
        );
        info!(
            "Symbol: {} | Leverage: {}x | Qty step: {} | Min qty: {} | Tick: {}",
            config.symbol,
            leverage,
            instrument.quantity_step,
            instrument.min_quantity,
            instrument.price_tick
        );
        info!("Starting equity: {:.2}", equity);

        Ok(Self {
            pipeline: IndicatorPipeline::new(config.periods),
            signals: SignalEngine::new(config.signal),
            sizer: PositionSizer::new(config.risk),
            breaker: CircuitBreaker::new(config.breaker),
            gateway,
            config,
            instrument,
            leverage,
            equity: EquityState::new(equity, today),
            position: Position::flat(),
        })
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn equity_state(&self) -> &EquityState {
        &self.equity
    }

    pub fn instrument(&self) -> &InstrumentSpec {
        &self.instrument
    }

    pub fn leverage(&self) -> u32 {
        self.leverage
    }

    pub async fn run_cycle(&mut self) -> Result<CycleOutcome, TradingError> {
        self.run_cycle_at(Utc::now().date_naive()).await
    }

    /// One poll, decide, act pass for the given UTC date
    pub async fn run_cycle_at(&mut self, today: NaiveDate) -> Result<CycleOutcome, TradingError> {
        let equity = self.gateway.get_equity().await?;

        if self.equity.roll_daily(today, equity) {
            info!("New trading day {}, daily baseline reset to {:.2}", today, equity);
        }

        match self.breaker.evaluate(&self.equity, equity) {
            BreakerStatus::Halt { change } => {
                error!(
                    "Global drawdown limit hit: equity {:.2} is {:.2}% from session start {:.2}. Halting.",
                    equity,
                    change * 100.0,
                    self.equity.session_start_equity()
                );
                return Ok(CycleOutcome::Halted);
            }
            BreakerStatus::Pause { change } => {
                warn!(
                    "Daily loss limit hit: equity {:.2} is {:.2}% from daily baseline {:.2}. Pausing.",
                    equity,
                    change * 100.0,
                    self.equity.daily_baseline_equity()
                );
                return Ok(CycleOutcome::Paused);
            }
            BreakerStatus::Clear => {}
        }

        let candles = self
            .gateway
            .get_candles(
                &self.config.symbol,
                &self.config.candle_interval,
                self.config.candle_limit,
            )
            .await?;
        let snapshot = self.pipeline.snapshot(&candles).ok_or_else(|| {
            TradingError::InvalidMarketData(format!("no candles for {}", self.config.symbol))
        })?;

        let evaluation = self.signals.evaluate(&snapshot, &self.position);
        if let Some(candidate) = evaluation.trailing_stop {
            if self.position.trail_stop(candidate) {
                debug!("Trailing stop moved to {:.4}", self.position.stop_loss());
            }
        }

        info!(
            "{} price={:.2} ema{}={} sma{}={} sma{}={} rsi={} atr={} pos={} decision={}",
            self.config.symbol,
            snapshot.close,
            self.pipeline.periods().ema_trend,
            fmt_opt(snapshot.ema_trend),
            self.pipeline.periods().sma_fast,
            fmt_opt(snapshot.sma_fast),
            self.pipeline.periods().sma_slow,
            fmt_opt(snapshot.sma_slow),
            fmt_opt(snapshot.rsi),
            fmt_opt(snapshot.atr),
            self.position.side(),
            evaluation.decision
        );

        match evaluation.decision {
            Decision::OpenLong => self.open(PositionSide::Long, &snapshot, equity).await?,
            Decision::OpenShort => self.open(PositionSide::Short, &snapshot, equity).await?,
            Decision::CloseLong | Decision::CloseShort => {
                self.close("signal", snapshot.close).await?
            }
            Decision::Hold | Decision::Manage => {}
        }

        if !self.position.is_flat() && self.position.is_stop_breached(snapshot.close) {
            warn!(
                "Stop breached: price {:.2} crossed stop {:.4}",
                snapshot.close,
                self.position.stop_loss()
            );
            self.close("stop", snapshot.close).await?;
        }

        Ok(CycleOutcome::Traded(evaluation.decision))
    }

    async fn open(
        &mut self,
        side: PositionSide,
        snapshot: &IndicatorSnapshot,
        equity: f64,
    ) -> Result<(), TradingError> {
        let Some(atr) = snapshot.atr else {
            info!("Entry signal for {} without ATR, holding", side);
            return Ok(());
        };
        let Some(order_side) = OrderSide::opening(side) else {
            return Ok(());
        };
        let Some(bracket) =
            self.sizer
                .bracket_prices(side, snapshot.close, atr, self.instrument.price_tick)
        else {
            info!(
                "No valid {} bracket at price {:.2} with ATR {:.4}, holding",
                side, snapshot.close, atr
            );
            return Ok(());
        };

        let request = PositionSizingRequest::new(
            equity,
            snapshot.close,
            atr,
            self.leverage as f64,
            self.instrument,
        )?;
        let sizing = self.sizer.size_position(&request)?;
        if sizing.capped_by_notional {
            debug!(
                "Quantity capped by notional limit at {:.2}",
                sizing.notional_value(snapshot.close)
            );
        }

        let order = OrderRequest {
            symbol: self.config.symbol.clone(),
            side: order_side,
            quantity: sizing.quantity,
            take_profit: Some(bracket.take_profit),
            stop_loss: Some(bracket.stop_loss),
        };
        let order_id = self.gateway.place_order(&order).await?;

        self.position = Position::open(side, snapshot.close, sizing.quantity, bracket);
        info!(
            "OPEN {} {} qty={} entry={:.2} sl={} tp={} risk={:.2} order={}",
            side,
            self.config.symbol,
            sizing.quantity,
            snapshot.close,
            bracket.stop_loss,
            bracket.take_profit,
            sizing.risk_amount,
            order_id
        );
        Ok(())
    }

    async fn close(&mut self, reason: &str, price: f64) -> Result<(), TradingError> {
        let held = self.position.side();
        if held == PositionSide::Flat {
            return Ok(());
        }
        let quantity = self.position.quantity();
        let order_id = self
            .gateway
            .close_position(&self.config.symbol, held, quantity)
            .await?;

        info!(
            "CLOSE {} {} qty={} price={:.2} pnl={:.2} reason={} order={}",
            held,
            self.config.symbol,
            quantity,
            price,
            self.position.unrealized_pnl(price),
            reason,
            order_id
        );
        self.position.clear();
        Ok(())
    }

    /// Run cycles until shutdown is signalled or a halt is reached.
    ///
    /// An open position is left in place on shutdown; its exchange-side
    /// bracket keeps protecting it.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<LoopExit, TradingError> {
        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, leaving trading loop");
                return Ok(LoopExit::Shutdown);
            }

            let wait = match self.run_cycle().await {
                Ok(CycleOutcome::Halted) => return Ok(LoopExit::Halted),
                Ok(CycleOutcome::Paused) => self.config.pause_interval,
                Ok(CycleOutcome::Traded(_)) => self.config.poll_interval,
                Err(e) if e.is_fatal() => {
                    error!("Fatal trading error: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("Cycle failed, retrying: {}", e);
                    self.config.poll_interval
                }
            };

            if sleep_or_shutdown(wait, &mut shutdown).await {
                info!("Shutdown requested, leaving trading loop");
                return Ok(LoopExit::Shutdown);
            }
        }
    }
}

/// Sleep for `wait`, returning early with `true` once shutdown is signalled
/// or the sender is gone.
async fn sleep_or_shutdown(wait: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(wait) => *shutdown.borrow(),
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
