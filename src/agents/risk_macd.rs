//! Risk-managed momentum crossover agent
//!
//! ## Entry Logic
//! 1. Push the mid-price return into a fast and a slow window
//! 2. Signal = fast mean - slow mean
//! 3. On a sign change against the previous signal: buy if positive, sell if negative
//!
//! ## Exit Logic
//! Static stop-loss / take-profit on the most recently opened order, sized
//! from the spread at the moment the order opened.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Agent;
use crate::config::{AgentConfig, AgentSettings, ConfigError};
use crate::gateway::OrderGateway;
use crate::position::{ExitDecision, PositionManager, PositionRisk};
use crate::signal::SignalGenerator;
use crate::{Order, OrderId, Side, Tick};

pub const NAME: &str = "simple_risk_macd";

pub(super) fn create(settings: &AgentSettings) -> Result<Box<dyn Agent>, ConfigError> {
    Ok(Box::new(RiskMacdAgent::new(settings.to_agent_config()?)))
}

/// Where the agent is in its tick lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPhase {
    /// No tick seen yet
    Uninitialized,
    /// First tick recorded, no decision made
    Warming,
    /// Every tick evaluates signal and risk
    Active,
}

/// Prices carried from one tick to the next
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub last_mid: Option<f64>,
    pub last_spread: Option<f64>,
}

/// Side the strategy currently wants to hold, tracked whether or not real
/// orders are sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperSignal {
    pub is_open: bool,
    pub side: Option<Side>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl PaperSignal {
    pub fn open(&mut self, side: Side, time: Option<DateTime<Utc>>) {
        self.is_open = true;
        self.side = Some(side);
        self.opened_at = time;
    }

    pub fn close(&mut self) {
        *self = PaperSignal::default();
    }
}

pub struct RiskMacdAgent {
    config: AgentConfig,
    phase: AgentPhase,
    state: AgentState,
    signals: SignalGenerator,
    positions: PositionManager,
    paper: PaperSignal,
}

impl RiskMacdAgent {
    pub fn new(config: AgentConfig) -> Self {
        RiskMacdAgent {
            signals: SignalGenerator::new(config.fast_length(), config.slow_length()),
            positions: PositionManager::new(config.stop_loss_scaling(), config.take_profit_scaling()),
            config,
            phase: AgentPhase::Uninitialized,
            state: AgentState::default(),
            paper: PaperSignal::default(),
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn phase(&self) -> AgentPhase {
        self.phase
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Signal value remembered for the next crossover comparison
    pub fn last_signal(&self) -> f64 {
        self.signals.previous_signal()
    }

    pub fn last_order_id(&self) -> Option<OrderId> {
        self.positions.tracked_order()
    }

    pub fn risk(&self) -> Option<PositionRisk> {
        self.positions.risk()
    }

    pub fn paper_signal(&self) -> PaperSignal {
        self.paper
    }

    fn order(&mut self, signal: f64, tick: &Tick, gateway: &mut dyn OrderGateway) {
        if signal > 0.0 {
            self.open(Side::Buy, tick, gateway);
        } else if signal < 0.0 {
            self.open(Side::Sell, tick, gateway);
        }
    }

    fn open(&mut self, side: Side, tick: &Tick, gateway: &mut dyn OrderGateway) {
        if !self.config.dry_run() {
            gateway.place_order(side);
        }
        self.paper.open(side, tick.time);
    }

    fn close(&mut self, gateway: &mut dyn OrderGateway) {
        if !self.config.dry_run() {
            gateway.close_position();
        }
        self.paper.close();
    }

    fn check_take_profit_stop_loss(&mut self, tick: &Tick, gateway: &mut dyn OrderGateway) {
        let Some((order, decision)) = self.positions.check(&*gateway, tick.bid, tick.ask) else {
            return;
        };
        let Some(risk) = self.positions.risk() else {
            return;
        };

        if self.config.verbose() {
            debug!(id = order.id, gross_profit = format!("{:.5}", decision.diff()), "Gross profit");
        }

        match decision {
            ExitDecision::TakeProfit { diff } => {
                if self.config.verbose() {
                    info!("Take profit: {:.5} > {:.5}", diff, risk.take_profit);
                }
                self.close(gateway);
            }
            ExitDecision::StopLoss { diff } => {
                if self.config.verbose() {
                    info!("Stop loss: {:.5} < {:.5}", diff, risk.stop_loss);
                }
                self.close(gateway);
            }
            ExitDecision::Hold { .. } => {}
        }
    }
}

impl Agent for RiskMacdAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_tick(&mut self, tick: &Tick, gateway: &mut dyn OrderGateway) {
        let mid = tick.mid();
        let spread = tick.spread();

        let last_mid = match (self.phase, self.state.last_mid) {
            (AgentPhase::Uninitialized, _) | (_, None) => {
                self.state.last_mid = Some(mid);
                self.state.last_spread = Some(spread);
                self.phase = AgentPhase::Warming;
                return;
            }
            (_, Some(last_mid)) => last_mid,
        };
        self.phase = AgentPhase::Active;

        if self.config.verbose() {
            debug!(time = ?tick.time, "Tick: {:.5}", mid);
        }

        let previous = self.signals.previous_signal();
        let crossover = self.signals.next(last_mid, mid);
        if crossover.is_new {
            if self.config.verbose() {
                info!("New signal: {}, {}", crossover.signal, previous);
            }
            self.order(crossover.signal, tick, gateway);
        }

        self.check_take_profit_stop_loss(tick, gateway);

        self.state.last_mid = Some(mid);
        self.state.last_spread = Some(spread);
    }

    fn on_order_opened(&mut self, order: &Order, gateway: &dyn OrderGateway) {
        let spread = self.state.last_spread.unwrap_or_default();
        let risk = self.positions.on_order_opened(order.id, spread);

        if self.config.verbose() {
            info!(
                id = order.id,
                side = %order.side,
                price = order.price,
                open_orders = gateway.open_orders().len(),
                "Order detected; take profit: {:.5}, stop loss: {:.5}",
                risk.take_profit,
                risk.stop_loss
            );
        }
    }

    fn on_order_closed(&mut self, order: &Order, profit: f64, gateway: &dyn OrderGateway) {
        if self.config.verbose() {
            info!(
                id = order.id,
                side = %order.side,
                profit,
                balance = gateway.balance(),
                "Order closed"
            );
        }
    }
}
