//! Position-level risk management
//!
//! Static stop-loss / take-profit overlay on the most recently opened order.
//! Thresholds are derived from the spread seen when the order opened and stay
//! fixed until the next order opens.

use serde::{Deserialize, Serialize};

use crate::gateway::OrderGateway;
use crate::{Order, OrderId};

/// Exit thresholds for one position, in price units of gross profit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionRisk {
    /// Loss floor (negative)
    pub stop_loss: f64,
    /// Gain ceiling (positive)
    pub take_profit: f64,
}

impl PositionRisk {
    pub fn from_spread(spread: f64, stop_loss_scaling: f64, take_profit_scaling: f64) -> Self {
        PositionRisk {
            stop_loss: -spread * stop_loss_scaling,
            take_profit: spread * take_profit_scaling,
        }
    }

    /// Decide what to do with a position showing `diff` of gross profit.
    ///
    /// Take-profit wins when both conditions hold.
    pub fn evaluate(&self, diff: f64) -> ExitDecision {
        if diff > self.take_profit {
            ExitDecision::TakeProfit { diff }
        } else if diff < self.stop_loss {
            ExitDecision::StopLoss { diff }
        } else {
            ExitDecision::Hold { diff }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ExitDecision {
    TakeProfit { diff: f64 },
    StopLoss { diff: f64 },
    Hold { diff: f64 },
}

impl ExitDecision {
    pub fn should_close(&self) -> bool {
        !matches!(self, ExitDecision::Hold { .. })
    }

    pub fn diff(&self) -> f64 {
        match *self {
            ExitDecision::TakeProfit { diff }
            | ExitDecision::StopLoss { diff }
            | ExitDecision::Hold { diff } => diff,
        }
    }
}

/// Tracks the most recently opened order and its exit thresholds
#[derive(Debug, Clone)]
pub struct PositionManager {
    stop_loss_scaling: f64,
    take_profit_scaling: f64,
    tracked: Option<OrderId>,
    risk: Option<PositionRisk>,
}

impl PositionManager {
    pub fn new(stop_loss_scaling: f64, take_profit_scaling: f64) -> Self {
        PositionManager {
            stop_loss_scaling,
            take_profit_scaling,
            tracked: None,
            risk: None,
        }
    }

    /// Start tracking `order_id`, replacing any previous thresholds.
    pub fn on_order_opened(&mut self, order_id: OrderId, spread: f64) -> PositionRisk {
        let risk = PositionRisk::from_spread(spread, self.stop_loss_scaling, self.take_profit_scaling);
        self.tracked = Some(order_id);
        self.risk = Some(risk);
        risk
    }

    pub fn tracked_order(&self) -> Option<OrderId> {
        self.tracked
    }

    pub fn risk(&self) -> Option<PositionRisk> {
        self.risk
    }

    /// Evaluate exit conditions for the tracked order.
    ///
    /// Returns `None` when nothing is tracked or the gateway no longer reports
    /// the tracked order as open.
    pub fn check<G>(&self, gateway: &G, bid: f64, ask: f64) -> Option<(Order, ExitDecision)>
    where
        G: OrderGateway + ?Sized,
    {
        let risk = self.risk?;
        let order = gateway.open_order(self.tracked?)?;
        let diff = order.gross_profit(bid, ask);
        Some((order, risk.evaluate(diff)))
    }
}
