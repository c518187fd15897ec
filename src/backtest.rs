//! Backtesting engine
//!
//! Tick-by-tick replay of an agent against a [`SimulatedVenue`]. The venue
//! fills market orders immediately at the current quote (buy at ask, sell at
//! bid) and queues its notifications; the runner drains the queue after each
//! tick and delivers them to the agent in order. Hooks therefore never
//! re-enter one another.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::{debug, info};

use crate::agents::Agent;
use crate::config::BacktestConfig;
use crate::gateway::{GatewayEvent, OrderGateway};
use crate::{ClosedTrade, Instruction, Order, OrderId, PerformanceMetrics, Side, Tick};

// =============================================================================
// Simulated Venue
// =============================================================================

/// In-memory market-order venue used for replay
#[derive(Debug, Default)]
pub struct SimulatedVenue {
    bid: f64,
    ask: f64,
    time: Option<DateTime<Utc>>,
    next_id: OrderId,
    orders: BTreeMap<OrderId, Order>,
    balance: f64,
    events: VecDeque<GatewayEvent>,
    instructions: Vec<Instruction>,
    trades: Vec<ClosedTrade>,
}

impl SimulatedVenue {
    pub fn new(initial_balance: f64) -> Self {
        SimulatedVenue {
            next_id: 1,
            balance: initial_balance,
            ..Default::default()
        }
    }

    /// Move the venue to the quote of the given tick
    pub fn update_quote(&mut self, tick: &Tick) {
        self.bid = tick.bid;
        self.ask = tick.ask;
        self.time = tick.time;
    }

    /// Take every queued notification, oldest first
    pub fn drain_events(&mut self) -> Vec<GatewayEvent> {
        self.events.drain(..).collect()
    }

    /// Every instruction received, including ignored placements
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Close every open order at the current quote
    pub fn close_all(&mut self) {
        let ids: Vec<OrderId> = self.orders.keys().copied().collect();
        for id in ids {
            self.close_order(id);
        }
    }

    fn close_order(&mut self, id: OrderId) {
        let Some(order) = self.orders.remove(&id) else {
            return;
        };

        let profit = order.gross_profit(self.bid, self.ask);
        let exit_price = match order.side {
            Side::Buy => self.bid,
            Side::Sell => self.ask,
        };
        self.balance += profit;

        debug!(
            id,
            side = %order.side,
            entry = order.price,
            exit = exit_price,
            profit,
            balance = self.balance,
            "Closed order"
        );

        self.trades.push(ClosedTrade {
            order_id: id,
            side: order.side,
            entry_price: order.price,
            exit_price,
            entry_time: order.opened_at,
            exit_time: self.time,
            profit,
        });
        self.events.push_back(GatewayEvent::Closed { order, profit });
    }
}

impl OrderGateway for SimulatedVenue {
    fn place_order(&mut self, side: Side) {
        self.instructions.push(Instruction::Place(side));

        if self.orders.values().any(|o| o.side == side) {
            debug!(%side, "Order of the same side already open, ignoring placement");
            return;
        }

        // reverse: flatten the opposite side before opening
        let opposite: Vec<OrderId> = self
            .orders
            .values()
            .filter(|o| o.side != side)
            .map(|o| o.id)
            .collect();
        for id in opposite {
            self.close_order(id);
        }

        let price = match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        };
        let order = Order {
            id: self.next_id,
            side,
            price,
            opened_at: self.time,
        };
        self.next_id += 1;

        debug!(id = order.id, %side, price, "Opened order");
        self.orders.insert(order.id, order);
        self.events.push_back(GatewayEvent::Opened(order));
    }

    fn close_position(&mut self) {
        self.instructions.push(Instruction::Close);
        self.close_all();
    }

    fn open_order(&self, id: OrderId) -> Option<Order> {
        self.orders.get(&id).copied()
    }

    fn open_orders(&self) -> Vec<Order> {
        self.orders.values().copied().collect()
    }

    fn balance(&self) -> f64 {
        self.balance
    }
}

// =============================================================================
// Backtester
// =============================================================================

/// Backtest engine
pub struct Backtester {
    agent: Box<dyn Agent>,
    venue: SimulatedVenue,
    initial_balance: f64,
    close_at_end: bool,
}

impl Backtester {
    pub fn new(config: &BacktestConfig, agent: Box<dyn Agent>) -> Self {
        Backtester {
            agent,
            venue: SimulatedVenue::new(config.initial_balance),
            initial_balance: config.initial_balance,
            close_at_end: config.close_at_end,
        }
    }

    pub fn agent(&self) -> &dyn Agent {
        self.agent.as_ref()
    }

    /// Replay the ticks in order and report the outcome
    pub fn run(&mut self, ticks: &[Tick]) -> BacktestResult {
        info!(agent = self.agent.name(), ticks = ticks.len(), "Running backtest");

        let mut balance_curve = Vec::with_capacity(ticks.len());

        for tick in ticks {
            self.venue.update_quote(tick);
            self.agent.on_tick(tick, &mut self.venue);
            self.dispatch_events();
            balance_curve.push((tick.time, self.venue.balance()));
        }

        if self.close_at_end && self.venue.has_open_orders() {
            info!(
                open = self.venue.open_orders().len(),
                "Closing open orders at the last tick"
            );
            self.venue.close_all();
            self.dispatch_events();
            if let Some(last) = balance_curve.last_mut() {
                last.1 = self.venue.balance();
            }
        }

        let trades = self.venue.trades().to_vec();
        let metrics = calculate_metrics(&trades, self.initial_balance, self.venue.balance());

        BacktestResult {
            ticks_processed: ticks.len(),
            instructions: self.venue.instructions().to_vec(),
            open_orders: self.venue.open_orders(),
            trades,
            balance_curve,
            metrics,
        }
    }

    fn dispatch_events(&mut self) {
        for event in self.venue.drain_events() {
            match event {
                GatewayEvent::Opened(order) => self.agent.on_order_opened(&order, &self.venue),
                GatewayEvent::Closed { order, profit } => {
                    self.agent.on_order_closed(&order, profit, &self.venue)
                }
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct BacktestResult {
    pub ticks_processed: usize,
    pub instructions: Vec<Instruction>,
    pub trades: Vec<ClosedTrade>,
    /// Orders left open when `close_at_end` is off
    pub open_orders: Vec<Order>,
    pub balance_curve: Vec<(Option<DateTime<Utc>>, f64)>,
    pub metrics: PerformanceMetrics,
}

// =============================================================================
// Metrics
// =============================================================================

/// Summarize closed trades.
///
/// Drawdown is measured on the realized balance after each trade, in price
/// units. Sharpe is per trade and not annualized.
pub fn calculate_metrics(
    trades: &[ClosedTrade],
    initial_balance: f64,
    final_balance: f64,
) -> PerformanceMetrics {
    if trades.is_empty() {
        return PerformanceMetrics {
            final_balance,
            ..Default::default()
        };
    }

    let profits: Vec<f64> = trades.iter().map(|t| t.profit).collect();
    let wins: Vec<f64> = profits.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = profits.iter().copied().filter(|p| *p <= 0.0).collect();

    let gross_profits: f64 = wins.iter().sum();
    let gross_losses: f64 = losses.iter().map(|p| p.abs()).sum();

    let profit_factor = if gross_losses > 0.0 {
        gross_profits / gross_losses
    } else if gross_profits > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let avg_win = if wins.is_empty() {
        0.0
    } else {
        gross_profits / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        gross_losses / losses.len() as f64
    };

    let largest_win = wins.iter().copied().fold(0.0, f64::max);
    let largest_loss = losses.iter().copied().fold(0.0, f64::min);

    let mut balance = initial_balance;
    let mut peak = initial_balance;
    let mut max_drawdown: f64 = 0.0;
    for profit in &profits {
        balance += profit;
        peak = peak.max(balance);
        max_drawdown = max_drawdown.max(peak - balance);
    }

    let sharpe_ratio = if profits.len() > 1 {
        let std_dev = profits.iter().std_dev();
        if std_dev > 0.0 {
            profits.iter().mean() / std_dev
        } else {
            0.0
        }
    } else {
        0.0
    };

    PerformanceMetrics {
        total_profit: profits.iter().sum(),
        final_balance,
        sharpe_ratio,
        max_drawdown,
        win_rate: wins.len() as f64 / trades.len() as f64 * 100.0,
        profit_factor,
        total_trades: trades.len(),
        winning_trades: wins.len(),
        losing_trades: losses.len(),
        avg_win,
        avg_loss,
        largest_win,
        largest_loss,
    }
}

/// Export closed trades as CSV
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[ClosedTrade]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;

    info!("Wrote {} trades to {}", trades.len(), path.display());
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
