//! Order gateway interface
//!
//! Agents talk to the venue only through [`OrderGateway`]. Instructions are
//! fire-and-forget; the venue confirms through [`GatewayEvent`]s that the
//! runner delivers back to the agent between ticks.

use crate::{Order, OrderId, Side};

pub trait OrderGateway {
    /// Request a market order in the given direction
    fn place_order(&mut self, side: Side);

    /// Request that the open position be closed
    fn close_position(&mut self);

    /// Look up an order that is currently open, by id
    fn open_order(&self, id: OrderId) -> Option<Order>;

    /// All orders currently open for this agent
    fn open_orders(&self) -> Vec<Order>;

    /// Account balance (realized)
    fn balance(&self) -> f64;

    fn has_open_orders(&self) -> bool {
        !self.open_orders().is_empty()
    }
}

/// Notification from the venue to the agent
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Opened(Order),
    Closed { order: Order, profit: f64 },
}
