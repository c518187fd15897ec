//! Core data types used across the agent, the gateway and the backtester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for tick data
#[derive(Debug, Error, PartialEq)]
pub enum TickValidationError {
    #[error("prices must be finite: bid={bid}, ask={ask}")]
    NonFinitePrice { bid: f64, ask: f64 },

    #[error("prices must be positive: bid={bid}, ask={ask}")]
    NonPositivePrice { bid: f64, ask: f64 },

    #[error("ask ({ask}) must be >= bid ({bid})")]
    CrossedQuote { bid: f64, ask: f64 },
}

/// One bid/ask update from the market feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
}

impl Tick {
    /// Create a new tick with validation
    pub fn new(
        bid: f64,
        ask: f64,
        time: Option<DateTime<Utc>>,
    ) -> Result<Self, TickValidationError> {
        let tick = Self { bid, ask, time };
        tick.validate()?;
        Ok(tick)
    }

    /// Create a tick without validation (for trusted sources and tests)
    pub fn new_unchecked(bid: f64, ask: f64) -> Self {
        Self {
            bid,
            ask,
            time: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    pub fn validate(&self) -> Result<(), TickValidationError> {
        if !self.bid.is_finite() || !self.ask.is_finite() {
            return Err(TickValidationError::NonFinitePrice {
                bid: self.bid,
                ask: self.ask,
            });
        }

        if self.bid <= 0.0 || self.ask <= 0.0 {
            return Err(TickValidationError::NonPositivePrice {
                bid: self.bid,
                ask: self.ask,
            });
        }

        if self.ask < self.bid {
            return Err(TickValidationError::CrossedQuote {
                bid: self.bid,
                ask: self.ask,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Order ID assigned by the gateway
pub type OrderId = u64;

/// An order as reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub side: Side,
    pub price: f64,
    #[serde(default)]
    pub opened_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Unrealized gain of this order against the given quote.
    ///
    /// A buy is marked against the bid, a sell against the ask.
    pub fn gross_profit(&self, bid: f64, ask: f64) -> f64 {
        match self.side {
            Side::Buy => bid - self.price,
            Side::Sell => self.price - ask,
        }
    }
}

/// Instruction sent from an agent to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Place(Side),
    Close,
}

/// Completed round trip reported by the simulated venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub order_id: OrderId,
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: Option<DateTime<Utc>>,
    pub exit_time: Option<DateTime<Utc>>,
    pub profit: f64,
}

/// Backtest statistics over closed trades
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_profit: f64,
    pub final_balance: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_mid_and_spread() {
        let tick = Tick::new_unchecked(1.3000, 1.3002);
        assert!((tick.mid() - 1.3001).abs() < 1e-12);
        assert!((tick.spread() - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn test_tick_validation() {
        assert!(Tick::new(1.3, 1.3002, None).is_ok());
        assert_eq!(
            Tick::new(1.3002, 1.3, None),
            Err(TickValidationError::CrossedQuote {
                bid: 1.3002,
                ask: 1.3
            })
        );
        assert!(matches!(
            Tick::new(0.0, 1.3, None),
            Err(TickValidationError::NonPositivePrice { .. })
        ));
        assert!(matches!(
            Tick::new(f64::NAN, 1.3, None),
            Err(TickValidationError::NonFinitePrice { .. })
        ));
    }

    #[test]
    fn test_order_gross_profit() {
        let buy = Order {
            id: 1,
            side: Side::Buy,
            price: 1.3000,
            opened_at: None,
        };
        let sell = Order {
            side: Side::Sell,
            ..buy
        };

        assert!((buy.gross_profit(1.3004, 1.3006) - 0.0004).abs() < 1e-12);
        assert!((sell.gross_profit(1.2990, 1.2995) - 0.0005).abs() < 1e-12);
    }

    #[test]
    fn test_side_serde() {
        let json = serde_json::to_string(&Side::Buy).unwrap();
        assert_eq!(json, "\"buy\"");
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }
}
