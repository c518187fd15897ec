//! Risk-managed MACD tick agent
//!
//! An event-driven trading agent for a single FX instrument. On every bid/ask
//! tick it compares fast and slow rolling means of mid-price changes, opens a
//! market order when that signal changes sign, and closes the order once the
//! spread-scaled stop-loss or take-profit threshold is crossed. Includes a
//! simulated venue and tick-replay backtester.

pub mod agents;
pub mod backtest;
pub mod config;
pub mod data;
pub mod gateway;
pub mod position;
pub mod rolling;
pub mod signal;
pub mod types;

pub use agents::{create_agent, Agent, RiskMacdAgent};
pub use config::{AgentConfig, Config, ConfigError};
pub use gateway::{GatewayEvent, OrderGateway};
pub use types::*;
