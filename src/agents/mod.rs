//! Trading agents
//!
//! Agents are driven by three hooks: a tick from the feed, and order-opened /
//! order-closed notifications from the gateway. The runner invokes them one at
//! a time, in arrival order, so agents keep plain mutable state.
//!
//! Agents are created by name through a registry, the same way the backtest
//! command resolves the `agent.name` config key.

pub mod risk_macd;
pub mod simple_macd;

pub use risk_macd::{AgentPhase, AgentState, PaperSignal, RiskMacdAgent};
pub use simple_macd::SimpleMacdAgent;

use std::collections::HashMap;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::config::{AgentSettings, ConfigError};
use crate::gateway::OrderGateway;
use crate::{Order, Tick};

// =============================================================================
// Agent Trait - hooks invoked by the feed and the gateway
// =============================================================================

pub trait Agent: Send {
    /// Registry name of this agent
    fn name(&self) -> &'static str;

    /// Called on every market update
    fn on_tick(&mut self, tick: &Tick, gateway: &mut dyn OrderGateway);

    /// Called when the gateway reports a newly opened order
    fn on_order_opened(&mut self, order: &Order, _gateway: &dyn OrderGateway) {
        tracing::debug!(
            id = order.id,
            side = %order.side,
            price = order.price,
            "Order opened"
        );
    }

    /// Called when the gateway reports a closed order with its realized profit
    fn on_order_closed(&mut self, order: &Order, profit: f64, gateway: &dyn OrderGateway) {
        tracing::debug!(
            id = order.id,
            side = %order.side,
            profit,
            balance = gateway.balance(),
            "Order closed"
        );
    }
}

// =============================================================================
// Agent Registry
// =============================================================================

/// Factory function type for creating agents from config
pub type AgentFactory = fn(&AgentSettings) -> Result<Box<dyn Agent>, ConfigError>;

static REGISTRY: OnceLock<RwLock<HashMap<&'static str, AgentFactory>>> = OnceLock::new();

fn get_registry() -> &'static RwLock<HashMap<&'static str, AgentFactory>> {
    REGISTRY.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(risk_macd::NAME, risk_macd::create as AgentFactory);
        map.insert(simple_macd::NAME, simple_macd::create as AgentFactory);
        RwLock::new(map)
    })
}

/// Create an agent from its config section
pub fn create_agent(settings: &AgentSettings) -> Result<Box<dyn Agent>, ConfigError> {
    let registry = get_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner);

    let factory = registry.get(settings.name.as_str()).ok_or_else(|| {
        let mut available: Vec<_> = registry.keys().copied().collect();
        available.sort_unstable();
        ConfigError::UnknownAgent {
            name: settings.name.clone(),
            available: available.join(", "),
        }
    })?;

    factory(settings)
}

/// Names of all registered agents, sorted
pub fn available_agents() -> Vec<&'static str> {
    let mut names: Vec<_> = get_registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .keys()
        .copied()
        .collect();
    names.sort_unstable();
    names
}

/// Register an additional agent factory
pub fn register_agent(name: &'static str, factory: AgentFactory) {
    get_registry()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name, factory);
}
