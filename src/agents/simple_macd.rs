//! Plain price-level crossover agent
//!
//! Every tick pushes the mid price into a fast and a slow window and trades on
//! the sign of `fast mean - slow mean`. There is no crossover filter and no
//! risk overlay.

use tracing::debug;

use super::Agent;
use crate::config::{validate_lengths, AgentSettings, ConfigError};
use crate::gateway::OrderGateway;
use crate::rolling::RollingWindow;
use crate::{Side, Tick};

pub const NAME: &str = "simple_macd";

pub(super) fn create(settings: &AgentSettings) -> Result<Box<dyn Agent>, ConfigError> {
    let agent = SimpleMacdAgent::new(settings.fast_length, settings.slow_length)?
        .with_verbose(settings.verbose)
        .with_dry_run(settings.dry_run);
    Ok(Box::new(agent))
}

pub struct SimpleMacdAgent {
    fast: RollingWindow,
    slow: RollingWindow,
    verbose: bool,
    dry_run: bool,
}

impl SimpleMacdAgent {
    pub fn new(fast_length: usize, slow_length: usize) -> Result<Self, ConfigError> {
        validate_lengths(fast_length, slow_length)?;
        Ok(SimpleMacdAgent {
            fast: RollingWindow::new(fast_length),
            slow: RollingWindow::new(slow_length),
            verbose: false,
            dry_run: false,
        })
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn signal(&mut self, tick: &Tick) -> f64 {
        let mid = tick.mid();
        self.fast.push(mid);
        self.slow.push(mid);
        self.fast.mean() - self.slow.mean()
    }
}

impl Agent for SimpleMacdAgent {
    fn name(&self) -> &'static str {
        NAME
    }

    fn on_tick(&mut self, tick: &Tick, gateway: &mut dyn OrderGateway) {
        if self.verbose {
            debug!(bid = tick.bid, ask = tick.ask, time = ?tick.time, "Tick");
        }

        let signal = self.signal(tick);
        let side = if signal > 0.0 {
            Side::Buy
        } else if signal < 0.0 {
            Side::Sell
        } else {
            return;
        };

        if !self.dry_run {
            gateway.place_order(side);
        }
    }
}
