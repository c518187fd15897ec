//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files and validation of
//! the agent parameters. A validated [`AgentConfig`] is the only way to build
//! an agent, so an invalid parameter set never produces a running agent.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Environment variable that overrides `backtest.data_file`
pub const DATA_FILE_ENV: &str = "RISK_MACD_DATA_FILE";

/// Agent construction errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("fast_length ({fast}) must be less than slow_length ({slow})")]
    FastNotBelowSlow { fast: usize, slow: usize },

    #[error("fast_length must be at least 1")]
    EmptyFastWindow,

    #[error("stop_loss_scaling ({0}) must be greater than 1.0 or positions close instantly")]
    StopLossScaling(f64),

    #[error("take_profit_scaling ({0}) must be greater than 0.0 or no trade can take profit")]
    TakeProfitScaling(f64),

    #[error("unknown agent '{name}'. Available: {available}")]
    UnknownAgent { name: String, available: String },
}

/// Check the window lengths shared by every crossover agent
pub fn validate_lengths(fast_length: usize, slow_length: usize) -> Result<(), ConfigError> {
    if fast_length >= slow_length {
        return Err(ConfigError::FastNotBelowSlow {
            fast: fast_length,
            slow: slow_length,
        });
    }
    if fast_length == 0 {
        return Err(ConfigError::EmptyFastWindow);
    }
    Ok(())
}

/// Validated, immutable parameters of the risk-managed crossover agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    fast_length: usize,
    slow_length: usize,
    stop_loss_scaling: f64,
    take_profit_scaling: f64,
    verbose: bool,
    dry_run: bool,
}

impl AgentConfig {
    pub fn new(
        fast_length: usize,
        slow_length: usize,
        stop_loss_scaling: f64,
        take_profit_scaling: f64,
    ) -> Result<Self, ConfigError> {
        validate_lengths(fast_length, slow_length)?;

        // written as negated comparisons so NaN is rejected too
        if !(stop_loss_scaling > 1.0) {
            return Err(ConfigError::StopLossScaling(stop_loss_scaling));
        }
        if !(take_profit_scaling > 0.0) {
            return Err(ConfigError::TakeProfitScaling(take_profit_scaling));
        }

        Ok(AgentConfig {
            fast_length,
            slow_length,
            stop_loss_scaling,
            take_profit_scaling,
            verbose: false,
            dry_run: false,
        })
    }

    /// Emit per-tick diagnostics
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Compute and record signals without sending instructions to the gateway
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn fast_length(&self) -> usize {
        self.fast_length
    }

    pub fn slow_length(&self) -> usize {
        self.slow_length
    }

    pub fn stop_loss_scaling(&self) -> f64 {
        self.stop_loss_scaling
    }

    pub fn take_profit_scaling(&self) -> f64 {
        self.take_profit_scaling
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub backtest: BacktestConfig,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        if let Ok(data_file) = std::env::var(DATA_FILE_ENV) {
            config.backtest.data_file = data_file;
        }

        Ok(config)
    }
}

/// Agent section of the config file, before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Registry key of the agent to run
    pub name: String,
    pub fast_length: usize,
    pub slow_length: usize,
    pub stop_loss_scaling: f64,
    pub take_profit_scaling: f64,
    pub verbose: bool,
    pub dry_run: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            name: "simple_risk_macd".to_string(),
            fast_length: 120,
            slow_length: 250,
            stop_loss_scaling: 2.0,
            take_profit_scaling: 1.5,
            verbose: false,
            dry_run: false,
        }
    }
}

impl AgentSettings {
    pub fn to_agent_config(&self) -> Result<AgentConfig, ConfigError> {
        Ok(AgentConfig::new(
            self.fast_length,
            self.slow_length,
            self.stop_loss_scaling,
            self.take_profit_scaling,
        )?
        .with_verbose(self.verbose)
        .with_dry_run(self.dry_run))
    }
}

/// Backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Tick CSV with `time,bid,ask` columns
    pub data_file: String,
    /// Starting balance of the simulated account, in price units
    pub initial_balance: f64,
    /// Close whatever is still open at the last tick
    pub close_at_end: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            data_file: "data/backtest_GBPUSD_12_hours.csv".to_string(),
            initial_balance: 0.0,
            close_at_end: true,
        }
    }
}
