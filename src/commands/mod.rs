//! CLI subcommands

pub mod backtest;
