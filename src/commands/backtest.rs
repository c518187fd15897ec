//! Backtest command implementation

use anyhow::{Context, Result};
use risk_macd_agent::backtest::{write_trades_csv, BacktestResult, Backtester};
use risk_macd_agent::{agents, data, Config};
use std::path::Path;
use tracing::{debug, info, warn};

/// Command-line overrides for a backtest run
#[derive(Debug, Default)]
pub struct BacktestArgs {
    pub config_path: String,
    pub agent: Option<String>,
    pub data: Option<String>,
    pub fast: Option<usize>,
    pub slow: Option<usize>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub dry_run: bool,
    pub verbose: bool,
    pub start: Option<String>,
    pub end: Option<String>,
    pub output: Option<String>,
}

pub fn run(args: BacktestArgs) -> Result<()> {
    info!("Starting backtest");

    // Missing config file falls back to defaults so a bare `--data` run works
    let mut config = if Path::new(&args.config_path).exists() {
        let config = Config::from_file(&args.config_path)
            .with_context(|| format!("Failed to load {}", args.config_path))?;
        info!("Loaded configuration from: {}", args.config_path);
        config
    } else {
        warn!(
            "Config file {} not found, using defaults",
            args.config_path
        );
        Config::default()
    };

    apply_overrides(&mut config, &args);
    debug!(?config, "Effective configuration");

    info!("Loading ticks from: {}", config.backtest.data_file);
    let ticks = data::load_ticks(&config.backtest.data_file)?;

    let start = args.start.as_deref().map(data::parse_time).transpose()?;
    let end = args.end.as_deref().map(data::parse_time).transpose()?;
    let ticks = if start.is_some() || end.is_some() {
        let filtered = data::filter_ticks_by_time(ticks, start, end);
        info!("{} ticks in requested range", filtered.len());
        filtered
    } else {
        ticks
    };

    info!("Creating agent: {}", config.agent.name);
    let agent = agents::create_agent(&config.agent)?;

    let mut backtester = Backtester::new(&config.backtest, agent);
    let result = backtester.run(&ticks);

    print_results(&config, &result);

    if let Some(output) = args.output {
        write_trades_csv(&output, &result.trades)?;
    }

    info!("Backtest completed successfully");

    Ok(())
}

fn apply_overrides(config: &mut Config, args: &BacktestArgs) {
    if let Some(agent) = &args.agent {
        info!("Overriding agent to: {}", agent);
        config.agent.name = agent.clone();
    }
    if let Some(data) = &args.data {
        config.backtest.data_file = data.clone();
    }
    if let Some(fast) = args.fast {
        config.agent.fast_length = fast;
    }
    if let Some(slow) = args.slow {
        config.agent.slow_length = slow;
    }
    if let Some(stop_loss) = args.stop_loss {
        config.agent.stop_loss_scaling = stop_loss;
    }
    if let Some(take_profit) = args.take_profit {
        config.agent.take_profit_scaling = take_profit;
    }
    config.agent.dry_run |= args.dry_run;
    config.agent.verbose |= args.verbose;
}

fn print_results(config: &Config, result: &BacktestResult) {
    let metrics = &result.metrics;

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Agent:              {}", config.agent.name);
    println!(
        "Windows:            {} / {}",
        config.agent.fast_length, config.agent.slow_length
    );
    println!(
        "SL / TP Scaling:    {:.2} / {:.2}",
        config.agent.stop_loss_scaling, config.agent.take_profit_scaling
    );
    if config.agent.dry_run {
        println!("Mode:               dry run (no orders sent)");
    }
    println!("Ticks Processed:    {}", result.ticks_processed);
    println!("Instructions:       {}", result.instructions.len());
    println!("{}", "-".repeat(60));
    println!("Total Profit:       {:.5}", metrics.total_profit);
    println!("Final Balance:      {:.5}", metrics.final_balance);
    println!("Sharpe (per trade): {:.2}", metrics.sharpe_ratio);
    println!("Max Drawdown:       {:.5}", metrics.max_drawdown);
    println!("Win Rate:           {:.2}%", metrics.win_rate);
    println!("Profit Factor:      {:.2}", metrics.profit_factor);
    println!("Total Trades:       {}", metrics.total_trades);
    println!("Winning Trades:     {}", metrics.winning_trades);
    println!("Losing Trades:      {}", metrics.losing_trades);
    println!("Average Win:        {:.5}", metrics.avg_win);
    println!("Average Loss:       {:.5}", metrics.avg_loss);
    println!("Largest Win:        {:.5}", metrics.largest_win);
    println!("Largest Loss:       {:.5}", metrics.largest_loss);
    if !result.open_orders.is_empty() {
        println!("{}", "-".repeat(60));
        println!("Still Open:         {}", result.open_orders.len());
    }
    println!("{}", "=".repeat(60));
}
