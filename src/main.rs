//! Risk-managed MACD agent - main entry point
//!
//! Subcommands:
//! - backtest: replay historical ticks through an agent and the simulated venue
//! - agents: list registered agents

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "risk-macd-agent")]
#[command(about = "Tick-driven MACD crossover agent with spread-scaled risk exits", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay ticks through an agent
    Backtest {
        /// Path to configuration file
        #[arg(
            short,
            long,
            env = "RISK_MACD_CONFIG",
            default_value = "configs/gbpusd_risk_macd.json"
        )]
        config: String,

        /// Agent name (overrides config file)
        #[arg(short, long)]
        agent: Option<String>,

        /// Tick CSV (overrides config file)
        #[arg(short, long)]
        data: Option<String>,

        /// Fast window length
        #[arg(long)]
        fast: Option<usize>,

        /// Slow window length
        #[arg(long)]
        slow: Option<usize>,

        /// Stop-loss scaling of the spread
        #[arg(long)]
        stop_loss: Option<f64>,

        /// Take-profit scaling of the spread
        #[arg(long)]
        take_profit: Option<f64>,

        /// Compute signals without sending orders
        #[arg(long)]
        dry_run: bool,

        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Write closed trades to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },

    /// List registered agents
    Agents,
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    // same format without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Backtest { .. } => "backtest",
        Commands::Agents => "agents",
    };

    setup_logging(cli.verbose, command_name)?;

    match cli.command {
        Commands::Backtest {
            config,
            agent,
            data,
            fast,
            slow,
            stop_loss,
            take_profit,
            dry_run,
            start,
            end,
            output,
        } => commands::backtest::run(commands::backtest::BacktestArgs {
            config_path: config,
            agent,
            data,
            fast,
            slow,
            stop_loss,
            take_profit,
            dry_run,
            verbose: cli.verbose,
            start,
            end,
            output,
        }),

        Commands::Agents => {
            for name in risk_macd_agent::agents::available_agents() {
                println!("{}", name);
            }
            Ok(())
        }
    }
}
