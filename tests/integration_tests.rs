//! Integration tests for the risk-managed MACD agent
//!
//! These tests drive agents through the simulated venue and the backtester
//! to verify that signal, order and risk handling work together.

use approx::assert_relative_eq;
use std::io::Write;

use risk_macd_agent::agents::{create_agent, AgentPhase, RiskMacdAgent, SimpleMacdAgent};
use risk_macd_agent::backtest::{BacktestResult, Backtester, SimulatedVenue};
use risk_macd_agent::config::{AgentConfig, AgentSettings, BacktestConfig, Config, ConfigError};
use risk_macd_agent::data;
use risk_macd_agent::rolling::RollingWindow;
use risk_macd_agent::signal::{Sign, SignalGenerator};
use risk_macd_agent::{Agent, GatewayEvent, Instruction, OrderGateway, Side, Tick};

// =============================================================================
// Test Utilities
// =============================================================================

fn tick(bid: f64, ask: f64) -> Tick {
    Tick::new(bid, ask, None).unwrap()
}

/// fast=1, slow=2: the signal is half the change in consecutive returns
fn fast_agent() -> RiskMacdAgent {
    RiskMacdAgent::new(AgentConfig::new(1, 2, 2.0, 1.5).unwrap())
}

/// Warm-up, a flat first signal, then a rising tick that opens a buy at 1.0032
fn buy_entry() -> Vec<Tick> {
    vec![
        tick(1.0000, 1.0002),
        tick(1.0010, 1.0012),
        tick(1.0030, 1.0032),
    ]
}

/// Deliver one tick and then the venue notifications it produced
fn step(agent: &mut dyn Agent, venue: &mut SimulatedVenue, tick: &Tick) {
    venue.update_quote(tick);
    agent.on_tick(tick, venue);
    for event in venue.drain_events() {
        match event {
            GatewayEvent::Opened(order) => agent.on_order_opened(&order, &*venue),
            GatewayEvent::Closed { order, profit } => {
                agent.on_order_closed(&order, profit, &*venue)
            }
        }
    }
}

fn backtest(agent: Box<dyn Agent>, ticks: &[Tick]) -> BacktestResult {
    Backtester::new(&BacktestConfig::default(), agent).run(ticks)
}

/// Deterministic oscillating quote stream with a 2 pip spread
fn generate_ticks(count: usize) -> Vec<Tick> {
    (0..count)
        .map(|i| {
            let t = i as f64;
            let mid = 1.3 + 0.001 * (t / 40.0).sin() + 0.0003 * (t / 3.0).cos();
            tick(mid - 0.0001, mid + 0.0001)
        })
        .collect()
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_invalid_parameters_never_build_an_agent() {
    let cases = [
        (ConfigError::FastNotBelowSlow { fast: 250, slow: 120 }, (250, 120, 2.0, 1.5)),
        (ConfigError::StopLossScaling(1.0), (120, 250, 1.0, 1.5)),
        (ConfigError::TakeProfitScaling(0.0), (120, 250, 2.0, 0.0)),
    ];

    for (expected, (fast, slow, sl, tp)) in cases {
        let settings = AgentSettings {
            fast_length: fast,
            slow_length: slow,
            stop_loss_scaling: sl,
            take_profit_scaling: tp,
            ..AgentSettings::default()
        };
        match create_agent(&settings) {
            Err(err) => assert_eq!(err, expected),
            Ok(agent) => panic!("{} built from invalid settings", agent.name()),
        }
    }
}

#[test]
fn test_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "agent": {{ "name": "simple_macd", "fast_length": 15, "slow_length": 40 }},
            "backtest": {{ "close_at_end": false }}
        }}"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.agent.name, "simple_macd");
    assert_eq!(config.agent.stop_loss_scaling, 2.0);
    assert!(!config.backtest.close_at_end);
    assert_eq!(create_agent(&config.agent).unwrap().name(), "simple_macd");
}

// =============================================================================
// Signal Building Blocks
// =============================================================================

#[test]
fn test_window_keeps_most_recent_values() {
    let mut window = RollingWindow::new(3);
    for i in 1..=10 {
        window.push(i as f64);
        assert!(window.len() <= 3);
    }
    assert_eq!(window.values().collect::<Vec<_>>(), vec![8.0, 9.0, 10.0]);
    assert_relative_eq!(window.mean(), 9.0);
}

#[test]
fn test_new_signal_iff_sign_changes() {
    let mut signals = SignalGenerator::new(3, 7);
    let mids: Vec<f64> = generate_ticks(300).iter().map(Tick::mid).collect();

    for pair in mids.windows(2) {
        let previous = signals.previous_signal();
        let crossover = signals.next(pair[0], pair[1]);
        assert_eq!(
            crossover.is_new,
            Sign::of(crossover.signal) != Sign::of(previous)
        );
        let expected_previous = if crossover.is_new { crossover.signal } else { 0.0 };
        assert_eq!(signals.previous_signal(), expected_previous);
    }
}

// =============================================================================
// Agent Lifecycle
// =============================================================================

#[test]
fn test_first_tick_only_warms_up() {
    let mut agent = fast_agent();
    let mut venue = SimulatedVenue::new(0.0);

    assert_eq!(agent.phase(), AgentPhase::Uninitialized);
    step(&mut agent, &mut venue, &tick(1.0000, 1.0002));

    assert_eq!(agent.phase(), AgentPhase::Warming);
    assert!(venue.instructions().is_empty());
    assert_relative_eq!(agent.state().last_mid.unwrap(), 1.0001, epsilon = 1e-12);
}

#[test]
fn test_flat_market_sends_nothing() {
    let ticks = vec![tick(1.2500, 1.2502); 50];
    let result = backtest(Box::new(fast_agent()), &ticks);

    assert!(result.instructions.is_empty());
    assert!(result.trades.is_empty());
    assert_eq!(result.ticks_processed, 50);
}

#[test]
fn test_crossover_opens_buy_with_spread_risk() {
    let mut agent = fast_agent();
    let mut venue = SimulatedVenue::new(0.0);
    for t in &buy_entry() {
        step(&mut agent, &mut venue, t);
    }

    assert_eq!(agent.phase(), AgentPhase::Active);
    assert_eq!(venue.instructions(), &[Instruction::Place(Side::Buy)]);

    let order = venue.open_orders()[0];
    assert_eq!(order.side, Side::Buy);
    assert_relative_eq!(order.price, 1.0032);
    assert_eq!(agent.last_order_id(), Some(order.id));

    let risk = agent.risk().unwrap();
    assert_relative_eq!(risk.take_profit, 0.0003, epsilon = 1e-12);
    assert_relative_eq!(risk.stop_loss, -0.0004, epsilon = 1e-12);
}

#[test]
fn test_risk_thresholds_fixed_while_spread_moves() {
    let mut agent = fast_agent();
    let mut venue = SimulatedVenue::new(0.0);
    for t in &buy_entry() {
        step(&mut agent, &mut venue, t);
    }
    let risk = agent.risk().unwrap();

    // spread widens to 38 pips; signal stays positive and the buy holds
    step(&mut agent, &mut venue, &tick(1.0033, 1.0071));

    assert_eq!(agent.risk(), Some(risk));
    assert!(venue.has_open_orders());
    assert_eq!(venue.instructions().len(), 1);
    assert_relative_eq!(agent.state().last_spread.unwrap(), 0.0038, epsilon = 1e-12);
}

// =============================================================================
// Risk Exits Through The Backtester
// =============================================================================

#[test]
fn test_take_profit_closes_position() {
    let mut ticks = buy_entry();
    ticks.push(tick(1.0060, 1.0062));

    let result = backtest(Box::new(fast_agent()), &ticks);

    assert_eq!(
        result.instructions,
        vec![Instruction::Place(Side::Buy), Instruction::Close]
    );
    assert_eq!(result.trades.len(), 1);
    assert_relative_eq!(result.trades[0].profit, 0.0028, epsilon = 1e-12);
    assert_relative_eq!(result.metrics.final_balance, 0.0028, epsilon = 1e-12);
    assert!(result.open_orders.is_empty());
}

#[test]
fn test_stop_loss_closes_position() {
    let mut ticks = buy_entry();
    // mid keeps rising but the bid drops well below the entry
    ticks.push(tick(1.0020, 1.0090));

    let result = backtest(Box::new(fast_agent()), &ticks);

    assert_eq!(
        result.instructions,
        vec![Instruction::Place(Side::Buy), Instruction::Close]
    );
    assert_eq!(result.trades.len(), 1);
    assert_relative_eq!(result.trades[0].profit, -0.0012, epsilon = 1e-12);
    assert_eq!(result.metrics.losing_trades, 1);
}

#[test]
fn test_opposite_signal_reverses_position() {
    let mut ticks = buy_entry();
    ticks.push(tick(1.0036, 1.0038));

    let result = backtest(Box::new(fast_agent()), &ticks);

    assert_eq!(
        result.instructions,
        vec![Instruction::Place(Side::Buy), Instruction::Place(Side::Sell)]
    );
    // buy closed by the reversal, sell closed at the last tick
    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].side, Side::Buy);
    assert_relative_eq!(result.trades[0].profit, 0.0004, epsilon = 1e-12);
    assert_eq!(result.trades[1].side, Side::Sell);
    assert_relative_eq!(result.trades[1].profit, -0.0002, epsilon = 1e-12);
}

#[test]
fn test_positions_left_open_without_close_at_end() {
    let config = BacktestConfig {
        close_at_end: false,
        ..BacktestConfig::default()
    };
    let mut backtester = Backtester::new(&config, Box::new(fast_agent()));
    let result = backtester.run(&buy_entry());

    assert!(result.trades.is_empty());
    assert_eq!(result.open_orders.len(), 1);
}

#[test]
fn test_dry_run_sends_no_instructions() {
    let config = AgentConfig::new(1, 2, 2.0, 1.5).unwrap().with_dry_run(true);
    let mut agent = RiskMacdAgent::new(config);
    let mut venue = SimulatedVenue::new(0.0);
    for t in &buy_entry() {
        step(&mut agent, &mut venue, t);
    }

    assert!(venue.instructions().is_empty());
    let paper = agent.paper_signal();
    assert!(paper.is_open);
    assert_eq!(paper.side, Some(Side::Buy));
}

// =============================================================================
// Determinism
// =============================================================================

#[test]
fn test_replay_is_deterministic() {
    let ticks = generate_ticks(2_000);
    let settings = AgentSettings {
        fast_length: 5,
        slow_length: 20,
        ..AgentSettings::default()
    };

    let first = backtest(create_agent(&settings).unwrap(), &ticks);
    let second = backtest(create_agent(&settings).unwrap(), &ticks);

    assert!(!first.instructions.is_empty());
    assert_eq!(first.instructions, second.instructions);
    assert_eq!(first.trades.len(), second.trades.len());
    for (a, b) in first.trades.iter().zip(&second.trades) {
        assert_eq!(a.order_id, b.order_id);
        assert_eq!(a.profit, b.profit);
    }
}

#[test]
fn test_simple_macd_trades_on_every_signal() {
    let ticks = generate_ticks(200);
    let agent = SimpleMacdAgent::new(5, 20).unwrap();
    let result = backtest(Box::new(agent), &ticks);

    // one placement per non-zero signal; repeats of the open side are ignored
    assert!(result.instructions.len() > result.trades.len());
    assert!(result
        .instructions
        .iter()
        .all(|i| matches!(i, Instruction::Place(_))));
}

// =============================================================================
// Data Loading
// =============================================================================

#[test]
fn test_backtest_from_csv() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "time,bid,ask").unwrap();
    writeln!(file, "2018-03-01 09:00:00,1.0000,1.0002").unwrap();
    writeln!(file, "2018-03-01 09:00:01,1.0010,1.0012").unwrap();
    writeln!(file, "2018-03-01 09:00:02,1.0030,1.0032").unwrap();
    writeln!(file, "2018-03-01 09:00:03,1.0040,1.0030").unwrap(); // crossed, skipped
    writeln!(file, "2018-03-01 09:00:04,1.0060,1.0062").unwrap();
    file.flush().unwrap();

    let ticks = data::load_ticks(file.path()).unwrap();
    assert_eq!(ticks.len(), 4);

    let result = backtest(Box::new(fast_agent()), &ticks);
    assert_eq!(result.trades.len(), 1);

    let trade = &result.trades[0];
    assert_eq!(trade.entry_time, ticks[2].time);
    assert_eq!(trade.exit_time, ticks[3].time);
    assert_relative_eq!(trade.profit, 0.0028, epsilon = 1e-12);
}
