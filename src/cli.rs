//! CLI definition and dispatch.
//!
//! Composition root: wires the CSV market data adapter, the JSON state
//! store and the paper broker into the domain calls. Progress goes to
//! stderr, results to stdout, failures map to process exit codes.

use chrono::NaiveTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_state_adapter::JsonStateAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::adapters::system_runtime::{AtomicCancelFlag, ConsoleStatus, SystemClock};
use crate::domain::autopilot::{AutoPilot, AutoPilotState, STATE_VERSION};
use crate::domain::backtest::{run_backtest as run_simulation, TradeAction};
use crate::domain::config::{
    build_autopilot_config, build_backtest_params, build_classifier_config,
    build_indicator_config, build_workflow_config,
};
use crate::domain::error::OptionPilotError;
use crate::domain::indicator::compute_snapshot;
use crate::domain::options::{choose_expiry, pick_strikes, risk_bucket, Direction};
use crate::domain::signal::{classify_option, classify_stock, OptionSignal};
use crate::domain::watchlist::{
    add_symbol, load_watchlist, remove_symbol, save_watchlist, scan_watchlist, sweep_watchlist,
};
use crate::domain::workflow::{EntryPlan, OrderWorkflow, WorkflowOutcome};
use crate::ports::broker_port::BrokerPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "optionpilot", about = "Retail trading assistant")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a symbol's trend/momentum state
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Use the option-strategy flavor (call/put) instead of buy/sell
        #[arg(long)]
        options: bool,
    },
    /// Recommend option expiry and strikes for a symbol
    Select {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// "call" or "put"; derived from the signal when omitted
        #[arg(long)]
        direction: Option<String>,
    },
    /// Backtest the trend-following rules against history
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        lookback: Option<u32>,
    },
    /// Classify every watchlist symbol
    Scan {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Run the stock strategy once across the watchlist (paper broker)
    Sweep {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show or edit the watchlist
    Watchlist {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        add: Option<String>,
        #[arg(long)]
        remove: Option<String>,
    },
    /// Buy a contract, optionally with the doubling tactic (paper broker)
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        contract: String,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        limit: f64,
        /// After the fill, offer half the position at twice the fill price
        #[arg(long)]
        hedge: bool,
    },
    /// Arm the autopilot and wait for its trigger time
    Autopilot {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        /// Trigger time of day, HH:MM
        #[arg(long)]
        at: String,
        #[arg(long)]
        budget: f64,
        #[arg(long)]
        ask_min: f64,
        #[arg(long)]
        ask_max: f64,
        #[arg(long)]
        no_trend_filter: bool,
    },
    /// Resume a persisted autopilot run after a restart
    AutopilotResume {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the persisted autopilot state
    AutopilotStatus {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Clear the persisted autopilot state
    AutopilotStop {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Signal {
            config,
            symbol,
            options,
        } => run_signal(&config, &symbol, options),
        Command::Select {
            config,
            symbol,
            direction,
        } => run_select(&config, &symbol, direction.as_deref()),
        Command::Backtest {
            config,
            symbol,
            lookback,
        } => run_backtest(&config, &symbol, lookback),
        Command::Scan { config } => run_scan(&config),
        Command::Sweep { config } => run_sweep(&config),
        Command::Watchlist {
            config,
            add,
            remove,
        } => run_watchlist(&config, add.as_deref(), remove.as_deref()),
        Command::Trade {
            config,
            contract,
            quantity,
            limit,
            hedge,
        } => run_trade(&config, &contract, quantity, limit, hedge),
        Command::Autopilot {
            config,
            symbol,
            at,
            budget,
            ask_min,
            ask_max,
            no_trend_filter,
        } => run_autopilot(&config, &symbol, &at, budget, ask_min, ask_max, no_trend_filter),
        Command::AutopilotResume { config } => run_autopilot_resume(&config),
        Command::AutopilotStatus { config } => run_autopilot_status(&config),
        Command::AutopilotStop { config } => run_autopilot_stop(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = OptionPilotError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn market_adapter(adapter: &FileConfigAdapter) -> Result<CsvAdapter, ExitCode> {
    match adapter.get_string("data", "dir") {
        Some(dir) => Ok(CsvAdapter::new(PathBuf::from(dir))),
        None => {
            let err = OptionPilotError::ConfigMissing {
                section: "data".to_string(),
                key: "dir".to_string(),
            };
            eprintln!("error: {err}");
            Err(ExitCode::from(&err))
        }
    }
}

fn state_adapter(adapter: &FileConfigAdapter) -> JsonStateAdapter {
    let dir = adapter
        .get_string("state", "dir")
        .unwrap_or_else(|| "state".to_string());
    JsonStateAdapter::new(PathBuf::from(dir))
}

fn paper_broker(adapter: &FileConfigAdapter) -> PaperBroker {
    PaperBroker::new(adapter.get_double("paper", "cash", 100_000.0))
}

fn lookback_days(adapter: &FileConfigAdapter) -> u32 {
    adapter.get_int("data", "lookback_days", 500).max(1) as u32
}

fn run_signal(config_path: &PathBuf, symbol: &str, options: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let (indicators, classifier) =
        match build_indicator_config(&adapter).and_then(|i| Ok((i, build_classifier_config(&adapter)?))) {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };

    eprintln!("Fetching bars for {symbol}...");
    let bars = match market.get_bars(symbol, lookback_days(&adapter)) {
        Ok(bars) => bars,
        Err(OptionPilotError::DataUnavailable { .. }) => {
            println!("{symbol}: no data");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let snapshot = match compute_snapshot(&bars, &indicators) {
        Some(snapshot) => snapshot,
        None => {
            println!("{symbol}: cannot evaluate (insufficient history)");
            return ExitCode::SUCCESS;
        }
    };

    println!("{} close {:.2} ({})", symbol, snapshot.close, snapshot.date);
    if let (Some(short), Some(long)) = (snapshot.sma_short, snapshot.sma_long) {
        println!(
            "SMA({}) {:.2}  SMA({}) {:.2}",
            indicators.sma_short, short, indicators.sma_long, long
        );
    }
    if let Some(rsi) = snapshot.rsi {
        println!("RSI({}) {:.1}", indicators.rsi_period, rsi);
    }
    if options {
        let advice = classify_option(&snapshot, symbol, &classifier);
        println!("signal: {:?} ({})", advice.signal, advice.reason);
    } else {
        let advice = classify_stock(&snapshot, symbol, &classifier);
        println!("signal: {:?} ({})", advice.signal, advice.reason);
    }
    ExitCode::SUCCESS
}

fn run_select(config_path: &PathBuf, symbol: &str, direction_arg: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };

    let direction = match direction_arg {
        Some("call") => Direction::Call,
        Some("put") => Direction::Put,
        Some(other) => {
            eprintln!("error: direction must be \"call\" or \"put\", got {other}");
            return ExitCode::from(2);
        }
        None => match derive_direction(&adapter, &market, symbol) {
            Ok(direction) => direction,
            Err(code) => return code,
        },
    };

    let latest = match market.get_latest_bar(symbol) {
        Ok(bar) => bar,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let today = latest.date;

    eprintln!("Fetching expiries for {symbol}...");
    let expiries = match market.get_expiries(symbol) {
        Ok(expiries) => expiries,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    for expiry in &expiries {
        let dte = (*expiry - today).num_days();
        eprintln!("  {} ({} days, {})", expiry, dte, risk_bucket(dte));
    }
    let expiry = match choose_expiry(&expiries, today) {
        Some(index) => expiries[index],
        None => {
            eprintln!("error: no expiries listed for {symbol}");
            return ExitCode::from(5);
        }
    };
    println!("expiry: {} ({} days out)", expiry, (expiry - today).num_days());

    let chain = match market.get_option_chain(symbol, expiry, direction) {
        Ok(chain) => chain,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let picks = match pick_strikes(&chain, latest.close, direction) {
        Some(picks) => picks,
        None => {
            println!("no contracts on the {direction} side for {expiry}");
            return ExitCode::SUCCESS;
        }
    };

    println!("direction: {direction} (underlying {:.2})", latest.close);
    for (label, contract) in [
        ("conservative (ITM)", &picks.conservative),
        ("balanced (ATM)", &picks.balanced),
        ("aggressive (OTM)", &picks.aggressive),
    ] {
        println!(
            "  {:<20} strike {:>8.2}  ask {:>6.2}  breakeven {:>8.2}  {}",
            label,
            contract.strike,
            contract.effective_premium(),
            contract.breakeven(direction),
            contract.contract_symbol,
        );
    }
    ExitCode::SUCCESS
}

fn derive_direction(
    adapter: &FileConfigAdapter,
    market: &dyn MarketDataPort,
    symbol: &str,
) -> Result<Direction, ExitCode> {
    let indicators = build_indicator_config(adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;
    let classifier = build_classifier_config(adapter).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })?;

    let bars = market
        .get_bars(symbol, lookback_days(adapter))
        .unwrap_or_default();
    let direction = compute_snapshot(&bars, &indicators)
        .map(|snapshot| classify_option(&snapshot, symbol, &classifier))
        .map(|advice| match advice.signal {
            OptionSignal::Put => Direction::Put,
            _ => Direction::Call,
        })
        .unwrap_or(Direction::Call);
    eprintln!("Direction from signal: {direction}");
    Ok(direction)
}

fn run_backtest(config_path: &PathBuf, symbol: &str, lookback: Option<u32>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let params = match build_backtest_params(&adapter) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };

    // Extra bars ahead of the window cover the SMA/RSI warmup.
    let lookback = lookback.unwrap_or_else(|| lookback_days(&adapter)) + 50;
    eprintln!("Fetching {lookback} days of bars for {symbol}...");
    let bars = match market.get_bars(symbol, lookback) {
        Ok(bars) => bars,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Running simulation: SMA({}) entry, SMA({}) exit, RSI < {:.0}, stop {:.0}%",
        params.sma_short,
        params.sma_long,
        params.rsi_ceiling,
        params.stop_loss_pct * 100.0
    );
    let report = run_simulation(&bars, &params);

    if report.is_no_trade() {
        println!("no trades were triggered over {} bars", bars.len());
        println!("final equity: ${:.2}", report.final_equity);
        return ExitCode::SUCCESS;
    }

    println!("=== Backtest Report: {symbol} ===");
    println!("final equity:   ${:.2}", report.final_equity);
    println!(
        "total return:   {:+.1}%  (buy & hold {:+.1}%)",
        report.total_return * 100.0,
        report.buy_hold_return * 100.0
    );
    println!("completed sells: {}", report.trade_count);
    println!("win rate:       {:.0}%", report.win_rate * 100.0);
    println!();
    for trade in &report.trades {
        let action = match trade.action {
            TradeAction::Buy => "buy ",
            TradeAction::Sell => "sell",
        };
        println!(
            "  {} {} {:>6} @ {:>8.2}  pnl {:>10.2}  {}",
            trade.date, action, trade.quantity, trade.price, trade.pnl, trade.reason
        );
    }
    ExitCode::SUCCESS
}

fn run_scan(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let (indicators, classifier) =
        match build_indicator_config(&adapter).and_then(|i| Ok((i, build_classifier_config(&adapter)?))) {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);

    let symbols = load_watchlist(&store);
    eprintln!("Scanning {} symbols...", symbols.len());
    for row in scan_watchlist(&market, &symbols, &indicators, &classifier) {
        let signal = row
            .signal
            .map(|s| format!("{:?}", s))
            .unwrap_or_else(|| "-".to_string());
        let close = row
            .last_close
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<6} {:<6} {:>10}  {}", row.symbol, signal, close, row.note);
    }
    ExitCode::SUCCESS
}

fn run_sweep(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let (indicators, classifier) =
        match build_indicator_config(&adapter).and_then(|i| Ok((i, build_classifier_config(&adapter)?))) {
            Ok(pair) => pair,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);
    let broker = paper_broker(&adapter);

    let symbols = load_watchlist(&store);
    eprintln!("Sweeping {} symbols on the paper broker...", symbols.len());
    match sweep_watchlist(&market, &broker, &symbols, &indicators, &classifier) {
        Ok(log) => {
            for line in log {
                println!("  {line}");
            }
            match broker.get_account() {
                Ok(account) => println!(
                    "paper account: equity ${:.2}, cash ${:.2}, buying power ${:.2}",
                    account.equity, account.cash, account.buying_power
                ),
                Err(e) => eprintln!("warning: account snapshot unavailable: {e}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_watchlist(config_path: &PathBuf, add: Option<&str>, remove: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);

    let mut symbols = load_watchlist(&store);
    let mut changed = false;
    if let Some(symbol) = add {
        changed |= add_symbol(&mut symbols, symbol);
    }
    if let Some(symbol) = remove {
        changed |= remove_symbol(&mut symbols, symbol);
    }
    if changed {
        if let Err(e) = save_watchlist(&store, &symbols) {
            eprintln!("error: {e}");
            return (&e).into();
        }
    }
    for symbol in &symbols {
        println!("{symbol}");
    }
    ExitCode::SUCCESS
}

fn run_trade(
    config_path: &PathBuf,
    contract: &str,
    quantity: i64,
    limit: f64,
    hedge: bool,
) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let workflow_config = match build_workflow_config(&adapter) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if hedge && quantity % 2 != 0 {
        eprintln!("error: hedge mode needs an even quantity, got {quantity}");
        return ExitCode::from(2);
    }

    let broker = paper_broker(&adapter);
    let clock = SystemClock;
    let cancel = AtomicCancelFlag::new();
    let status = ConsoleStatus;
    let workflow = OrderWorkflow::new(&broker, &clock, &cancel, &status, workflow_config);

    let outcome = workflow.execute(&EntryPlan {
        symbol: contract.to_string(),
        quantity,
        limit_price: Some(limit),
        hedge,
    });
    println!("{}", outcome.describe());
    match outcome {
        WorkflowOutcome::Failed { .. } => ExitCode::from(3),
        _ => ExitCode::SUCCESS,
    }
}

#[allow(clippy::too_many_arguments)]
fn run_autopilot(
    config_path: &PathBuf,
    symbol: &str,
    at: &str,
    budget: f64,
    ask_min: f64,
    ask_max: f64,
    no_trend_filter: bool,
) -> ExitCode {
    let trigger_time = match parse_trigger_time(at) {
        Ok(time) => time,
        Err(code) => return code,
    };
    if budget <= 0.0 || ask_min < 0.0 || ask_max < ask_min {
        eprintln!("error: budget must be positive and ask range ordered");
        return ExitCode::from(2);
    }

    with_autopilot(config_path, |pilot| {
        let state = AutoPilotState {
            version: STATE_VERSION,
            enabled: true,
            symbol: symbol.to_string(),
            trigger_time,
            budget,
            ask_min,
            ask_max,
            trend_filter: !no_trend_filter,
        };
        match pilot.arm(&state) {
            Ok(crate::domain::autopilot::AutoPilotOutcome::Armed) => {
                let outcome = pilot.run(&state);
                println!("{}", outcome.describe());
                ExitCode::SUCCESS
            }
            Ok(outcome) => {
                println!("{}", outcome.describe());
                ExitCode::from(2)
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    })
}

fn run_autopilot_resume(config_path: &PathBuf) -> ExitCode {
    with_autopilot(config_path, |pilot| match pilot.resume() {
        Some(outcome) => {
            println!("{}", outcome.describe());
            ExitCode::SUCCESS
        }
        None => {
            println!("no armed autopilot state found");
            ExitCode::SUCCESS
        }
    })
}

fn run_autopilot_status(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);
    match AutoPilotState::load(&store) {
        Some(state) => {
            println!(
                "armed: {} at {} (budget ${:.2}, ask ${:.2}..${:.2}, trend filter {})",
                state.symbol,
                state.trigger_time,
                state.budget,
                state.ask_min,
                state.ask_max,
                if state.trend_filter { "on" } else { "off" },
            );
            ExitCode::SUCCESS
        }
        None => {
            println!("no armed autopilot state found");
            ExitCode::SUCCESS
        }
    }
}

fn run_autopilot_stop(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);
    match AutoPilotState::clear(&store) {
        Ok(()) => {
            println!("autopilot state cleared");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn with_autopilot<F>(config_path: &PathBuf, body: F) -> ExitCode
where
    F: FnOnce(&AutoPilot) -> ExitCode,
{
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let autopilot_config = match build_autopilot_config(&adapter) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let market = match market_adapter(&adapter) {
        Ok(m) => m,
        Err(code) => return code,
    };
    let store = state_adapter(&adapter);
    let broker = paper_broker(&adapter);
    let clock = SystemClock;
    let cancel = AtomicCancelFlag::new();
    let status = ConsoleStatus;

    let pilot = AutoPilot::new(
        &market,
        &broker,
        &store,
        &clock,
        &cancel,
        &status,
        autopilot_config,
    );
    body(&pilot)
}

fn parse_trigger_time(raw: &str) -> Result<NaiveTime, ExitCode> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| {
            eprintln!("error: trigger time must be HH:MM, got {raw}");
            ExitCode::from(2)
        })
}
