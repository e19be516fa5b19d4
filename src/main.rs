// Grid Backtest CLI
// Single entry point for backtest runs, grid inspection, parameter sweeps
// and config management

use clap::{Parser, Subcommand};
use grid_backtester::data::write_trades_csv;
use grid_backtester::{
    rank_by_return, run_sweep_with_progress, AbortFlag, BacktestConfig, BacktestEngine,
    BacktestResult, GridBuilder, Midprice, ParameterGrid, PerformanceReport,
};
use grid_backtester::progress::SweepProgress;
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "grid-backtest")]
#[command(version = "0.2.0")]
#[command(about = "Grid Trading Backtest System", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a backtest over a CSV bar file
    Run {
        /// Bar file (CSV: timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,

        /// Use preset grid parameters for a known symbol (e.g. AAPL, BTC-USD)
        #[arg(short, long)]
        asset: Option<String>,

        /// Static grid midprice
        #[arg(short, long)]
        midprice: Option<f64>,

        /// Re-center the grid on the moving average every bar
        #[arg(long)]
        dynamic: bool,

        /// Distance between adjacent grid levels
        #[arg(long)]
        grid_distance: Option<f64>,

        /// Range covered on each side of the midprice
        #[arg(long)]
        grid_range: Option<f64>,

        /// Starting capital
        #[arg(long)]
        capital: Option<f64>,

        /// Write the JSON report here
        #[arg(short, long)]
        output: Option<String>,

        /// Write the trade ledger as CSV here
        #[arg(short, long)]
        trades: Option<String>,
    },

    /// Print the grid ladder for a configuration
    Grid {
        /// Use preset grid parameters for a known symbol
        #[arg(short, long)]
        asset: Option<String>,

        /// Static grid midprice
        #[arg(short, long)]
        midprice: Option<f64>,

        /// Distance between adjacent grid levels
        #[arg(long)]
        grid_distance: Option<f64>,

        /// Range covered on each side of the midprice
        #[arg(long)]
        grid_range: Option<f64>,
    },

    /// Sweep parameter combinations in parallel and rank the results
    Sweep {
        /// Bar file (CSV: timestamp,open,high,low,close,volume)
        #[arg(short, long)]
        data: String,

        /// Grid distances to try (comma separated)
        #[arg(long, value_delimiter = ',')]
        distances: Vec<f64>,

        /// Grid ranges to try (comma separated)
        #[arg(long, value_delimiter = ',')]
        ranges: Vec<f64>,

        /// ATR stop multipliers to try (comma separated)
        #[arg(long, value_delimiter = ',')]
        multipliers: Vec<f64>,

        /// Take-profit ratios to try (comma separated)
        #[arg(long, value_delimiter = ',')]
        ratios: Vec<f64>,

        /// Randomly subsample large grids down to this many runs
        #[arg(long)]
        max_runs: Option<usize>,

        /// Subsample seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// How many ranked combinations to print
        #[arg(short, long, default_value = "10")]
        top: usize,

        /// Write every outcome as JSON here
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Write a default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Known symbols with sensible grid defaults (midprice, distance, range).
const ASSET_PRESETS: &[(&str, f64, f64, f64)] = &[
    // Stocks
    ("AAPL", 214.0, 3.0, 30.0),
    ("TSLA", 316.0, 8.0, 80.0),
    ("MSFT", 514.0, 8.0, 80.0),
    ("GOOGL", 193.0, 3.0, 30.0),
    ("NVDA", 174.0, 5.0, 50.0),
    ("AMZN", 231.0, 4.0, 40.0),
    ("META", 713.0, 8.0, 80.0),
    ("JPM", 299.0, 4.0, 40.0),
    // ETFs
    ("SPY", 637.0, 5.0, 50.0),
    ("QQQ", 566.0, 6.0, 60.0),
    // Crypto
    ("BTC-USD", 117_600.0, 2000.0, 20_000.0),
    ("ETH-USD", 3738.0, 80.0, 800.0),
    ("SOL-USD", 186.0, 5.0, 50.0),
    // Forex
    ("EURUSD=X", 1.174, 0.005, 0.05),
    ("USDJPY=X", 147.6, 0.5, 5.0),
    // Commodities
    ("GC=F", 3339.0, 50.0, 500.0),
    ("CL=F", 65.1, 2.0, 20.0),
];

fn asset_preset(symbol: &str) -> Option<&'static (&'static str, f64, f64, f64)> {
    ASSET_PRESETS
        .iter()
        .find(|(name, ..)| name.eq_ignore_ascii_case(symbol))
}

/// CLI grid flags folded on top of the config file.
struct GridOverrides {
    asset: Option<String>,
    midprice: Option<f64>,
    dynamic: bool,
    grid_distance: Option<f64>,
    grid_range: Option<f64>,
}

/// Everything the JSON report file carries alongside the metrics.
#[derive(Serialize, Deserialize)]
pub struct RunArtifact {
    pub data_file: String,
    pub config: BacktestConfig,
    pub report: PerformanceReport,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub bars_processed: usize,
    pub warmup_skipped: usize,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    info!("🚀 Grid Backtester v0.2.0");

    let outcome = match cli.command {
        Commands::Run {
            data,
            asset,
            midprice,
            dynamic,
            grid_distance,
            grid_range,
            capital,
            output,
            trades,
        } => run_backtest(
            &cli.config,
            &data,
            GridOverrides {
                asset,
                midprice,
                dynamic,
                grid_distance,
                grid_range,
            },
            capital,
            output.as_deref(),
            trades.as_deref(),
        ),

        Commands::Grid {
            asset,
            midprice,
            grid_distance,
            grid_range,
        } => show_grid(
            &cli.config,
            GridOverrides {
                asset,
                midprice,
                dynamic: false,
                grid_distance,
                grid_range,
            },
        ),

        Commands::Sweep {
            data,
            distances,
            ranges,
            multipliers,
            ratios,
            max_runs,
            seed,
            top,
            output,
        } => run_parameter_sweep(
            &cli.config,
            &data,
            ParameterGrid {
                grid_distances: distances,
                grid_ranges: ranges,
                atr_multipliers: multipliers,
                tp_sl_ratios: ratios,
            },
            max_runs,
            seed,
            top,
            output.as_deref(),
        ),

        Commands::InitConfig { force } => init_config(&cli.config, force),
    };

    if let Err(e) = outcome {
        error!("❌ {}", e);
        std::process::exit(1);
    }
}

fn run_backtest(
    config_path: &str,
    data: &str,
    overrides: GridOverrides,
    capital: Option<f64>,
    output: Option<&str>,
    trades_out: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BacktestConfig::load_or_create(config_path)?;
    apply_overrides(&mut config, &overrides)?;
    if let Some(capital) = capital {
        config.initial_capital = capital;
    }

    info!("📊 Loading bars from {}", data);
    let bars =
        grid_backtester::load_bars_with_indicators(data, config.atr_period, config.ma_period)?;

    let engine = BacktestEngine::new(config.clone())?;
    let result = engine.run(&bars)?;

    print_report(&result);

    if let Some(path) = output {
        let artifact = RunArtifact {
            data_file: data.to_string(),
            config,
            report: result.report.clone(),
            initial_capital: result.initial_capital,
            final_equity: result.final_equity,
            bars_processed: result.bars_processed,
            warmup_skipped: result.warmup_skipped,
            generated_at: chrono::Utc::now(),
        };
        let json = serde_json::to_string_pretty(&artifact)?;
        fs::write(path, json)?;
        info!("💾 Report saved: {}", path);
    }

    if let Some(path) = trades_out {
        write_trades_csv(&result.trades, path)?;
    }

    Ok(())
}

fn print_report(result: &BacktestResult) {
    info!("📈 Results:");
    info!("   Total Return: {:.2}%", result.report.total_return_pct);
    info!("   Annualized: {:.2}%", result.report.annualized_return_pct);
    info!("   Total Trades: {}", result.report.total_trades);
    info!("   Win Rate: {:.1}%", result.report.win_rate_pct);
    info!("   Profit Factor: {:.2}", result.report.profit_factor);
    info!("   Sharpe Ratio: {:.2}", result.report.sharpe_ratio);
    info!("   Max Drawdown: {:.2}%", result.report.max_drawdown_pct);
    info!("   Final Equity: {:.2}", result.final_equity);
    if result.warmup_skipped > 0 {
        info!("   Warm-up bars skipped: {}", result.warmup_skipped);
    }
}

fn show_grid(
    config_path: &str,
    overrides: GridOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BacktestConfig::load_or_create(config_path)?;
    apply_overrides(&mut config, &overrides)?;

    let grid = GridBuilder::build(&config.grid)?;
    let (low, high) = grid.span();
    info!(
        "🧮 Grid: midprice {:.2}, distance {:.2}, {} levels ({:.2} to {:.2})",
        grid.midprice,
        grid.distance,
        grid.levels.len(),
        low,
        high
    );

    // Top-down, like a price ladder.
    for level in grid.levels.iter().rev() {
        if level.offset == 0 {
            println!("  {:>4}  {:>14.4}  ← midprice", level.offset, level.price);
        } else {
            println!("  {:>4}  {:>14.4}", level.offset, level.price);
        }
    }

    Ok(())
}

fn run_parameter_sweep(
    config_path: &str,
    data: &str,
    param_grid: ParameterGrid,
    max_runs: Option<usize>,
    seed: u64,
    top: usize,
    output: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = BacktestConfig::load_or_create(config_path)?;

    info!("📊 Loading bars from {}", data);
    let bars =
        grid_backtester::load_bars_with_indicators(data, config.atr_period, config.ma_period)?;

    let total = param_grid.combination_count();
    let configs = match max_runs {
        Some(max) if max < total => {
            info!("🎲 Sampling {} of {} combinations (seed {})", max, total, seed);
            param_grid.expand_sampled(&config, max, seed)
        }
        _ => param_grid.expand(&config),
    };

    let abort = AbortFlag::new();
    let progress = SweepProgress::new(configs.len());
    let mut outcomes = run_sweep_with_progress(&bars, &configs, &abort, &progress);
    rank_by_return(&mut outcomes);

    let shown = top.min(outcomes.len());
    info!("🏆 Top {} combinations:", shown);
    for outcome in outcomes.iter().take(shown) {
        match (&outcome.report, &outcome.error) {
            (Some(report), _) => info!(
                "   • distance {:.4}, range {:.4}, atr x{:.2}, tp/sl {:.2}: {:.2}% return, {} trades, {:.2}% max DD",
                outcome.grid_distance,
                outcome.grid_range,
                outcome.atr_multiplier,
                outcome.tp_sl_ratio,
                report.total_return_pct,
                report.total_trades,
                report.max_drawdown_pct
            ),
            (None, Some(error)) => warn!(
                "   ❌ distance {:.4}, range {:.4}: {}",
                outcome.grid_distance, outcome.grid_range, error
            ),
            (None, None) => {}
        }
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&outcomes)?;
        fs::write(path, json)?;
        info!("💾 Sweep results saved: {}", path);
    }

    Ok(())
}

fn init_config(path: &str, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if std::path::Path::new(path).exists() && !force {
        warn!("⚠️  {} already exists, skipping (pass --force to overwrite)", path);
        return Ok(());
    }
    BacktestConfig::default().to_file(path)?;
    info!("📝 Created {}", path);
    Ok(())
}

fn apply_overrides(
    config: &mut BacktestConfig,
    overrides: &GridOverrides,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(symbol) = &overrides.asset {
        match asset_preset(symbol) {
            Some(&(name, midprice, distance, range)) => {
                info!(
                    "📋 Using {} preset: midprice {}, distance {}, range {}",
                    name, midprice, distance, range
                );
                config.grid.midprice = Midprice::Static(midprice);
                config.grid.grid_distance = distance;
                config.grid.grid_range = range;
            }
            None => {
                let known: Vec<&str> = ASSET_PRESETS.iter().map(|(name, ..)| *name).collect();
                return Err(format!(
                    "unknown asset \"{}\" (available: {})",
                    symbol,
                    known.join(", ")
                )
                .into());
            }
        }
    }

    if let Some(midprice) = overrides.midprice {
        config.grid.midprice = Midprice::Static(midprice);
    }
    if overrides.dynamic {
        config.grid.midprice = Midprice::dynamic();
    }
    if let Some(distance) = overrides.grid_distance {
        config.grid.grid_distance = distance;
    }
    if let Some(range) = overrides.grid_range {
        config.grid.grid_range = range;
    }

    Ok(())
}
