//! Quartermaster CLI
//!
//! Plans the cheapest way to buy every component on a shopping list from the vendors listed in
//! per-component CSV tables.
//!
//! Exits with status 2 when no plan satisfies the minimum order within the vendor cap.

use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, ValueEnum};
use humanize_duration::{Truncate, prelude::DurationExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use quartermaster::{
    config::{PlannerConfig, PlannerSettings, StrategyKind, UncoveredPolicy},
    listings::{ShoppingList, load_catalog},
    planner::Planner,
    report::PlanReport,
};

#[derive(Debug, Parser)]
#[command(name = "quartermaster", about = "Cost-minimal multi-vendor shopping plans", long_about = None)]
struct Cli {
    /// Shopping list: one `name` or `name, quantity` per line
    #[arg(env = "QUARTERMASTER_LIST")]
    list: PathBuf,

    /// Directory holding one `<component>.csv` listing table per component
    #[arg(short, long, env = "QUARTERMASTER_DATA_DIR", default_value = "var/data")]
    data_dir: PathBuf,

    /// YAML planner settings; flags override values from the file
    #[arg(short, long, env = "QUARTERMASTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    planner: PlannerArgs,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Debug, Args)]
struct PlannerArgs {
    /// ISO currency code of the listing tables
    #[arg(long, env = "QUARTERMASTER_CURRENCY")]
    currency: Option<String>,

    /// Minimum order value per vendor, e.g. `50` or `50.00 EUR`
    #[arg(short, long, env = "QUARTERMASTER_MINIMUM_ORDER")]
    minimum_order: Option<String>,

    /// Largest number of vendors in one plan
    #[arg(short = 'k', long, env = "QUARTERMASTER_MAX_VENDORS")]
    max_vendors: Option<i64>,

    /// Wall-clock limit in seconds; the best plan found so far is returned
    #[arg(short, long, env = "QUARTERMASTER_TIMEOUT_SECS")]
    timeout_secs: Option<f64>,

    /// Stop once a plan is within this fraction of the lower bound (e.g. 0.05)
    #[arg(long, env = "QUARTERMASTER_TOLERANCE")]
    tolerance: Option<f64>,

    /// Search worker threads
    #[arg(short, long, env = "QUARTERMASTER_WORKERS")]
    workers: Option<i64>,

    /// Assignment strategy used inside each vendor subset
    #[arg(long, env = "QUARTERMASTER_STRATEGY", value_enum)]
    strategy: Option<StrategyArg>,

    /// Node budget per subset for the exhaustive strategy
    #[arg(long, env = "QUARTERMASTER_NODE_LIMIT")]
    node_limit: Option<i64>,

    /// Drop components no vendor offers instead of failing
    #[arg(long, env = "QUARTERMASTER_EXCLUDE_UNCOVERED")]
    exclude_uncovered: bool,

    /// Keep dominated vendors in the search
    #[arg(long, env = "QUARTERMASTER_NO_DOMINANCE")]
    no_dominance: bool,
}

impl PlannerArgs {
    fn settings(&self) -> PlannerSettings {
        PlannerSettings {
            currency: self.currency.clone(),
            minimum_order: self.minimum_order.clone(),
            max_vendor_combinations: self.max_vendors,
            timeout_secs: self.timeout_secs,
            tolerance: self.tolerance,
            workers: self.workers,
            dominance_filter: self.no_dominance.then_some(false),
            uncovered_components: self.exclude_uncovered.then_some(UncoveredPolicy::Exclude),
            strategy: self.strategy.map(StrategyKind::from),
            exhaustive_node_limit: self.node_limit,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    /// Cheapest offer per component, swap repair, then single-component moves
    GreedyRepair,

    /// Depth-first search over assignments within a node budget (default)
    Exhaustive,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::GreedyRepair => Self::GreedyRepair,
            StrategyArg::Exhaustive => Self::Exhaustive,
        }
    }
}

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

#[derive(Debug, Args)]
struct LoggingArgs {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "warn")]
    log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

fn init_logging(logging: &LoggingArgs) -> Result<()> {
    let filter = EnvFilter::try_new(&logging.log_level)
        .with_context(|| format!("invalid log level: {}", logging.log_level))?;

    match logging.log_format {
        LogFormat::Compact => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .with(filter)
            .try_init()?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .with(filter)
            .try_init()?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<PlannerConfig> {
    let file_settings = match &cli.config {
        Some(path) => PlannerSettings::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PlannerSettings::default(),
    };

    let settings = file_settings.merge(cli.planner.settings());

    Ok(PlannerConfig::try_from(settings)?)
}

/// Plans the shopping list and prints the report. Returns whether a plan was found.
fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;

    let list = ShoppingList::load(&cli.list)
        .with_context(|| format!("failed to read shopping list {}", cli.list.display()))?;

    let catalog = load_catalog(&list, &cli.data_dir, config.currency)?;

    let planner = Planner::new(config)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    writeln!(handle, "{}", planner.config())?;

    let start = Instant::now();
    let outcome = planner.plan(&catalog)?;
    let elapsed = start.elapsed();

    PlanReport::new(&catalog, &outcome).write_to(&mut handle, planner.config())?;

    writeln!(handle, "{}", outcome.statistics)?;

    writeln!(
        handle,
        " {} ({}s)",
        elapsed.human(Truncate::Nano),
        elapsed.as_secs_f32()
    )?;

    Ok(!outcome.result.is_infeasible())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging(&cli.logging) {
        report_error(&error);
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(error) => {
            report_error(&error);
            ExitCode::FAILURE
        }
    }
}

#[expect(clippy::print_stderr, reason = "CLI error output")]
fn report_error(error: &anyhow::Error) {
    eprintln!("error: {error:#}");
}
