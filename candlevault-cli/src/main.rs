//! candlevault CLI: ingest, build, inventory and config commands.
//!
//! Commands:
//! - `ingest`: fetch daily trade dumps into the 1-second candle store
//! - `build`: derive an N-second series over a date range and write it out
//! - `build-batch`: run builds listed in a procedure file
//! - `list`: stored coverage per exchange/symbol and total size
//! - `remove`: delete stored days in a range (asks first unless `--yes`)
//! - `config show` / `config set-storage`: inspect or change the configuration
//!
//! Exit codes: 0 on success and on "no data", 1 on hard errors, 2 when some
//! ingestion dates or batch lines failed.

mod batch;
mod obs;

use anyhow::{bail, Context, Result};
use candlevault_core::config::{Config, ProjectDir};
use candlevault_core::data::{
    build, ingest, write_series, BuildError, DailyStore, LogProgress, SourceRegistry,
};
use candlevault_core::domain::DateRange;
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

const EXIT_PARTIAL_FAILURE: u8 = 2;

#[derive(Parser)]
#[command(
    name = "candlevault",
    version,
    about = "candlevault: daily crypto trade archive and candle builder"
)]
struct Cli {
    /// Project directory (config and default storage). Defaults to $CANDLEVAULT_HOME or ~/.candlevault.
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Log filter used when CANDLEVAULT_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = obs::LogFormat::Text)]
    log_format: obs::LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch daily trade dumps and store them as 1-second candles.
    Ingest {
        /// Exchange id (e.g. bybit).
        exchange: String,
        /// Symbol as the exchange spells it (e.g. BTCUSDT).
        symbol: String,
        /// First day, YYYYMMDD.
        begin: String,
        /// Last day (inclusive), YYYYMMDD.
        end: String,

        /// Maximum concurrent downloads. Defaults to the configured value.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Print the report as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Build an N-second candle series from stored days.
    Build {
        exchange: String,
        symbol: String,
        /// First day, YYYYMMDD.
        begin: String,
        /// Last day (inclusive), YYYYMMDD.
        end: String,
        /// Candle width in seconds.
        interval: u32,

        /// Output directory; must exist.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Run every build listed in a procedure file.
    BuildBatch {
        /// File with one `exchange symbol begin end interval [out_dir]` per line.
        procedure: PathBuf,

        /// Output directory for lines that do not name one.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Show stored coverage per exchange and symbol.
    List {
        /// Print the inventory as JSON on stdout.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Delete stored days in a range.
    Remove {
        exchange: String,
        symbol: String,
        /// First day, YYYYMMDD.
        begin: String,
        /// Last day (inclusive), YYYYMMDD.
        end: String,

        /// Do not ask for confirmation.
        #[arg(long, short = 'y', default_value_t = false)]
        yes: bool,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Persist a new storage directory.
    SetStorage { path: PathBuf },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Ingest { .. } => "ingest",
            Commands::Build { .. } => "build",
            Commands::BuildBatch { .. } => "build-batch",
            Commands::List { .. } => "list",
            Commands::Remove { .. } => "remove",
            Commands::Config { .. } => "config",
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    obs::init_tracing(&cli.log_level, cli.log_format)?;

    let project = ProjectDir::resolve(cli.home)?;
    let command = cli.command.name();
    let started = Instant::now();

    let result = match cli.command {
        Commands::Ingest {
            exchange,
            symbol,
            begin,
            end,
            concurrency,
            json,
        } => run_ingest(&project, &exchange, &symbol, &begin, &end, concurrency, json),
        Commands::Build {
            exchange,
            symbol,
            begin,
            end,
            interval,
            out_dir,
        } => run_build(&project, &exchange, &symbol, &begin, &end, interval, &out_dir),
        Commands::BuildBatch { procedure, out_dir } => {
            run_build_batch(&project, &procedure, &out_dir)
        }
        Commands::List { json } => run_list(&project, json),
        Commands::Remove {
            exchange,
            symbol,
            begin,
            end,
            yes,
        } => run_remove(&project, &exchange, &symbol, &begin, &end, yes),
        Commands::Config { action } => match action {
            ConfigAction::Show => run_config_show(&project),
            ConfigAction::SetStorage { path } => run_config_set_storage(&project, path),
        },
    };

    tracing::info!(command, elapsed = ?started.elapsed(), ok = result.is_ok(), "finished");
    result
}

fn load_config(project: &ProjectDir) -> Result<Config> {
    let bootstrap = project
        .bootstrap()
        .with_context(|| format!("failed to open project directory {}", project.root().display()))?;
    if bootstrap.created {
        eprintln!("Initialised {}", project.root().display());
    }
    Ok(bootstrap.config)
}

fn run_ingest(
    project: &ProjectDir,
    exchange: &str,
    symbol: &str,
    begin: &str,
    end: &str,
    concurrency: Option<usize>,
    json: bool,
) -> Result<ExitCode> {
    let range = DateRange::parse(begin, end)?;
    let exchange = exchange.to_ascii_lowercase();
    let config = load_config(project)?;

    let max_concurrency = concurrency.unwrap_or(config.max_concurrency);
    if max_concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }

    let registry = SourceRegistry::from_config(&config)?;
    let adapter = registry.resolve(&exchange)?;
    let store = DailyStore::from_config(&config);

    let report = ingest(
        &exchange,
        symbol,
        &range,
        adapter.as_ref(),
        &store,
        max_concurrency,
        &LogProgress,
    )?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{exchange}/{symbol} {range}: {} stored, {} skipped, {} failed",
            report.succeeded.len(),
            report.skipped.len(),
            report.failed.len()
        );
        for failed in &report.failed {
            eprintln!("  {} {:?}: {}", failed.date, failed.kind, failed.reason);
        }
    }

    if report.all_succeeded() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

fn run_build(
    project: &ProjectDir,
    exchange: &str,
    symbol: &str,
    begin: &str,
    end: &str,
    interval: u32,
    out_dir: &Path,
) -> Result<ExitCode> {
    let range = DateRange::parse(begin, end)?;
    let config = load_config(project)?;
    let store = DailyStore::from_config(&config);

    match build_one(&store, &exchange.to_ascii_lowercase(), symbol, &range, interval, out_dir)? {
        Some(summary) => println!("{summary}"),
        None => println!("No data in range {range} for {exchange}/{symbol}"),
    }
    Ok(ExitCode::SUCCESS)
}

/// Build and write one series. `Ok(None)` when nothing is stored in the range.
fn build_one(
    store: &DailyStore,
    exchange: &str,
    symbol: &str,
    range: &DateRange,
    interval: u32,
    out_dir: &Path,
) -> Result<Option<String>> {
    let series = match build(store, exchange, symbol, range, interval) {
        Ok(series) => series,
        Err(BuildError::NoData { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let path = write_series(&series, out_dir)?;

    let mut summary = format!(
        "Wrote {} candles ({} day(s)) to {}",
        series.candles.len(),
        series.days_found.len(),
        path.display()
    );
    if !series.days_missing.is_empty() {
        summary.push_str(&format!("; {} day(s) missing", series.days_missing.len()));
    }
    Ok(Some(summary))
}

fn run_build_batch(project: &ProjectDir, procedure: &Path, default_out: &Path) -> Result<ExitCode> {
    let text = std::fs::read_to_string(procedure)
        .with_context(|| format!("failed to read procedure file {}", procedure.display()))?;
    let items = batch::parse_procedure(&text);
    if items.is_empty() {
        println!("Nothing to build in {}", procedure.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = load_config(project)?;
    let store = DailyStore::from_config(&config);
    let mut failed = 0;

    for (line, item) in items {
        let outcome = item.and_then(|item| {
            let out_dir = item.out_dir.as_deref().unwrap_or(default_out);
            build_one(
                &store,
                &item.exchange,
                &item.symbol,
                &item.range,
                item.interval_secs,
                out_dir,
            )
        });
        match outcome {
            Ok(Some(summary)) => println!("line {line}: {summary}"),
            Ok(None) => println!("line {line}: no data in range"),
            Err(e) => {
                failed += 1;
                eprintln!("line {line}: {e:#}");
                tracing::warn!(line, error = %e, "batch line failed");
            }
        }
    }

    if failed == 0 {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
    }
}

fn run_list(project: &ProjectDir, json: bool) -> Result<ExitCode> {
    let config = load_config(project)?;
    let store = DailyStore::from_config(&config);
    let inventory = store.inventory()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&inventory)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Storage: {}", store.root().display());
    println!("Total size: {}", format_size(inventory.total_bytes));
    if inventory.entries.is_empty() {
        println!("Store is empty.");
        return Ok(ExitCode::SUCCESS);
    }

    println!();
    println!(
        "{:<10} {:<14} {:<10} {:<10} {:>6} {:>10}",
        "Exchange", "Symbol", "Begin", "End", "Days", "Size"
    );
    println!("{}", "-".repeat(65));
    for entry in &inventory.entries {
        println!(
            "{:<10} {:<14} {:<10} {:<10} {:>6} {:>10}",
            entry.exchange,
            entry.symbol,
            entry.first_day.format("%Y%m%d"),
            entry.last_day.format("%Y%m%d"),
            entry.days,
            format_size(entry.bytes)
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_remove(
    project: &ProjectDir,
    exchange: &str,
    symbol: &str,
    begin: &str,
    end: &str,
    yes: bool,
) -> Result<ExitCode> {
    let range = DateRange::parse(begin, end)?;
    let exchange = exchange.to_ascii_lowercase();
    let config = load_config(project)?;
    let store = DailyStore::from_config(&config);

    let present = store.stored_dates(&exchange, symbol, &range)?;
    if present.is_empty() {
        println!("No stored days for {exchange}/{symbol} in {range}.");
        return Ok(ExitCode::SUCCESS);
    }

    let prompt = format!(
        "Remove {} stored day(s) of {exchange}/{symbol} in {range}?",
        present.len()
    );
    if !yes && !confirm(&mut std::io::stdin().lock(), &mut std::io::stdout(), &prompt)? {
        println!("Aborted.");
        return Ok(ExitCode::SUCCESS);
    }

    let removed = store.remove_range(&exchange, symbol, &range)?;
    println!("Removed {} day(s).", removed.len());
    Ok(ExitCode::SUCCESS)
}

fn run_config_show(project: &ProjectDir) -> Result<ExitCode> {
    let config = load_config(project)?;
    println!("# {}", project.config_path().display());
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

fn run_config_set_storage(project: &ProjectDir, path: PathBuf) -> Result<ExitCode> {
    let path = if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path
    };
    let config = project.set_storage_dir(&path)?;
    std::fs::create_dir_all(&config.storage_dir)
        .with_context(|| format!("failed to create {}", config.storage_dir.display()))?;
    println!("Storage directory set to {}", config.storage_dir.display());
    Ok(ExitCode::SUCCESS)
}

/// Ask a y/n question; anything but `y`/`yes` is a no.
fn confirm(input: &mut impl BufRead, output: &mut impl Write, prompt: &str) -> Result<bool> {
    write!(output, "{prompt} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
