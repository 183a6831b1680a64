//! catops-load - load catering_ops extracts into PostgreSQL

use anyhow::{Context, Result};
use catops_common::logging::{init_logging, LogConfig, LogLevel};
use catops_loader::config::LoaderConfig;
use catops_loader::executor::{LoadExecutor, RunReport};
use catops_loader::plan::{catering_ops_entries, LoadPlan};
use catops_loader::store::PgStore;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "catops-load")]
#[command(author, version, about = "Load catering_ops extracts in foreign-key order")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load every extract of the plan (default)
    Load(LoadArgs),

    /// Print the load plan and the order derived from its foreign keys
    Plan,
}

#[derive(Args, Debug, Default)]
struct LoadArgs {
    /// Directory holding the extract files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Rows per INSERT statement
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Commit each table's rows together or not at all
    #[arg(long)]
    transactional: bool,

    /// Delete existing rows (dependents first) before loading
    #[arg(long)]
    purge: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    let _log_guard = init_logging(&log_config)?;

    match cli.command.unwrap_or(Command::Load(LoadArgs::default())) {
        Command::Load(args) => load(args).await,
        Command::Plan => show_plan(),
    }
}

async fn load(args: LoadArgs) -> Result<()> {
    let mut config = LoaderConfig::from_env()?;
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(size) = args.chunk_size {
        config.chunk_size = size;
    }
    config.transactional |= args.transactional;
    config.purge |= args.purge;
    config.validate()?;

    let plan = LoadPlan::catering_ops()?;
    let store = PgStore::connect_lazy(&config.database);

    info!(
        data_dir = %config.data_dir.display(),
        chunk_size = config.chunk_size,
        transactional = config.transactional,
        "Starting load"
    );

    // connectivity failure is the only error that reaches here
    let report = LoadExecutor::new(&config)
        .run(&plan, &store)
        .await
        .context("Load aborted")?;

    if let Some(path) = args.summary_json {
        emit_report(&report, &path);
    }

    Ok(())
}

/// Report write failures are logged; they never change the exit status.
fn emit_report(report: &RunReport, path: &Path) {
    match report.write_json(path) {
        Ok(()) => info!(path = %path.display(), "Run report written"),
        Err(e) => error!(path = %path.display(), error = %e, "Failed to write run report"),
    }
}

fn show_plan() -> Result<()> {
    let plan = LoadPlan::catering_ops()?;
    for (idx, entry) in plan.entries().iter().enumerate() {
        let deps: Vec<&str> = entry.dependencies().collect();
        info!(
            position = idx + 1,
            table = entry.table,
            source = entry.source,
            optional = entry.optional,
            depends_on = ?deps,
            "Plan entry"
        );
    }

    let derived = LoadPlan::derive(catering_ops_entries())?;
    let order: Vec<&str> = derived.tables().collect();
    info!(order = ?order, "Derived dependency order");
    Ok(())
}
