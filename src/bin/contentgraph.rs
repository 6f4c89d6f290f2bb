//! Binary entry point for the contentgraph CLI.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use contentgraph::admin::{stats, verify, StatsReport, VerifyLevel, VerifyReport};
use contentgraph::config::ContentGraphConfig;
use contentgraph::projection::{ApplySummary, EventEnvelope, GraphProjector};
use contentgraph::storage::{GraphStore, MemoryStore, SqliteStore, StoreBackend, StoreOptions};
use contentgraph::ProjectionError;
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "CONTENTGRAPH_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "contentgraph",
    version,
    about = "Replay content events into a projected graph and inspect it",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "CONTENTGRAPH_DB",
        help = "SQLite database file (overrides the config file)"
    )]
    db: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "CONTENTGRAPH_CONFIG",
        help = "Config file (defaults to <config dir>/contentgraph/config.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Apply events from a JSON Lines file in order")]
    Apply {
        #[arg(value_name = "EVENTS")]
        events: PathBuf,
    },

    #[command(about = "Delete all projected rows and processed-event markers")]
    Reset,

    #[command(about = "Print row counts")]
    Stats,

    #[command(about = "Check graph invariants; exits with 2 on errors")]
    Verify {
        #[arg(long, value_enum, default_value_t = VerifyLevelArg::Full)]
        level: VerifyLevelArg,
    },

    #[command(name = "is-empty", about = "Report whether any node rows exist")]
    IsEmpty,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum VerifyLevelArg {
    Fast,
    Full,
}

impl From<VerifyLevelArg> for VerifyLevel {
    fn from(level: VerifyLevelArg) -> Self {
        match level {
            VerifyLevelArg::Fast => VerifyLevel::Fast,
            VerifyLevelArg::Full => VerifyLevel::Full,
        }
    }
}

#[derive(Serialize)]
struct ResetReport {
    reset: bool,
}

#[derive(Serialize)]
struct IsEmptyReport {
    empty: bool,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, Box<dyn Error>> {
    let cli = Cli::parse();
    let config = ContentGraphConfig::load(cli.config.as_deref())?;
    install_tracing_subscriber(config.log.filter.as_deref());

    let options = match &cli.db {
        Some(path) => {
            let mut options = StoreOptions::sqlite(path);
            if let Some(synchronous) = &config.store.synchronous {
                options = options.synchronous(synchronous.as_str());
            }
            options
        }
        None => config.store_options()?,
    };

    match &options.backend {
        StoreBackend::Sqlite(_) => execute(SqliteStore::open_with(&options)?, &cli),
        StoreBackend::Memory => {
            tracing::warn!("cli.store.memory");
            execute(MemoryStore::new(), &cli)
        }
    }
}

fn install_tracing_subscriber(configured: Option<&str>) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .ok()
        .or_else(|| configured.and_then(|directive| EnvFilter::try_new(directive).ok()))
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute<S: GraphStore>(store: S, cli: &Cli) -> Result<i32, Box<dyn Error>> {
    let mut projector = GraphProjector::new(store);
    match &cli.command {
        Command::Apply { events } => {
            let envelopes = read_events(events)?;
            match projector.apply_all(&envelopes) {
                Ok(summary) => emit(cli.format, &summary, print_apply_text)?,
                Err(ProjectionError::Batch { summary, source }) => {
                    emit(cli.format, &summary, print_apply_text)?;
                    return Err(source);
                }
                Err(err) => return Err(Box::new(err)),
            }
        }
        Command::Reset => {
            projector.reset()?;
            emit(cli.format, &ResetReport { reset: true }, |_| println!("Projection reset"))?;
        }
        Command::Stats => {
            let report = stats(projector.store())?;
            emit(cli.format, &report, print_stats_text)?;
        }
        Command::Verify { level } => {
            let report = verify(projector.store(), (*level).into())?;
            emit(cli.format, &report, print_verify_text)?;
            if !report.success {
                return Ok(2);
            }
        }
        Command::IsEmpty => {
            let report = IsEmptyReport {
                empty: projector.is_empty()?,
            };
            emit(cli.format, &report, |r| println!("{}", r.empty))?;
        }
    }
    Ok(0)
}

fn read_events(path: &Path) -> Result<Vec<EventEnvelope>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);
    let mut envelopes = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let envelope: EventEnvelope = serde_json::from_str(&line)
            .map_err(|err| format!("{}:{}: {err}", path.display(), index + 1))?;
        envelopes.push(envelope);
    }
    Ok(envelopes)
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: Fn(&T),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(value),
    }
    Ok(())
}

fn print_apply_text(summary: &ApplySummary) {
    println!(
        "Applied {} events ({} already processed)",
        summary.applied, summary.already_processed
    );
}

fn print_stats_text(report: &StatsReport) {
    println!(
        "Rows: nodes={} hierarchy={} restriction={} references={} processed_events={}",
        report.nodes,
        report.hierarchy_edges,
        report.restriction_edges,
        report.references,
        report.processed_events
    );
    for stream in &report.content_streams {
        println!(
            "  {}: hierarchy={} restriction={} dimension_points={}",
            stream.content_stream_id,
            stream.hierarchy_edges,
            stream.restriction_edges,
            stream.dimension_space_points
        );
    }
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify ({:?}) => success={} nodes={} hierarchy={} restriction={} references={} streams={}",
        report.level,
        report.success,
        report.counts.nodes,
        report.counts.hierarchy_edges,
        report.counts.restriction_edges,
        report.counts.references,
        report.counts.content_streams,
    );
    for finding in &report.findings {
        println!("- {:?}: {}", finding.severity, finding.message);
    }
}
