use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod coaching;
mod compare;
mod config;
mod db;
mod engine;
mod error;
mod growth;
mod milestones;
mod models;
mod patterns;
mod report;
mod rubric;
mod snapshot;
mod source;
mod stats;
mod tracks;
mod velocity;

use config::EngineConfig;
use engine::GrowthEngine;
use models::{Timeframe, Variant};
use source::GrowthSource;

#[derive(Parser)]
#[command(name = "growth-analytics")]
#[command(about = "Student growth analytics for debate coaching", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// JSON file overriding weights, ladders and thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Markdown,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a growth report for one student
    Growth {
        #[arg(long)]
        student: Uuid,
        #[arg(long, value_enum, default_value_t = Timeframe::Month)]
        timeframe: Timeframe,
        #[arg(long, value_enum, default_value_t = Variant::Auto)]
        variant: Variant,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
        /// Read a CSV snapshot directory instead of Postgres
        #[arg(long)]
        data_dir: Option<PathBuf>,
        #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
        database_url: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score a CSV of rubric rows offline
    Rubric {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("debate_growth_analytics={level},sqlx=warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn emit(output: String, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Report written to {}.", path.display());
        }
        None => print!("{output}"),
    }
    Ok(())
}

async fn render<S: GrowthSource>(
    source: S,
    config: EngineConfig,
    student: Uuid,
    timeframe: Timeframe,
    variant: Variant,
    format: Format,
) -> anyhow::Result<String> {
    let engine = GrowthEngine::new(source, config);
    let report = engine
        .report(student, timeframe, variant)
        .await
        .with_context(|| format!("failed to build growth report for {student}"))?;

    Ok(match format {
        Format::Json => {
            let mut json = serde_json::to_string_pretty(&report)?;
            json.push('\n');
            json
        }
        Format::Markdown => {
            report::build_report(&report, engine.config().thresholds.unreachable_weeks)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Growth {
            student,
            timeframe,
            variant,
            format,
            data_dir,
            database_url,
            out,
        } => {
            let output = match data_dir {
                Some(dir) => {
                    debug!(dir = %dir.display(), "reading snapshot");
                    let snapshot = snapshot::Snapshot::load(&dir)
                        .with_context(|| format!("failed to load snapshot from {}", dir.display()))?;
                    render(snapshot, config, student, timeframe, variant, format).await?
                }
                None => {
                    let database_url = database_url
                        .context("DATABASE_URL must be set when --data-dir is not given")?;
                    let pool = PgPoolOptions::new()
                        .max_connections(5)
                        .connect(&database_url)
                        .await
                        .context("failed to connect to Postgres")?;
                    render(db::PgSource::new(pool), config, student, timeframe, variant, format)
                        .await?
                }
            };
            emit(output, out.as_deref())?;
        }
        Commands::Rubric { csv, out } => {
            let rows = snapshot::read_rubric_csv(&csv)
                .with_context(|| format!("failed to read {}", csv.display()))?;
            if rows.is_empty() {
                println!("No rubric rows found in {}.", csv.display());
                return Ok(());
            }
            let summary = report::build_rubric_summary(&rows, &config.dimension_weights);
            emit(summary, out.as_deref())?;
        }
    }

    Ok(())
}
