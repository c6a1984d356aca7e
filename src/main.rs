use metric_decomp::config::DecompositionConfig;
use metric_decomp::core::decomposition::{ContributorRanker, Decomposer};
use metric_decomp::dataset::DimensionSpec;
use metric_decomp::{ingestion, report, weekly::WeeklyAggregates};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metric-decomp")]
#[command(about = "Explain week-over-week conversion rate changes by segment")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decompose weekly rate changes into rate and proportion effects
    Decompose {
        /// CSV with week, dimension columns, visits, conversions
        input: PathBuf,

        /// Comma separated dimensions (e.g. country,browser)
        #[arg(short, long)]
        dimensions: Option<String>,

        /// Rows listed per effect column
        #[arg(long)]
        top: Option<usize>,

        /// Write the decomposition table as CSV
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// JSON config file (env vars and flags override it)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the weekly aggregate conversion rate
    Weekly {
        /// CSV with week, dimension columns, visits, conversions
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Decompose {
            input,
            dimensions,
            top,
            output,
            json,
            config,
        } => run_decompose(input, dimensions, top, output, json, config),
        Commands::Weekly { input } => run_weekly(input),
    }
}

fn run_decompose(
    input: PathBuf,
    dimensions: Option<String>,
    top: Option<usize>,
    output: Option<PathBuf>,
    json: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => DecompositionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .with_env_overrides(|key| std::env::var(key).ok())?,
        None => DecompositionConfig::from_env()?,
    };

    if let Some(list) = dimensions {
        config.dimensions = DimensionSpec::parse(&list)?.names().to_vec();
    }
    if let Some(k) = top {
        config.top_k = k;
    }
    config.validate()?;
    let spec = config.dimension_spec()?;

    let dataset = ingestion::load_csv(&input)
        .with_context(|| format!("Failed to ingest {}", input.display()))?;

    let table = Decomposer::default().decompose(&dataset, &spec)?;

    let ranker = ContributorRanker::with_separator(&table, &config.label_separator);
    println!("\n=== Decomposition by [{}] ===", spec.names().join(", "));
    println!("{}", report::render_pair_summaries(&table));
    println!();
    println!("{}", report::render_top_contributors(&ranker, config.top_k));

    let output = output.or_else(|| config.output_dir.as_ref().map(|dir| dir.join("decomposition.csv")));
    if let Some(path) = output {
        report::write_csv(&table, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if let Some(path) = json {
        report::write_json(&table, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    info!("Done");
    Ok(())
}

fn run_weekly(input: PathBuf) -> Result<()> {
    let dataset = ingestion::load_csv(&input)
        .with_context(|| format!("Failed to ingest {}", input.display()))?;
    let weekly = WeeklyAggregates::compute(&dataset)?;

    println!("{}", weekly.to_dataframe()?);
    Ok(())
}
