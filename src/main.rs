use anyhow::{Context, Result};
use clap::Parser;
use knowledge_pipeline::bootstrap;
use knowledge_pipeline::config::Config;
use knowledge_pipeline::logging;
use knowledge_pipeline::observability;
use knowledge_pipeline::pipeline::{run, Destination, DestinationConfig, Pipeline};
use knowledge_pipeline::sources::{CustomerMasterPipeline, TransactionPipeline};
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "knowledge_pipeline")]
#[command(about = "Load customer and transaction records into the analytical store")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Root of the raw/staging/curated data directories
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Working directory for destination databases
    #[arg(long)]
    pipelines_dir: Option<PathBuf>,
}

fn banner(title: &str) {
    let rule = "=".repeat(50);
    println!("\n{rule}");
    println!("{title}");
    println!("{rule}");
}

fn run_into_destination<P: Pipeline>(pipeline: &P, config: &Config) -> Result<()> {
    let dest_config = DestinationConfig::for_source(&config.pipelines_dir, pipeline.source_name());
    let mut destination = Destination::open(&dest_config).with_context(|| {
        format!(
            "failed to open destination at {}",
            dest_config.database_path().display()
        )
    })?;

    let summary = run(pipeline, &mut destination)
        .with_context(|| format!("{} failed", pipeline.pipeline_name()))?;

    info!(
        table = %summary.table_name,
        load_id = %summary.load.load_id,
        "{}: {} extracted, {} loaded",
        summary.pipeline,
        summary.extracted,
        summary.load.rows_loaded
    );
    Ok(())
}

fn execute(config: &Config) -> Result<()> {
    bootstrap::setup_data_directories(&config.data_dir)?;
    bootstrap::generate_sample_data(&config.data_dir)?;

    banner("Running Customer Master Pipeline");
    let customers = CustomerMasterPipeline::new(config.customers_csv_path())?;
    run_into_destination(&customers, config)?;

    banner("Running Transaction Pipeline");
    let transactions = TransactionPipeline::new(config.transaction_api.clone());
    run_into_destination(&transactions, config)?;

    println!("\nPipeline execution completed successfully!");
    Ok(())
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.pipelines_dir {
        config.pipelines_dir = dir;
    }

    let _log_guard = logging::init_logging(&config.log_dir).context("failed to initialize logging")?;
    let metrics_handle = observability::init_metrics().context("failed to initialize metrics")?;

    let outcome = execute(&config);
    if let Err(e) = observability::write_metrics_snapshot(&metrics_handle, &config.log_dir) {
        warn!("Could not write metrics snapshot: {}", e);
    }

    if let Err(e) = outcome {
        error!("Pipeline execution failed: {:#}", e);
        return Err(e);
    }
    Ok(())
}
