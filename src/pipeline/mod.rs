// Batch pipeline contract: extract, transform, then load into the destination

pub mod storage;
pub mod timestamps;

use crate::constants::PIPELINE_SUFFIX;
use crate::error::Result;
use metrics::{counter, histogram};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, info_span};

pub use storage::{Destination, DestinationConfig, LoadInfo};

/// A data source that can be run through the fixed extract → transform → load sequence.
pub trait Pipeline {
    /// Record shape returned by `extract`
    type Raw;
    /// Normalized record shape handed to the loader
    type Record: Serialize;

    /// Stable name of the implementation, e.g. `TransactionPipeline`.
    /// The destination table is derived from it.
    const NAME: &'static str;

    /// Identifies the source; also names the destination dataset.
    fn source_name(&self) -> &str;

    /// Pull raw records from the source.
    fn extract(&self) -> Result<Vec<Self::Raw>>;

    /// Map raw records to normalized records. Performs no I/O.
    fn transform(&self, raw: &[Self::Raw]) -> Result<Vec<Self::Record>>;

    fn pipeline_name(&self) -> &'static str {
        Self::NAME
    }

    /// Destination table, derived from `NAME`.
    fn table_name(&self) -> String {
        table_name_for(self.pipeline_name())
    }
}

/// Sink for normalized records. Implementations upsert on `id`.
pub trait Loader {
    fn load<R: Serialize>(&mut self, records: &[R], table_name: &str) -> Result<LoadInfo>;
}

/// Outcome of a single `run`
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub pipeline: String,
    pub table_name: String,
    pub extracted: usize,
    pub transformed: usize,
    pub load: LoadInfo,
}

/// Run `pipeline` once: extract, transform, load, in that order.
///
/// Any failure aborts the run; nothing is retried.
pub fn run<P, L>(pipeline: &P, loader: &mut L) -> Result<RunSummary>
where
    P: Pipeline,
    L: Loader,
{
    let name = pipeline.pipeline_name();
    let span = info_span!("pipeline", pipeline = %name, source = %pipeline.source_name());
    let _enter = span.enter();

    let started = Instant::now();
    info!("Starting {}", name);
    println!("Starting {name}...");
    counter!("knowledge_pipeline_runs_total", "pipeline" => name).increment(1);

    let raw = pipeline.extract()?;
    info!("Extracted {} records", raw.len());
    println!("Extracted {} records", raw.len());
    counter!("knowledge_pipeline_records_extracted_total", "pipeline" => name)
        .increment(raw.len() as u64);

    let records = pipeline.transform(&raw)?;
    debug!("Transformed {} records", records.len());

    let table_name = pipeline.table_name();
    let load = loader.load(&records, &table_name)?;
    counter!("knowledge_pipeline_records_loaded_total", "pipeline" => name)
        .increment(load.rows_loaded as u64);

    histogram!("knowledge_pipeline_run_duration_seconds", "pipeline" => name)
        .record(started.elapsed().as_secs_f64());
    info!(
        table = %table_name,
        load_id = %load.load_id,
        inserted = load.inserted,
        updated = load.updated,
        "Completed {}",
        name
    );
    println!("Completed {name}");

    Ok(RunSummary {
        pipeline: name.to_string(),
        table_name,
        extracted: raw.len(),
        transformed: records.len(),
        load,
    })
}

/// `CustomerMasterPipeline` → `customermaster`
pub fn table_name_for(pipeline_name: &str) -> String {
    let lowered = pipeline_name.to_lowercase();
    match lowered.strip_suffix(PIPELINE_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => lowered,
    }
}
