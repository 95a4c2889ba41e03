use anyhow::Result;
use knowledge_pipeline::bootstrap::{generate_sample_data, setup_data_directories};
use knowledge_pipeline::config::TransactionApiConfig;
use knowledge_pipeline::pipeline::{run, Destination, DestinationConfig, Pipeline};
use knowledge_pipeline::sources::{CustomerMasterPipeline, TransactionPipeline};
use knowledge_pipeline::PipelineError;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn test_customer_pipeline_end_to_end_is_idempotent() -> Result<()> {
    let temp_dir = tempdir()?;
    let data_dir = temp_dir.path().join("data");
    setup_data_directories(&data_dir)?;
    let csv_path = generate_sample_data(&data_dir)?;

    let pipeline = CustomerMasterPipeline::new(&csv_path)?;
    let config = DestinationConfig::for_source(temp_dir.path().join(".pipelines"), pipeline.source_name());

    let mut destination = Destination::open(&config)?;
    let first = run(&pipeline, &mut destination)?;
    assert_eq!(first.table_name, "customermaster");
    assert_eq!(first.extracted, 5);
    assert_eq!(first.load.inserted, 5);

    // a second run merges on id instead of appending
    let second = run(&pipeline, &mut destination)?;
    assert_eq!(second.load.inserted, 0);
    assert_eq!(second.load.updated, 5);
    assert_eq!(destination.row_count("customermaster")?, 5);

    let jane = destination
        .fetch_row("customermaster", "cust_2")?
        .expect("cust_2 should be loaded");
    assert_eq!(jane["name"], json!("Jane Smith"));
    assert_eq!(jane["customer_status"], json!("active"));
    assert_eq!(jane["metadata__data_quality__is_valid_email"], json!(true));
    assert_eq!(jane["_load_id"], json!(second.load.load_id));

    assert!(config.database_path().exists());
    Ok(())
}

#[test]
fn test_transaction_pipeline_loads_one_hundred_rows() -> Result<()> {
    let pipeline = TransactionPipeline::new(TransactionApiConfig::default()).with_seed(2024);
    let mut destination = Destination::in_memory("transactions_pipeline", pipeline.source_name())?;

    let summary = run(&pipeline, &mut destination)?;

    assert_eq!(summary.table_name, "transaction");
    assert_eq!(summary.load.rows_loaded, 100);
    assert_eq!(destination.row_count("transaction")?, 100);

    let row = destination
        .fetch_row("transaction", "txn_00042")?
        .expect("txn_00042 should be loaded");
    assert_eq!(row["transaction_id"], json!("txn_00042"));
    assert_eq!(row["currency"], json!("USD"));
    assert!(row["amount"].is_f64());
    assert!(row["metadata__is_late_arrival"].is_boolean());

    let loads = destination.loads()?;
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].row_count, 100);
    Ok(())
}

#[test]
fn test_run_records_metrics() -> Result<()> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let pipeline = TransactionPipeline::new(TransactionApiConfig::default()).with_seed(7);
    let mut destination = Destination::in_memory("transactions_pipeline", pipeline.source_name())?;

    let summary = metrics::with_local_recorder(&recorder, || run(&pipeline, &mut destination))?;
    assert_eq!(summary.load.rows_loaded, 100);

    let rendered = handle.render();
    assert!(rendered.contains("knowledge_pipeline_records_loaded_total{pipeline=\"TransactionPipeline\"} 100"));
    assert!(rendered.contains("knowledge_pipeline_runs_total{pipeline=\"TransactionPipeline\"} 1"));
    assert!(rendered.contains("knowledge_pipeline_run_duration_seconds"));
    Ok(())
}

#[test]
fn test_missing_customer_file_aborts_before_extract() {
    let temp_dir = tempdir().unwrap();
    let result = CustomerMasterPipeline::new(temp_dir.path().join("raw").join("customers.csv"));
    assert!(matches!(result, Err(PipelineError::SourceNotFound(_))));
}
