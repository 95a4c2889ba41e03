// Prometheus recorder for the run counters and histograms emitted by `pipeline::run`

use crate::error::{PipelineError, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::{Path, PathBuf};
use tracing::info;

/// Snapshot written under the log directory after each run
pub const METRICS_FILE: &str = "metrics.prom";

/// Install the global Prometheus recorder. Call once, before any pipeline runs.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| PipelineError::Config(format!("failed to install metrics recorder: {e}")))?;
    info!("Metrics recorder installed");
    Ok(handle)
}

/// Render the current metrics in Prometheus text format to `<log_dir>/metrics.prom`.
pub fn write_metrics_snapshot(handle: &PrometheusHandle, log_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(METRICS_FILE);
    std::fs::write(&path, handle.render())?;
    info!("Metrics written to {}", path.display());
    Ok(path)
}
