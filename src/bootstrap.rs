use crate::constants::{CUSTOMERS_FILE, DATA_TIERS};
use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const SAMPLE_CUSTOMERS_CSV: &str = "customer_id,first_name,last_name,email,signup_date,status
1,John,Doe,john.doe@example.com,2023-01-15,active
2,Jane,Smith,jane.smith@example.com,2023-02-20,ACTIVE
3,Robert,Johnson,robert.j@example.com,2023-03-10,inactive
4,Emily,Davis,emily.d@example.com,2023-04-05,Active
5,Michael,Brown,michael.b@example.com,2023-05-12,active
";

/// Ensures `raw`, `staging` and `curated` exist under `data_dir`.
pub fn setup_data_directories(data_dir: &Path) -> Result<()> {
    for tier in DATA_TIERS {
        fs::create_dir_all(data_dir.join(tier))?;
    }
    Ok(())
}

/// Writes the sample customer file unless one is already there. Returns its path.
pub fn generate_sample_data(data_dir: &Path) -> Result<PathBuf> {
    let sample_path = data_dir.join("raw").join(CUSTOMERS_FILE);
    if sample_path.exists() {
        return Ok(sample_path);
    }

    if let Some(parent) = sample_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&sample_path, SAMPLE_CUSTOMERS_CSV)?;
    info!("Wrote sample customer data to {}", sample_path.display());
    Ok(sample_path)
}
