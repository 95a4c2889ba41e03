use crate::constants::{CUSTOMER_MASTER_ORIGIN, CUSTOMER_MASTER_SOURCE, REQUIRED_CUSTOMER_FIELDS};
use crate::error::{PipelineError, Result};
use crate::pipeline::timestamps::current_timestamp;
use crate::pipeline::Pipeline;
use crate::types::{CustomerMetadata, CustomerRecord, DataQuality, RawCustomerRow};
use csv::ReaderBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const DEFAULT_STATUS: &str = "active";

/// Customer master data read from a delimited file with a header row
#[derive(Debug)]
pub struct CustomerMasterPipeline {
    csv_path: PathBuf,
}

impl CustomerMasterPipeline {
    /// Fails with `SourceNotFound` when `csv_path` does not exist.
    pub fn new(csv_path: impl AsRef<Path>) -> Result<Self> {
        let csv_path = csv_path.as_ref().to_path_buf();
        if !csv_path.exists() {
            return Err(PipelineError::SourceNotFound(csv_path));
        }
        Ok(Self { csv_path })
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    fn normalize_row(row: &RawCustomerRow, extracted_at: &str) -> Result<CustomerRecord> {
        let customer_id = row
            .get("customer_id")
            .ok_or_else(|| PipelineError::MissingField("customer_id".to_string()))?;
        let field = |name: &str| row.get(name).map(String::as_str).unwrap_or_default();

        let email = field("email");
        let data_quality = DataQuality {
            has_required_fields: REQUIRED_CUSTOMER_FIELDS
                .iter()
                .all(|name| row.contains_key(*name)),
            is_valid_email: email.contains('@'),
        };

        Ok(CustomerRecord {
            id: format!("cust_{customer_id}"),
            customer_id: customer_id.clone(),
            name: format!("{} {}", field("first_name"), field("last_name")),
            email: email.to_lowercase(),
            join_date: field("signup_date").to_string(),
            customer_status: row
                .get("status")
                .map(|s| s.to_lowercase())
                .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            metadata: CustomerMetadata {
                source: CUSTOMER_MASTER_ORIGIN.to_string(),
                extracted_at: extracted_at.to_string(),
                data_quality,
            },
        })
    }
}

impl Pipeline for CustomerMasterPipeline {
    type Raw = RawCustomerRow;
    type Record = CustomerRecord;

    const NAME: &'static str = "CustomerMasterPipeline";

    fn source_name(&self) -> &str {
        CUSTOMER_MASTER_SOURCE
    }

    #[instrument(skip(self), fields(path = %self.csv_path.display()))]
    fn extract(&self) -> Result<Vec<RawCustomerRow>> {
        let mut reader = ReaderBuilder::new().from_path(&self.csv_path)?;
        let mut rows = Vec::new();

        for result in reader.deserialize() {
            let row: RawCustomerRow = result?;
            rows.push(row);
        }

        debug!("Read {} customer rows", rows.len());
        Ok(rows)
    }

    /// Every row passes through; quality problems are only flagged.
    fn transform(&self, raw: &[RawCustomerRow]) -> Result<Vec<CustomerRecord>> {
        raw.iter()
            .map(|row| Self::normalize_row(row, &current_timestamp()))
            .collect()
    }
}
