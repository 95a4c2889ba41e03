use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw customer row as read from the delimited file, keyed by header name
pub type RawCustomerRow = HashMap<String, String>;

/// Normalized customer ready for loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub id: String,
    pub customer_id: String,
    pub name: String,
    pub email: String,
    pub join_date: String,
    pub customer_status: String,
    pub metadata: CustomerMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerMetadata {
    pub source: String,
    pub extracted_at: String,
    pub data_quality: DataQuality,
}

/// Quality annotations; carried along, never used to drop rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuality {
    pub has_required_fields: bool,
    pub is_valid_email: bool,
}

/// Transaction as returned by the (simulated) transaction API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub transaction_date: String,
    pub status: String,
    pub category: String,
}

/// Normalized transaction ready for loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub transaction_id: String,
    pub customer_id: String,
    pub amount: f64,
    pub currency: String,
    pub event_time: String,
    pub transaction_status: String,
    pub category: String,
    pub metadata: TransactionMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    pub source: String,
    pub extracted_at: String,
    pub is_late_arrival: bool,
}
