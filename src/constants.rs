/// Source names double as destination dataset names.
pub const CUSTOMER_MASTER_SOURCE: &str = "customer_master";
pub const TRANSACTIONS_SOURCE: &str = "transactions";

// Values written into record metadata
pub const CUSTOMER_MASTER_ORIGIN: &str = "customer_master_csv";
pub const TRANSACTION_API_ORIGIN: &str = "transaction_api_mock";

/// Suffix stripped from pipeline type names to derive table names
pub const PIPELINE_SUFFIX: &str = "pipeline";

/// Conflict key for every merge write
pub const PRIMARY_KEY: &str = "id";

pub const LATE_ARRIVAL_THRESHOLD_DAYS: i64 = 7;

pub const DEFAULT_TRANSACTION_API_URL: &str = "mock://transactions";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_PIPELINES_DIR: &str = ".pipelines";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

// Environment variables read once at startup
pub const ENV_TRANSACTION_API_URL: &str = "TRANSACTION_API_URL";
pub const ENV_TRANSACTION_API_KEY: &str = "TRANSACTION_API_KEY";
pub const ENV_DATA_DIR: &str = "KNOWLEDGE_PIPELINE_DATA_DIR";
pub const ENV_PIPELINES_DIR: &str = "KNOWLEDGE_PIPELINE_PIPELINES_DIR";

/// Storage tiers created under the data directory
pub const DATA_TIERS: [&str; 3] = ["raw", "staging", "curated"];
pub const CUSTOMERS_FILE: &str = "customers.csv";

/// Columns a customer row needs for `has_required_fields`
pub const REQUIRED_CUSTOMER_FIELDS: [&str; 5] = [
    "customer_id",
    "first_name",
    "last_name",
    "email",
    "signup_date",
];

pub const TRANSACTION_STATUSES: [&str; 3] = ["completed", "pending", "failed"];
pub const TRANSACTION_CATEGORIES: [&str; 4] =
    ["electronics", "groceries", "utilities", "entertainment"];
pub const SYNTHETIC_TRANSACTION_COUNT: usize = 100;
pub const SYNTHETIC_WINDOW_DAYS: i64 = 60;
