// Concrete pipeline sources

pub mod customer_master;
pub mod transactions;

pub use customer_master::CustomerMasterPipeline;
pub use transactions::TransactionPipeline;
