use crate::config::TransactionApiConfig;
use crate::constants::{
    LATE_ARRIVAL_THRESHOLD_DAYS, SYNTHETIC_TRANSACTION_COUNT, SYNTHETIC_WINDOW_DAYS,
    TRANSACTIONS_SOURCE, TRANSACTION_API_ORIGIN, TRANSACTION_CATEGORIES, TRANSACTION_STATUSES,
};
use crate::error::Result;
use crate::pipeline::timestamps::{current_timestamp, format_timestamp, is_late_arrival};
use crate::pipeline::Pipeline;
use crate::types::{RawTransaction, TransactionMetadata, TransactionRecord};
use chrono::{Duration, NaiveDateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, instrument};

/// Transactions from the transaction API.
///
/// The API is simulated: `extract` generates records in-process and never
/// contacts `api_url`.
#[derive(Debug, Clone)]
pub struct TransactionPipeline {
    api: TransactionApiConfig,
    seed: Option<u64>,
}

impl TransactionPipeline {
    pub fn new(api: TransactionApiConfig) -> Self {
        Self { api, seed: None }
    }

    /// Generate from a seeded RNG so fixtures are reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api.api_url
    }

    fn normalize(tx: &RawTransaction, extracted_at: &str) -> TransactionRecord {
        TransactionRecord {
            id: tx.transaction_id.clone(),
            transaction_id: tx.transaction_id.clone(),
            customer_id: tx.customer_id.clone(),
            amount: tx.amount,
            currency: tx.currency.to_uppercase(),
            event_time: tx.transaction_date.clone(),
            transaction_status: tx.status.to_lowercase(),
            category: tx.category.to_lowercase(),
            metadata: TransactionMetadata {
                source: TRANSACTION_API_ORIGIN.to_string(),
                extracted_at: extracted_at.to_string(),
                is_late_arrival: is_late_arrival(&tx.transaction_date, LATE_ARRIVAL_THRESHOLD_DAYS),
            },
        }
    }
}

/// Synthetic transactions dated in whole days over the window before `now`.
fn generate_transactions<R: Rng>(rng: &mut R, now: NaiveDateTime) -> Vec<RawTransaction> {
    let base_date = now - Duration::days(SYNTHETIC_WINDOW_DAYS);

    (1..=SYNTHETIC_TRANSACTION_COUNT)
        .map(|i| {
            let tx_date = base_date + Duration::days(rng.gen_range(0..=SYNTHETIC_WINDOW_DAYS));
            let amount: f64 = rng.gen_range(10.0..=1000.0);
            RawTransaction {
                transaction_id: format!("txn_{i:05}"),
                customer_id: format!("cust_{:03}", rng.gen_range(1..=100)),
                amount: (amount * 100.0).round() / 100.0,
                currency: "USD".to_string(),
                transaction_date: format_timestamp(tx_date),
                status: TRANSACTION_STATUSES[rng.gen_range(0..TRANSACTION_STATUSES.len())].to_string(),
                category: TRANSACTION_CATEGORIES[rng.gen_range(0..TRANSACTION_CATEGORIES.len())]
                    .to_string(),
            }
        })
        .collect()
}

impl Pipeline for TransactionPipeline {
    type Raw = RawTransaction;
    type Record = TransactionRecord;

    const NAME: &'static str = "TransactionPipeline";

    fn source_name(&self) -> &str {
        TRANSACTIONS_SOURCE
    }

    #[instrument(skip(self), fields(api_url = %self.api.api_url))]
    fn extract(&self) -> Result<Vec<RawTransaction>> {
        info!(
            authenticated = self.api.api_key.is_some(),
            seeded = self.seed.is_some(),
            "Generating synthetic transactions"
        );
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(generate_transactions(&mut rng, Utc::now().naive_utc()))
    }

    fn transform(&self, raw: &[RawTransaction]) -> Result<Vec<TransactionRecord>> {
        Ok(raw
            .iter()
            .map(|tx| Self::normalize(tx, &current_timestamp()))
            .collect())
    }
}
