//! In-memory implementations of the storage and lookup ports.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use core_kernel::{
    field, DateRange, FieldValue, PortError, ProcessingQueue, QueueItem, QueueStatus,
    RealizedGainSource, Transaction, TransactionSink, TransactionSource,
};
use domain_enrichment::{LookupError, SupplementaryLookup};
use rust_decimal::Decimal;

/// Queue fake with the same compare-and-swap contract as the SQL repo.
#[derive(Default)]
pub struct InMemoryQueue {
    items: Mutex<Vec<QueueItem>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<QueueItem>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.lock().unwrap().clone()
    }

    /// Flips an item's status behind the engine's back, for race tests.
    pub fn force_status(&self, portfolio_code: &str, trade_date: NaiveDate, status: QueueStatus) {
        let mut items = self.items.lock().unwrap();
        for item in items.iter_mut() {
            if item.portfolio_code == portfolio_code && item.trade_date == trade_date {
                item.status = status;
            }
        }
    }
}

#[async_trait]
impl ProcessingQueue for InMemoryQueue {
    fn name(&self) -> &str {
        "in_memory_queue"
    }

    async fn get(&self, status: QueueStatus) -> Result<Vec<QueueItem>, PortError> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|i| i.status == status)
            .cloned()
            .collect())
    }

    async fn create(&self, item: &QueueItem) -> Result<u64, PortError> {
        let mut items = self.items.lock().unwrap();
        let exists = items
            .iter()
            .any(|i| i.portfolio_code == item.portfolio_code && i.trade_date == item.trade_date);
        if exists {
            return Ok(0);
        }
        items.push(item.clone());
        Ok(1)
    }

    async fn update_status(
        &self,
        item: &QueueItem,
        new_status: QueueStatus,
        expected_old: QueueStatus,
    ) -> Result<u64, PortError> {
        let mut items = self.items.lock().unwrap();
        for existing in items.iter_mut() {
            if existing.portfolio_code == item.portfolio_code
                && existing.trade_date == item.trade_date
                && existing.status == expected_old
            {
                existing.status = new_status;
                return Ok(1);
            }
        }
        Ok(0)
    }
}

/// Source fake returning transactions whose trade date falls in the range.
#[derive(Default)]
pub struct InMemorySource {
    transactions: Mutex<Vec<Transaction>>,
}

impl InMemorySource {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
        }
    }
}

#[async_trait]
impl TransactionSource for InMemorySource {
    fn name(&self) -> &str {
        "in_memory_source"
    }

    async fn get(
        &self,
        _portfolio_code: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>, PortError> {
        let transactions = self.transactions.lock().unwrap();
        Ok(transactions
            .iter()
            .filter(|t| {
                t.date(field::TRADE_DATE)
                    .map(|d| range.contains(d))
                    .unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}

/// Sink fake with the delete-then-insert contract: a batch replaces any
/// previous batch under the same (portfolio, original trade date) key.
#[derive(Default)]
pub struct InMemorySink {
    batches: Mutex<HashMap<(String, NaiveDate), Vec<Transaction>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self, portfolio_code: &str, trade_date: NaiveDate) -> Option<Vec<Transaction>> {
        self.batches
            .lock()
            .unwrap()
            .get(&(portfolio_code.to_string(), trade_date))
            .cloned()
    }

    pub fn all(&self) -> Vec<Transaction> {
        self.batches
            .lock()
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TransactionSink for InMemorySink {
    fn name(&self) -> &str {
        "in_memory_sink"
    }

    async fn create(&self, transactions: &[Transaction]) -> Result<u64, PortError> {
        let first = transactions.first().ok_or_else(|| {
            PortError::storage("in_memory_sink", "refusing to write an empty batch")
        })?;
        let key = match (&first.portfolio_code, first.trade_date_original) {
            (Some(code), Some(date)) => (code.clone(), date),
            _ => {
                return Err(PortError::Transformation(
                    "batch is missing its identity columns".to_string(),
                ))
            }
        };
        let mut batches = self.batches.lock().unwrap();
        batches.insert(key, transactions.to_vec());
        Ok(transactions.len() as u64)
    }
}

/// Realized gain figures served from a fixed map.
#[derive(Default)]
pub struct InMemoryGains {
    gains: HashMap<Decimal, Decimal>,
}

impl InMemoryGains {
    pub fn new(gains: HashMap<Decimal, Decimal>) -> Self {
        Self { gains }
    }
}

#[async_trait]
impl RealizedGainSource for InMemoryGains {
    async fn get(
        &self,
        _portfolio_code: &str,
        _range: DateRange,
    ) -> Result<HashMap<Decimal, Decimal>, PortError> {
        Ok(self.gains.clone())
    }
}

/// A lookup that never matches.
pub struct NoopLookup;

#[async_trait]
impl SupplementaryLookup for NoopLookup {
    fn name(&self) -> &str {
        "noop"
    }

    async fn supplement(&self, _txn: &mut Transaction) -> Result<bool, LookupError> {
        Ok(false)
    }
}

/// A lookup that stamps a fixed set of fields onto every transaction.
pub struct StaticLookup {
    name: String,
    fields: Vec<(String, FieldValue)>,
}

impl StaticLookup {
    pub fn new(name: &str, fields: Vec<(String, FieldValue)>) -> Self {
        Self {
            name: name.to_string(),
            fields,
        }
    }
}

#[async_trait]
impl SupplementaryLookup for StaticLookup {
    fn name(&self) -> &str {
        &self.name
    }

    async fn supplement(&self, txn: &mut Transaction) -> Result<bool, LookupError> {
        for (key, value) in &self.fields {
            txn.set(key, value.clone());
        }
        Ok(true)
    }
}
