//! Repository ports
//!
//! Abstract interfaces over the storage engines the pipeline collaborates
//! with. Adapters (PostgreSQL in `infra_db`, in-memory fakes in `test_utils`)
//! implement these; the pipeline and engines depend only on the traits.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::queue::{QueueItem, QueueStatus};
use crate::transaction::Transaction;

/// Error type for port operations.
///
/// A lookup returning no row is not an error (the caller simply lacks the
/// optional enrichment); these variants cover genuine storage failures.
#[derive(Debug, Error)]
pub enum PortError {
    /// The backing store rejected or failed the operation
    #[error("Storage error in {repository}: {message}")]
    Storage {
        repository: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation is not supported by this repository
    #[error("Unsupported operation on {repository}: {operation}")]
    Unsupported {
        repository: String,
        operation: String,
    },

    /// A row could not be mapped into the domain shape
    #[error("Transformation error: {0}")]
    Transformation(String),
}

impl PortError {
    /// Creates a storage error without an underlying cause.
    pub fn storage(repository: impl Into<String>, message: impl Into<String>) -> Self {
        PortError::Storage {
            repository: repository.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unsupported-operation error.
    pub fn unsupported(repository: impl Into<String>, operation: impl Into<String>) -> Self {
        PortError::Unsupported {
            repository: repository.into(),
            operation: operation.into(),
        }
    }
}

/// An inclusive trade-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// A single-day range.
    pub fn single(date: NaiveDate) -> Self {
        Self { from: date, to: date }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Read side of a transaction store.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    /// A short name used in logs and lineage entries.
    fn name(&self) -> &str;

    /// Fetches transactions for a portfolio over a trade-date range.
    async fn get(
        &self,
        portfolio_code: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>, PortError>;
}

/// Write side of a transaction store.
///
/// Implementations are expected to delete-then-insert for the batch's natural
/// key `(portfolio_code, trade_date_original)`, which is what makes
/// reprocessing idempotent at the storage layer.
#[async_trait]
pub trait TransactionSink: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Persists a batch, returning the number of rows written.
    async fn create(&self, transactions: &[Transaction]) -> Result<u64, PortError>;
}

/// Durable work-queue store with compare-and-swap status transitions.
#[async_trait]
pub trait ProcessingQueue: Send + Sync {
    /// A short name used in logs.
    fn name(&self) -> &str;

    /// Lists items currently in the given status.
    async fn get(&self, status: QueueStatus) -> Result<Vec<QueueItem>, PortError>;

    /// Enqueues an item. Creating an item that already exists with the same
    /// key and status is a no-op success.
    async fn create(&self, item: &QueueItem) -> Result<u64, PortError>;

    /// Transitions an item's status, guarded on the expected old status.
    /// Returns the number of rows affected; zero means another worker won the
    /// claim race, which is a normal outcome and not an error.
    async fn update_status(
        &self,
        item: &QueueItem,
        new_status: QueueStatus,
        expected_old: QueueStatus,
    ) -> Result<u64, PortError>;
}

/// Upstream realized gain/loss figures, keyed by portfolio transaction id.
///
/// The accounting system computes these; the pipeline consumes them as an
/// opaque input when folding FX-sale legs into dividends.
#[async_trait]
pub trait RealizedGainSource: Send + Sync {
    async fn get(
        &self,
        portfolio_code: &str,
        range: DateRange,
    ) -> Result<HashMap<Decimal, Decimal>, PortError>;
}
