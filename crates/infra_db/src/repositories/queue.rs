//! Durable processing queue with compare-and-swap status transitions.
//!
//! One table per pipeline stage, identical layout. The status transition is
//! a single guarded UPDATE; zero rows affected means another worker already
//! moved the item, which callers treat as losing the claim race.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use core_kernel::{PortError, ProcessingQueue, QueueItem, QueueStatus};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::DatabaseError;

pub struct PgProcessingQueueRepository {
    pool: PgPool,
    table: &'static str,
    name: &'static str,
    worker: String,
}

impl PgProcessingQueueRepository {
    pub fn new(pool: PgPool, table: &'static str, name: &'static str, worker: impl Into<String>) -> Self {
        Self {
            pool,
            table,
            name,
            worker: worker.into(),
        }
    }

    /// The queue that seeds the activity pass-through stage.
    pub fn activity(pool: PgPool, worker: impl Into<String>) -> Self {
        Self::new(pool, "transaction_activity_queue", "activity_queue", worker)
    }

    /// The queue that seeds the summary stage.
    pub fn summary(pool: PgPool, worker: impl Into<String>) -> Self {
        Self::new(pool, "transaction_summary_queue", "summary_queue", worker)
    }

    /// The queue consumed by the downstream delivery system.
    pub fn delivery(pool: PgPool, worker: impl Into<String>) -> Self {
        Self::new(pool, "transaction_delivery_queue", "delivery_queue", worker)
    }
}

#[async_trait]
impl ProcessingQueue for PgProcessingQueueRepository {
    fn name(&self) -> &str {
        self.name
    }

    async fn get(&self, status: QueueStatus) -> Result<Vec<QueueItem>, PortError> {
        let query = format!(
            "SELECT portfolio_code, trade_date, queue_status FROM {table}
             WHERE queue_status = $1
             ORDER BY trade_date, portfolio_code",
            table = self.table
        );
        let rows = sqlx::query(&query)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
        rows.iter()
            .map(|row| {
                let portfolio_code: String = row
                    .try_get("portfolio_code")
                    .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
                let trade_date: NaiveDate = row
                    .try_get("trade_date")
                    .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
                let status_text: String = row
                    .try_get("queue_status")
                    .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
                Ok(QueueItem {
                    portfolio_code,
                    trade_date,
                    status: QueueStatus::parse(&status_text),
                })
            })
            .collect()
    }

    async fn create(&self, item: &QueueItem) -> Result<u64, PortError> {
        let query = format!(
            "INSERT INTO {table} (portfolio_code, trade_date, queue_status, modified_by, modified_at)
             SELECT $1, $2, $3, $4, $5
             WHERE NOT EXISTS (
                 SELECT 1 FROM {table}
                 WHERE portfolio_code = $1 AND trade_date = $2 AND queue_status = $3
             )",
            table = self.table
        );
        let result = sqlx::query(&query)
            .bind(item.portfolio_code.as_str())
            .bind(item.trade_date)
            .bind(item.status.as_str())
            .bind(self.worker.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
        debug!(
            queue = self.name,
            item = %item,
            created = result.rows_affected(),
            "enqueue"
        );
        Ok(result.rows_affected())
    }

    async fn update_status(
        &self,
        item: &QueueItem,
        new_status: QueueStatus,
        expected_old: QueueStatus,
    ) -> Result<u64, PortError> {
        let query = format!(
            "UPDATE {table}
             SET queue_status = $1, modified_by = $2, modified_at = $3
             WHERE portfolio_code = $4 AND trade_date = $5 AND queue_status = $6",
            table = self.table
        );
        let result = sqlx::query(&query)
            .bind(new_status.as_str())
            .bind(self.worker.as_str())
            .bind(Utc::now())
            .bind(item.portfolio_code.as_str())
            .bind(item.trade_date)
            .bind(expected_old.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
        debug!(
            queue = self.name,
            item = %item,
            new_status = %new_status,
            expected_old = %expected_old,
            rows = result.rows_affected(),
            "status transition"
        );
        Ok(result.rows_affected())
    }
}
