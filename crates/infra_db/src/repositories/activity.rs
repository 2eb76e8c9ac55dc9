//! Transaction activity store.
//!
//! Activity tables mirror the upstream feed: one quoted mixed-case column
//! per feed field, plus snake_case bookkeeping columns. The same repository
//! type serves both the raw feed table (read-only in practice) and the local
//! activity store that the pass-through stage writes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use core_kernel::{field, DateRange, PortError, Transaction, TransactionSink, TransactionSource};
use sqlx::{PgPool, QueryBuilder};
use tracing::{debug, info};

use crate::decode::{push_field, quote_ident, row_to_fields};
use crate::error::DatabaseError;

pub struct PgTransactionActivityRepository {
    pool: PgPool,
    table: &'static str,
    name: &'static str,
}

impl PgTransactionActivityRepository {
    pub fn new(pool: PgPool, table: &'static str, name: &'static str) -> Self {
        Self { pool, table, name }
    }

    /// The upstream accounting feed.
    pub fn raw(pool: PgPool) -> Self {
        Self::new(pool, "raw_transaction_activity", "raw_activity")
    }

    /// The local activity store written by the pass-through stage.
    pub fn store(pool: PgPool) -> Self {
        Self::new(pool, "transaction_activity", "activity_store")
    }

    fn transaction_from_row(&self, row: &sqlx::postgres::PgRow) -> Result<Transaction, PortError> {
        let mut fields = row_to_fields(row).map_err(|e| e.into_port(self.name))?;
        let portfolio_code = fields
            .remove("portfolio_code")
            .and_then(|v| v.as_text().map(str::to_string));
        let close_date = fields.remove("close_date").and_then(|v| v.as_date());
        fields.remove("modified_by");

        let mut txn = Transaction::new();
        txn.portfolio_code = portfolio_code;
        txn.trade_date_original = close_date;
        for (key, value) in fields {
            txn.set(&key, value);
        }
        txn.trade_date = txn.date(field::TRADE_DATE);
        Ok(txn)
    }
}

#[async_trait]
impl TransactionSource for PgTransactionActivityRepository {
    fn name(&self) -> &str {
        self.name
    }

    async fn get(
        &self,
        portfolio_code: &str,
        range: DateRange,
    ) -> Result<Vec<Transaction>, PortError> {
        // Ordered by source transaction id so the grouping passes downstream
        // see legs in a deterministic order.
        let query = format!(
            r#"SELECT * FROM {table}
               WHERE portfolio_code = $1 AND "TradeDate" >= $2 AND "TradeDate" <= $3
               ORDER BY "PortfolioTransactionID""#,
            table = self.table
        );
        let rows = sqlx::query(&query)
            .bind(portfolio_code)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
        debug!(
            repository = self.name,
            portfolio_code,
            rows = rows.len(),
            "fetched activity"
        );
        rows.iter()
            .map(|row| self.transaction_from_row(row))
            .collect()
    }
}

#[async_trait]
impl TransactionSink for PgTransactionActivityRepository {
    fn name(&self) -> &str {
        self.name
    }

    /// Replaces each batch key's rows, then bulk-inserts the batch.
    async fn create(&self, transactions: &[Transaction]) -> Result<u64, PortError> {
        let mut keys = BTreeSet::new();
        let mut columns = BTreeSet::new();
        for txn in transactions {
            match (&txn.portfolio_code, txn.trade_date_original) {
                (Some(code), Some(date)) => {
                    keys.insert((code.clone(), date));
                }
                _ => {
                    return Err(PortError::Transformation(format!(
                        "transaction is missing its identity columns: {txn}"
                    )))
                }
            }
            for (key, _) in txn.fields() {
                columns.insert(key.to_string());
            }
        }
        if keys.is_empty() {
            return Err(PortError::storage(self.name, "refusing to write an empty batch"));
        }

        let mut db_txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;

        let delete = format!(
            "DELETE FROM {table} WHERE portfolio_code = $1 AND close_date = $2",
            table = self.table
        );
        for (code, date) in &keys {
            let deleted = sqlx::query(&delete)
                .bind(code.as_str())
                .bind(*date)
                .execute(&mut *db_txn)
                .await
                .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
            debug!(
                repository = self.name,
                portfolio_code = %code,
                close_date = %date,
                rows = deleted.rows_affected(),
                "deleted stale batch"
            );
        }

        let mut insert = QueryBuilder::new(format!(
            "INSERT INTO {table} (portfolio_code, close_date, modified_by, modified_at",
            table = self.table
        ));
        for column in &columns {
            let ident = quote_ident(column).map_err(|e| e.into_port(self.name))?;
            insert.push(format!(", {ident}"));
        }
        insert.push(") ");
        let now = Utc::now();
        insert.push_values(transactions, |mut values, txn| {
            values.push_bind(txn.portfolio_code.clone());
            values.push_bind(txn.trade_date_original);
            values.push_bind(txn.modified_by.clone());
            values.push_bind(now);
            for column in &columns {
                push_field(&mut values, txn.get(column));
            }
        });
        let inserted = insert
            .build()
            .execute(&mut *db_txn)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;

        db_txn
            .commit()
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name))?;
        info!(
            repository = self.name,
            rows = inserted.rows_affected(),
            batches = keys.len(),
            "persisted activity"
        );
        Ok(inserted.rows_affected())
    }
}
