//! Client-facing transaction summary sink.
//!
//! Unlike the activity store, the summary table has a fixed reporting schema:
//! each output field maps to a named snake_case column. The batch key is
//! `(portfolio_code, trade_date_original)` and writes are delete-then-insert,
//! which is what makes reprocessing a day idempotent.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Utc;
use core_kernel::{field, PortError, Transaction, TransactionSink};
use sqlx::{PgPool, QueryBuilder};
use tracing::{debug, info};

use crate::decode::push_field;
use crate::error::DatabaseError;

/// Output field to summary column, in persisted column order.
const SUMMARY_COLUMNS: [(&str, &str); 41] = [
    (field::TRANSACTION_CODE, "tran_code"),
    (field::TRADE_DATE, "trade_date"),
    (field::SETTLE_DATE, "settle_date"),
    (field::PORTFOLIO_NAME, "portfolio_name"),
    (field::SYMBOL, "symbol"),
    (field::SYMBOL1, "symbol1"),
    (field::SYMBOL2, "symbol2"),
    (field::SECURITY_ID1, "security_id1"),
    (field::SECURITY_ID2, "security_id2"),
    (field::SEC_TYPE_CODE1, "sectype1"),
    (field::SEC_TYPE_CODE2, "sectype2"),
    (field::NAME4STMT, "name4stmt"),
    (field::QUANTITY, "quantity"),
    (field::TRADE_AMOUNT, "trade_amount"),
    (field::TRADE_AMOUNT_LOCAL, "trade_amount_local"),
    (field::CASH_FLOW, "cash_flow"),
    (field::BROKER_NAME, "broker_name"),
    (field::CUSTODIAN_NAME, "custodian_name"),
    (field::PRICE_PER_UNIT, "price_per_unit"),
    (field::COMMISSION, "commission"),
    (field::NET_INTEREST, "net_interest"),
    (field::NET_DIVIDEND, "net_dividend"),
    (field::NET_ELIG_DIVIDEND, "net_elig_dividend"),
    (field::NET_NON_ELIG_DIVIDEND, "net_non_elig_dividend"),
    (field::NET_FGN_INCOME, "net_fgn_income"),
    (field::CAP_GAINS_DISTRIB, "cap_gains_distrib"),
    (field::RET_OF_CAPITAL, "net_return_of_capital"),
    (field::TOTAL_INCOME, "tot_income"),
    (field::REALIZED_GAIN, "realized_gain"),
    (field::TFSA_CONTRIB_AMT, "tfsa_contrib_amt"),
    (field::RSP_CONTRIB_AMT, "rsp_contrib_amt"),
    (field::COST_PER_UNIT, "cost_per_unit"),
    (field::COST_PER_UNIT_LOCAL, "cost_per_unit_local"),
    (field::COST_BASIS, "total_cost"),
    (field::COST_BASIS_LOCAL, "total_cost_local"),
    (field::FX_RATE, "fx_rate"),
    (field::PRINCIPAL_CURRENCY_ISO_CODE1, "fx_denom_ccy"),
    (field::REPORTING_CURRENCY_ISO_CODE, "fx_numer_ccy"),
    (field::WH_FED_TAX_AMT, "whfedtax_amt"),
    (field::WH_NR_TAX_AMT, "whnrtax_amt"),
    (field::LOCAL_TRAN_KEY, "local_tran_key"),
];

/// Descriptive columns persisted alongside the facts.
const SUMMARY_TEXT_COLUMNS: [(&str, &str); 4] = [
    (field::TRANSACTION_NAME, "tran_desc"),
    (field::COMMENT01, "comment01"),
    (field::SECTION_DESC, "section_desc"),
    (field::STMT_TRAN_DESC, "stmt_tran_desc"),
];

pub struct PgTransactionSummaryRepository {
    pool: PgPool,
    table: &'static str,
}

impl PgTransactionSummaryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: "transaction_summary",
        }
    }
}

#[async_trait]
impl TransactionSink for PgTransactionSummaryRepository {
    fn name(&self) -> &str {
        "transaction_summary"
    }

    async fn create(&self, transactions: &[Transaction]) -> Result<u64, PortError> {
        let mut keys = BTreeSet::new();
        for txn in transactions {
            match (&txn.portfolio_code, txn.trade_date_original) {
                (Some(code), Some(date)) => {
                    keys.insert((code.clone(), date));
                }
                _ => {
                    return Err(PortError::Transformation(format!(
                        "summary row is missing its identity columns: {txn}"
                    )))
                }
            }
        }
        if keys.is_empty() {
            return Err(PortError::storage(
                self.name(),
                "refusing to write an empty batch",
            ));
        }

        let mut db_txn = self
            .pool
            .begin()
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name()))?;

        let delete = format!(
            "DELETE FROM {table} WHERE portfolio_code = $1 AND trade_date_original = $2",
            table = self.table
        );
        for (code, date) in &keys {
            let deleted = sqlx::query(&delete)
                .bind(code.as_str())
                .bind(*date)
                .execute(&mut *db_txn)
                .await
                .map_err(|e| DatabaseError::from(&e).into_port(self.name()))?;
            debug!(
                portfolio_code = %code,
                trade_date_original = %date,
                rows = deleted.rows_affected(),
                "deleted stale summary batch"
            );
        }

        let mut insert = QueryBuilder::new(format!(
            "INSERT INTO {table} (portfolio_code, trade_date_original, modified_by, modified_at, lineage",
            table = self.table
        ));
        for (_, column) in SUMMARY_COLUMNS.iter().chain(SUMMARY_TEXT_COLUMNS.iter()) {
            insert.push(format!(", {column}"));
        }
        insert.push(") ");
        let now = Utc::now();
        insert.push_values(transactions, |mut values, txn| {
            values.push_bind(txn.portfolio_code.clone());
            values.push_bind(txn.trade_date_original);
            values.push_bind(txn.modified_by.clone());
            values.push_bind(now);
            values.push_bind(txn.lineage_text());
            for (field_name, _) in SUMMARY_COLUMNS.iter().chain(SUMMARY_TEXT_COLUMNS.iter()) {
                push_field(&mut values, txn.get(field_name));
            }
        });
        let inserted = insert
            .build()
            .execute(&mut *db_txn)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name()))?;

        db_txn
            .commit()
            .await
            .map_err(|e| DatabaseError::from(&e).into_port(self.name()))?;
        info!(
            rows = inserted.rows_affected(),
            batches = keys.len(),
            "persisted summary"
        );
        Ok(inserted.rows_affected())
    }
}
