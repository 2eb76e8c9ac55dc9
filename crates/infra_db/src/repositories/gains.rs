//! Realized gain/loss figures computed by the upstream accounting system.

use std::collections::HashMap;

use async_trait::async_trait;
use core_kernel::{DateRange, PortError, RealizedGainSource};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::DatabaseError;

pub struct PgRealizedGainRepository {
    pool: PgPool,
    table: &'static str,
}

impl PgRealizedGainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table: "realized_gain_loss",
        }
    }
}

#[async_trait]
impl RealizedGainSource for PgRealizedGainRepository {
    async fn get(
        &self,
        portfolio_code: &str,
        range: DateRange,
    ) -> Result<HashMap<Decimal, Decimal>, PortError> {
        // Gains are keyed by close date upstream; casts keep the decode
        // independent of the feed's integer/numeric column choices.
        let query = format!(
            r#"SELECT "PortfolioTransactionID"::numeric AS portfolio_transaction_id,
                      "RealizedGainLoss"::numeric AS realized_gain_loss
               FROM {table}
               WHERE portfolio_code = $1 AND "CloseDate" >= $2 AND "CloseDate" <= $3"#,
            table = self.table
        );
        let rows = sqlx::query(&query)
            .bind(portfolio_code)
            .bind(range.from)
            .bind(range.to)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DatabaseError::from(&e).into_port("realized_gains"))?;
        let mut gains = HashMap::with_capacity(rows.len());
        for row in &rows {
            let id: Option<Decimal> = row
                .try_get("portfolio_transaction_id")
                .map_err(|e| DatabaseError::from(&e).into_port("realized_gains"))?;
            let gain: Option<Decimal> = row
                .try_get("realized_gain_loss")
                .map_err(|e| DatabaseError::from(&e).into_port("realized_gains"))?;
            if let (Some(id), Some(gain)) = (id, gain) {
                gains.insert(id, gain);
            }
        }
        debug!(portfolio_code, gains = gains.len(), "fetched realized gains");
        Ok(gains)
    }
}
