//! SQL-backed lookup sources.
//!
//! Every reference-data cache is fed by the same adapter pointed at a
//! different table or view; the cache layer decides what to do with the
//! rows. An empty parameter list means a full load, otherwise each pair
//! becomes an equality predicate on the named column.

use async_trait::async_trait;
use core_kernel::FieldValue;
use domain_enrichment::{LookupError, LookupRow, LookupSource};
use sqlx::{PgPool, QueryBuilder};
use tracing::debug;

use crate::decode::{quote_ident, row_to_fields};

pub struct SqlLookupSource {
    pool: PgPool,
    name: String,
    table: String,
}

impl SqlLookupSource {
    pub fn new(pool: PgPool, name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            pool,
            name: name.into(),
            table: table.into(),
        }
    }
}

#[async_trait]
impl LookupSource for SqlLookupSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(
        &self,
        params: &[(String, FieldValue)],
    ) -> Result<Vec<LookupRow>, LookupError> {
        let mut query = QueryBuilder::new(format!("SELECT * FROM {}", self.table));
        for (i, (column, value)) in params.iter().enumerate() {
            // Key columns can arrive from refresh notifications, so they go
            // through identifier validation rather than straight into SQL.
            let ident = quote_ident(column)
                .map_err(|e| LookupError::Malformed(e.to_string()))?;
            query.push(if i == 0 { " WHERE " } else { " AND " });
            query.push(ident);
            match value {
                FieldValue::Text(v) => {
                    query.push(" = ").push_bind(v.clone());
                }
                FieldValue::Number(n) => {
                    query.push(" = ").push_bind(*n);
                }
                FieldValue::Date(d) => {
                    query.push(" = ").push_bind(*d);
                }
                FieldValue::Flag(b) => {
                    query.push(" = ").push_bind(*b);
                }
                FieldValue::Null => {
                    query.push(" IS NULL");
                }
            }
        }
        let rows = query
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LookupError::source(self.name.clone(), e.to_string()))?;
        debug!(
            lookup = %self.name,
            params = params.len(),
            rows = rows.len(),
            "fetched lookup rows"
        );
        rows.iter()
            .map(|row| row_to_fields(row).map_err(|e| LookupError::source(self.name.clone(), e.to_string())))
            .collect()
    }
}
