//! Keyed in-memory cache over an asynchronous reference-data source.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use core_kernel::FieldValue;
use tracing::debug;

use crate::error::LookupError;

/// A single row of reference data, column name to value.
pub type LookupRow = BTreeMap<String, FieldValue>;

/// Backing store for a lookup cache. An empty parameter list requests a
/// full load; parameters restrict the fetch to matching rows.
#[async_trait]
pub trait LookupSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(
        &self,
        params: &[(String, FieldValue)],
    ) -> Result<Vec<LookupRow>, LookupError>;
}

/// In-memory rows indexed by a composite key, loaded from a [`LookupSource`].
///
/// `refresh` replaces the whole cache; `refresh_where` evicts and reloads
/// only the rows matching the given parameters, which is how change-data
/// notifications are applied without a full reload.
pub struct LookupCache {
    name: String,
    key_columns: Vec<String>,
    relevant_columns: Vec<String>,
    source: Arc<dyn LookupSource>,
    lazy: bool,
    rows: RwLock<HashMap<Vec<FieldValue>, LookupRow>>,
}

impl LookupCache {
    pub fn new(
        name: impl Into<String>,
        key_columns: Vec<String>,
        relevant_columns: Vec<String>,
        source: Arc<dyn LookupSource>,
    ) -> Self {
        Self {
            name: name.into(),
            key_columns,
            relevant_columns,
            source,
            lazy: false,
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// A lazy cache is never bulk-loaded: the backing table is too large to
    /// hold in memory, so rows are pulled in key-wise on a miss instead.
    pub fn new_lazy(
        name: impl Into<String>,
        key_columns: Vec<String>,
        relevant_columns: Vec<String>,
        source: Arc<dyn LookupSource>,
    ) -> Self {
        Self {
            lazy: true,
            ..Self::new(name, key_columns, relevant_columns, source)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    fn key_of(&self, row: &LookupRow) -> Vec<FieldValue> {
        self.key_columns
            .iter()
            .map(|col| row.get(col).cloned().unwrap_or(FieldValue::Null))
            .collect()
    }

    fn project(&self, row: &LookupRow) -> LookupRow {
        if self.relevant_columns.is_empty() {
            return row.clone();
        }
        row.iter()
            .filter(|(col, _)| self.relevant_columns.iter().any(|c| c == *col))
            .map(|(col, value)| (col.clone(), value.clone()))
            .collect()
    }

    /// Replaces the entire cache with a fresh full load.
    pub async fn refresh(&self) -> Result<usize, LookupError> {
        if self.lazy {
            return Err(LookupError::unsupported(self.name.clone(), "bulk refresh"));
        }
        let fetched = self.source.fetch(&[]).await?;
        let mut rows = match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.clear();
        for row in fetched {
            let key = self.key_of(&row);
            rows.insert(key, row);
        }
        debug!(cache = %self.name, rows = rows.len(), "cache refreshed");
        Ok(rows.len())
    }

    /// Evicts rows matching `params` and reloads them from the source.
    /// Rows deleted upstream simply do not come back.
    pub async fn refresh_where(
        &self,
        params: &[(String, FieldValue)],
    ) -> Result<usize, LookupError> {
        let fetched = self.source.fetch(params).await?;
        let mut rows = match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.retain(|_, row| {
            !params
                .iter()
                .all(|(col, value)| row.get(col) == Some(value))
        });
        let reloaded = fetched.len();
        for row in fetched {
            let key = self.key_of(&row);
            rows.insert(key, row);
        }
        debug!(cache = %self.name, reloaded, "partial cache refresh");
        Ok(reloaded)
    }

    /// Returns the row under `key`, projected to the relevant columns.
    pub fn get(&self, key: &[FieldValue]) -> Option<LookupRow> {
        let rows = match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rows.get(key).map(|row| self.project(row))
    }

    pub fn len(&self) -> usize {
        match self.rows.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_kernel::field;
    use std::sync::Mutex;

    struct StaticSource {
        rows: Mutex<Vec<LookupRow>>,
    }

    impl StaticSource {
        fn new(rows: Vec<LookupRow>) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(rows),
            })
        }
    }

    #[async_trait]
    impl LookupSource for StaticSource {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch(
            &self,
            params: &[(String, FieldValue)],
        ) -> Result<Vec<LookupRow>, LookupError> {
            let rows = self.rows.lock().unwrap();
            Ok(rows
                .iter()
                .filter(|row| {
                    params
                        .iter()
                        .all(|(col, value)| row.get(col) == Some(value))
                })
                .cloned()
                .collect())
        }
    }

    fn security_row(id: i64, symbol: &str) -> LookupRow {
        let mut row = LookupRow::new();
        row.insert(field::SECURITY_ID.to_string(), FieldValue::from(id));
        row.insert(field::SYMBOL.to_string(), FieldValue::from(symbol));
        row.insert(field::FULL_NAME.to_string(), FieldValue::from("Some Security"));
        row
    }

    #[tokio::test]
    async fn refresh_loads_all_rows() {
        let source = StaticSource::new(vec![security_row(1, "AAA"), security_row(2, "BBB")]);
        let cache = LookupCache::new(
            "security",
            vec![field::SECURITY_ID.to_string()],
            vec![field::SYMBOL.to_string()],
            source,
        );
        assert!(cache.is_empty());
        let loaded = cache.refresh().await.unwrap();
        assert_eq!(loaded, 2);

        let row = cache.get(&[FieldValue::from(1)]).unwrap();
        assert_eq!(row.get(field::SYMBOL), Some(&FieldValue::from("AAA")));
        // Projection drops columns outside the relevant set.
        assert!(row.get(field::FULL_NAME).is_none());
    }

    #[tokio::test]
    async fn refresh_where_replaces_matching_rows_only() {
        let source = StaticSource::new(vec![security_row(1, "AAA"), security_row(2, "BBB")]);
        let cache = LookupCache::new(
            "security",
            vec![field::SECURITY_ID.to_string()],
            vec![],
            source.clone(),
        );
        cache.refresh().await.unwrap();

        {
            let mut rows = source.rows.lock().unwrap();
            rows[0] = security_row(1, "AAA2");
        }
        cache
            .refresh_where(&[(field::SECURITY_ID.to_string(), FieldValue::from(1))])
            .await
            .unwrap();

        let updated = cache.get(&[FieldValue::from(1)]).unwrap();
        assert_eq!(updated.get(field::SYMBOL), Some(&FieldValue::from("AAA2")));
        let untouched = cache.get(&[FieldValue::from(2)]).unwrap();
        assert_eq!(untouched.get(field::SYMBOL), Some(&FieldValue::from("BBB")));
    }

    #[tokio::test]
    async fn refresh_where_evicts_rows_deleted_upstream() {
        let source = StaticSource::new(vec![security_row(1, "AAA")]);
        let cache = LookupCache::new(
            "security",
            vec![field::SECURITY_ID.to_string()],
            vec![],
            source.clone(),
        );
        cache.refresh().await.unwrap();

        source.rows.lock().unwrap().clear();
        cache
            .refresh_where(&[(field::SECURITY_ID.to_string(), FieldValue::from(1))])
            .await
            .unwrap();
        assert!(cache.get(&[FieldValue::from(1)]).is_none());
    }

    #[tokio::test]
    async fn lazy_cache_refuses_bulk_refresh_but_fills_on_demand() {
        let source = StaticSource::new(vec![security_row(7, "GGG")]);
        let cache = LookupCache::new_lazy(
            "fx_rate",
            vec![field::SECURITY_ID.to_string()],
            vec![],
            source,
        );
        assert!(matches!(
            cache.refresh().await,
            Err(LookupError::Unsupported { .. })
        ));

        cache
            .refresh_where(&[(field::SECURITY_ID.to_string(), FieldValue::from(7))])
            .await
            .unwrap();
        assert!(cache.get(&[FieldValue::from(7)]).is_some());
    }

    #[test]
    fn missing_key_columns_key_as_null() {
        let mut row = LookupRow::new();
        row.insert("A".to_string(), FieldValue::from("x"));
        let cache = LookupCache::new(
            "partial",
            vec!["A".to_string(), "B".to_string()],
            vec![],
            StaticSource::new(vec![]),
        );
        let key = cache.key_of(&row);
        assert_eq!(key, vec![FieldValue::from("x"), FieldValue::Null]);
    }
}
