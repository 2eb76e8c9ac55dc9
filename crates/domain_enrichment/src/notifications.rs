//! Change-data refresh notifications.
//!
//! When reference data changes upstream, a notification names the cache and
//! the key values of the changed rows. An empty key set requests a full
//! reload of the cache.

use std::collections::BTreeMap;

use core_kernel::FieldValue;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshNotification {
    /// Registered cache name, e.g. `security_master`.
    pub cache: String,
    /// Key column values identifying the changed rows.
    #[serde(default)]
    pub keys: BTreeMap<String, FieldValue>,
}

impl RefreshNotification {
    pub fn new(cache: impl Into<String>) -> Self {
        Self {
            cache: cache.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn with_key(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.keys.insert(column.into(), value.into());
        self
    }

    pub fn from_json(payload: &str) -> Result<Self, LookupError> {
        serde_json::from_str(payload).map_err(|e| LookupError::Malformed(e.to_string()))
    }

    pub fn params(&self) -> Vec<(String, FieldValue)> {
        self.keys
            .iter()
            .map(|(col, value)| (col.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_keyed_notification() {
        let payload = r#"{"cache":"security_master","keys":{"SecurityID":{"number":"100"}}}"#;
        let n = RefreshNotification::from_json(payload).unwrap();
        assert_eq!(n.cache, "security_master");
        assert_eq!(n.params().len(), 1);
    }

    #[test]
    fn test_missing_keys_default_to_full_reload() {
        let n = RefreshNotification::from_json(r#"{"cache":"currency"}"#).unwrap();
        assert!(n.params().is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(matches!(
            RefreshNotification::from_json("not json"),
            Err(LookupError::Malformed(_))
        ));
    }
}
