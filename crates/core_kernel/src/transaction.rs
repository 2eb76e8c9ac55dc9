//! The dynamic transaction record and its lineage log
//!
//! A `Transaction` is one ledger event in flight through the normalization
//! pipeline. Identity fields that every stage needs are first-class struct
//! members; everything else lives in the open attribute map. Every mutation
//! that changes output-visible state must append a lineage entry: the lineage
//! log is append-only and monotonically growing, for audit reproducibility.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::codes::TransactionCode;
use crate::fields::{field, FieldValue};

/// One provenance note, tagged with the producing stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    /// Identity of the rule or stage that made the mutation
    pub stage: String,
    /// Human-readable description of what changed and why
    pub note: String,
}

impl fmt::Display for LineageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.stage, self.note)
    }
}

/// A mutable, dynamically-keyed ledger event with an append-only lineage log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Portfolio the batch belongs to, stamped from the queue item
    pub portfolio_code: Option<String>,
    /// Working trade date (dividends are re-anchored to settle date)
    pub trade_date: Option<NaiveDate>,
    /// Trade date as keyed by the work queue, before any re-anchoring
    pub trade_date_original: Option<NaiveDate>,
    /// Producing process/engine identity, for the audit columns
    pub modified_by: Option<String>,
    fields: BTreeMap<String, FieldValue>,
    lineage: Vec<LineageEntry>,
}

impl Transaction {
    /// Creates an empty transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transaction from an iterator of field assignments.
    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut txn = Self::new();
        for (key, value) in fields {
            txn.fields.insert(key.into(), value.into());
        }
        txn
    }

    /// Raw access to a field value.
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// True when the field is present and not an explicit null.
    pub fn is_set(&self, key: &str) -> bool {
        self.fields.get(key).map(|v| !v.is_null()).unwrap_or(false)
    }

    /// True when the field is present, non-null, non-zero and non-empty
    /// (the source system's truthiness guard).
    pub fn is_truthy(&self, key: &str) -> bool {
        self.fields.get(key).map(FieldValue::is_truthy).unwrap_or(false)
    }

    /// Text content of a field, if set to text.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(FieldValue::as_text)
    }

    /// Text content, treating the empty string as absent.
    pub fn text_nonempty(&self, key: &str) -> Option<&str> {
        self.text(key).filter(|s| !s.is_empty())
    }

    /// Numeric content of a field, if set to a number.
    pub fn number(&self, key: &str) -> Option<Decimal> {
        self.fields.get(key).and_then(FieldValue::as_number)
    }

    /// Numeric content, defaulting absent/null to zero.
    pub fn number_or_zero(&self, key: &str) -> Decimal {
        self.number(key).unwrap_or(Decimal::ZERO)
    }

    /// Numeric content, treating zero as absent (falsy-guard semantics).
    pub fn nonzero(&self, key: &str) -> Option<Decimal> {
        self.number(key).filter(|n| !n.is_zero())
    }

    /// Date content of a field, if set to a date.
    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        self.fields.get(key).and_then(FieldValue::as_date)
    }

    /// Boolean content of a field; absent reads as false.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(FieldValue::Flag(true)))
    }

    /// Sets a field value.
    pub fn set(&mut self, key: &str, value: impl Into<FieldValue>) {
        self.fields.insert(key.to_string(), value.into());
    }

    /// Sets a field to the explicit null marker.
    pub fn set_null(&mut self, key: &str) {
        self.fields.insert(key.to_string(), FieldValue::Null);
    }

    /// Removes a field entirely.
    pub fn unset(&mut self, key: &str) {
        self.fields.remove(key);
    }

    /// Copies `from` onto `to` when `from` is present.
    pub fn copy_field(&mut self, from: &str, to: &str) {
        if let Some(value) = self.fields.get(from).cloned() {
            self.fields.insert(to.to_string(), value);
        }
    }

    /// Iterates over all fields in key order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The parsed transaction code; `Unknown("")` when unset.
    pub fn code(&self) -> TransactionCode {
        TransactionCode::parse(self.text(field::TRANSACTION_CODE).unwrap_or_default())
    }

    /// Writes the transaction code field.
    pub fn set_code(&mut self, code: &TransactionCode) {
        self.set(field::TRANSACTION_CODE, code.as_code());
    }

    /// Appends a provenance note. Lineage is append-only; entries are never
    /// rewritten or removed.
    pub fn add_lineage(&mut self, stage: &str, note: impl Into<String>) {
        self.lineage.push(LineageEntry {
            stage: stage.to_string(),
            note: note.into(),
        });
    }

    /// The full lineage log, oldest first.
    pub fn lineage(&self) -> &[LineageEntry] {
        &self.lineage
    }

    /// Lineage rendered as one line per entry, for persistence.
    pub fn lineage_text(&self) -> String {
        self.lineage
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} units of {} in {} on {}",
            self.text(field::TRANSACTION_CODE).unwrap_or("?"),
            self.number_or_zero(field::QUANTITY),
            self.number(field::SECURITY_ID1).map(|n| n.to_string()).unwrap_or_else(|| "?".into()),
            self.portfolio_code.as_deref().unwrap_or("?"),
            self.trade_date.map(|d| d.to_string()).unwrap_or_else(|| "?".into()),
        )
    }
}
