//! Processing-queue primitives
//!
//! A queue item is one unit of pipeline work keyed by (portfolio, trade date).
//! Items are created PENDING by an upstream producer, claimed via a
//! compare-and-swap to IN_PROGRESS, and flipped to SUCCESS once the pipeline
//! pass and durable write complete. There is no automatic transition out of
//! IN_PROGRESS on failure: a crashed worker leaves the item stuck until an
//! operator resets it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    Pending,
    InProgress,
    Success,
    Fail,
    Unknown,
}

impl QueueStatus {
    /// The status column value as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::InProgress => "IN_PROGRESS",
            QueueStatus::Success => "SUCCESS",
            QueueStatus::Fail => "FAIL",
            QueueStatus::Unknown => "UNKNOWN",
        }
    }

    /// Parses a stored status value; anything unrecognized maps to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PENDING" => QueueStatus::Pending,
            "IN_PROGRESS" => QueueStatus::InProgress,
            "SUCCESS" => QueueStatus::Success,
            "FAIL" => QueueStatus::Fail,
            _ => QueueStatus::Unknown,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of pipeline work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub portfolio_code: String,
    pub trade_date: NaiveDate,
    pub status: QueueStatus,
}

impl QueueItem {
    /// Creates a new PENDING work item.
    pub fn pending(portfolio_code: impl Into<String>, trade_date: NaiveDate) -> Self {
        Self {
            portfolio_code: portfolio_code.into(),
            trade_date,
            status: QueueStatus::Pending,
        }
    }
}

impl fmt::Display for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}]",
            self.portfolio_code, self.trade_date, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::InProgress,
            QueueStatus::Success,
            QueueStatus::Fail,
            QueueStatus::Unknown,
        ] {
            assert_eq!(QueueStatus::parse(status.as_str()), status);
        }
    }

    #[test]
    fn test_unrecognized_status_maps_to_unknown() {
        assert_eq!(QueueStatus::parse("retrying"), QueueStatus::Unknown);
    }

    #[test]
    fn test_pending_constructor() {
        let item = QueueItem::pending("ABC123", NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(item.status, QueueStatus::Pending);
        assert_eq!(item.to_string(), "ABC123 2024-05-01 [PENDING]");
    }
}
