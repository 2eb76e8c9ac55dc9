//! Core Kernel - Foundational types for the transaction summary system
//!
//! This crate provides the fundamental building blocks used across all domain modules:
//! - The dynamic, lineage-carrying `Transaction` record
//! - Typed field values and the canonical field-name vocabulary
//! - The closed transaction-code enumeration
//! - Processing-queue primitives and repository ports

pub mod codes;
pub mod fields;
pub mod ports;
pub mod queue;
pub mod temporal;
pub mod transaction;

pub use codes::TransactionCode;
pub use fields::{field, FieldValue};
pub use ports::{
    DateRange, PortError, ProcessingQueue, RealizedGainSource, TransactionSink, TransactionSource,
};
pub use queue::{QueueItem, QueueStatus};
pub use temporal::{compact_date, is_business_day, previous_business_day};
pub use transaction::{LineageEntry, Transaction};
