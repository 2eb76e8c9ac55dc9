//! Transaction normalization pipeline.
//!
//! Raw accounting activity is turned into client-ready summary rows in
//! stages: dividend settlement merge, reference-data enrichment, the
//! ordered rule pass, deposit/withdrawal netting and a final cleanup pass.
//! The whole thing is driven by durable work queues, one item per
//! portfolio and trade date.

pub mod cleanup;
pub mod dividend;
pub mod engine;
pub mod error;
pub mod maturity;
pub mod netting;
pub mod rules;

pub use dividend::{DividendMergeResolver, HISTORY_WINDOW_DAYS};
pub use engine::{EngineRunner, PassthroughEngine, ProcessingEngine, RunSummary, SummaryEngine};
pub use error::{EngineError, PipelineError};
pub use maturity::split_fixed_income_maturity;
pub use netting::net_deposits_withdrawals;
pub use rules::{apply_rules, build_local_tran_key, Disposition};
