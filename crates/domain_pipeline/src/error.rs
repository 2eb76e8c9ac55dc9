//! Pipeline errors.

use core_kernel::PortError;
use domain_enrichment::LookupError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A rule needed a field the record does not carry. Raw activity rows
    /// always have trade and settle dates; their absence means bad input.
    #[error("transaction missing required field '{field}' ({context})")]
    MissingField { field: String, context: String },
}

impl PipelineError {
    pub fn missing_field(field: &str, context: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.to_string(),
            context: context.into(),
        }
    }
}

/// Failure of an engine run: storage, enrichment or the rules themselves.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Port(#[from] PortError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}
