//! Worker process bootstrap: configuration and stage wiring.

pub mod bootstrap;
pub mod config;

pub use config::WorkerConfig;
