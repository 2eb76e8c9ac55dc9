//! Shared test helpers: transaction builders and in-memory port fakes.

pub mod builders;
pub mod fakes;

pub use builders::{date, TransactionBuilder};
pub use fakes::{
    InMemoryGains, InMemoryQueue, InMemorySink, InMemorySource, NoopLookup, StaticLookup,
};
