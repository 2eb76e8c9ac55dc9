//! PostgreSQL implementations of the core repository ports.

pub mod activity;
pub mod gains;
pub mod queue;
pub mod summary;

pub use activity::PgTransactionActivityRepository;
pub use gains::PgRealizedGainRepository;
pub use queue::PgProcessingQueueRepository;
pub use summary::PgTransactionSummaryRepository;
