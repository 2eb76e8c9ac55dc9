//! PostgreSQL infrastructure layer.
//!
//! Implements the repository ports from `core_kernel` and the lookup source
//! port from `domain_enrichment` over SQLx. Feed tables keep the upstream
//! accounting vocabulary as quoted mixed-case columns; queue and summary
//! tables use a fixed snake_case schema. All queries are runtime-checked.

pub mod decode;
pub mod error;
pub mod pool;
pub mod repositories;
pub mod sources;

pub use error::DatabaseError;
pub use pool::{create_pool, create_pool_from_url, DatabaseConfig, DatabasePool};
pub use repositories::{
    PgProcessingQueueRepository, PgRealizedGainRepository, PgTransactionActivityRepository,
    PgTransactionSummaryRepository,
};
pub use sources::SqlLookupSource;
