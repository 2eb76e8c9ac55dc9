//! Supplementary lookup caches.
//!
//! Raw transaction activity arrives with identifiers only. Before the
//! normalization rules run, each transaction is enriched from a set of
//! reference-data lookups: security master, portfolio master, currency
//! ISO codes, FX rates, and custodian names. Most lookups are loaded in
//! bulk at startup and refreshed point-wise when reference data changes;
//! the FX rate cache refreshes lazily on a miss.

pub mod cache;
pub mod error;
pub mod lookups;
pub mod notifications;
pub mod registry;

pub use cache::{LookupCache, LookupRow, LookupSource};
pub use error::LookupError;
pub use lookups::{
    CurrencyLookup, CustodianLookup, FxRateLookup, PortfolioMasterLookup, PriorCostLookup,
    RealizedGainLookup, SecurityMasterLookup, SupplementaryLookup,
};
pub use notifications::RefreshNotification;
pub use registry::LookupRegistry;
