//! Wiring of repositories, lookups and processing stages.
//!
//! Each lookup cache is fed by a [`SqlLookupSource`] pointed at its table or
//! view; the caches register with a [`LookupRegistry`] so refresh
//! notifications and the periodic bulk reload reach them by name. The two
//! processing stages chain through their queues: the pass-through stage
//! copies the raw feed into the activity store and seeds the summary queue,
//! the summary stage normalizes and seeds the delivery queue.

use std::sync::Arc;

use domain_enrichment::{
    CurrencyLookup, CustodianLookup, FxRateLookup, LookupRegistry, PortfolioMasterLookup,
    PriorCostLookup, RealizedGainLookup, SecurityMasterLookup, SupplementaryLookup,
};
use domain_pipeline::{EngineRunner, PassthroughEngine, SummaryEngine};
use infra_db::{
    PgProcessingQueueRepository, PgRealizedGainRepository, PgTransactionActivityRepository,
    PgTransactionSummaryRepository, SqlLookupSource,
};
use sqlx::PgPool;

pub struct Lookups {
    pub registry: LookupRegistry,
    pub preprocessing: Vec<Arc<dyn SupplementaryLookup>>,
    pub prior_cost: Arc<dyn SupplementaryLookup>,
}

/// Builds every lookup against its backing table and registers the cached
/// ones. Application order matters: the currency lookup reads columns the
/// portfolio master supplement writes.
pub fn build_lookups(pool: &PgPool) -> Lookups {
    let source = |name: &str, table: &str| {
        Arc::new(SqlLookupSource::new(pool.clone(), name, table)) as Arc<dyn domain_enrichment::LookupSource>
    };

    let security = Arc::new(SecurityMasterLookup::new(source(
        "security_master",
        "security_master",
    )));
    let portfolio = Arc::new(PortfolioMasterLookup::new(source(
        "portfolio_master",
        "portfolio_master",
    )));
    let currency = Arc::new(CurrencyLookup::new(source("currency", "currency")));
    let custodian = Arc::new(CustodianLookup::new(source("custodian", "custodian")));
    let fx = FxRateLookup::new(source("fx_rate", "fx_rate"));
    let realized_gain = Arc::new(RealizedGainLookup::new(source(
        "realized_gain",
        "realized_gain_loss",
    )));
    let prior_cost = Arc::new(PriorCostLookup::new(source(
        "prior_cost",
        "portfolio_appraisal",
    )));

    let mut registry = LookupRegistry::new();
    registry.register(security.cache());
    registry.register(portfolio.cache());
    registry.register(currency.cache());
    registry.register(custodian.cache());
    registry.register(fx.cache());

    Lookups {
        registry,
        preprocessing: vec![security, portfolio, currency, custodian, realized_gain],
        prior_cost,
    }
}

pub struct Stages {
    pub activity: EngineRunner,
    pub summary: EngineRunner,
}

/// Wires the two queue-driven stages over one connection pool.
pub fn build_stages(pool: &PgPool, lookups: Lookups, worker_name: &str) -> (Stages, LookupRegistry) {
    let raw = Arc::new(PgTransactionActivityRepository::raw(pool.clone()));
    let store_sink = Arc::new(PgTransactionActivityRepository::store(pool.clone()));
    let store_source = Arc::new(PgTransactionActivityRepository::store(pool.clone()));
    let gains = Arc::new(PgRealizedGainRepository::new(pool.clone()));

    let activity_queue = Arc::new(PgProcessingQueueRepository::activity(
        pool.clone(),
        worker_name,
    ));
    let summary_queue = Arc::new(PgProcessingQueueRepository::summary(
        pool.clone(),
        worker_name,
    ));
    let delivery_queue = Arc::new(PgProcessingQueueRepository::delivery(
        pool.clone(),
        worker_name,
    ));

    let activity = EngineRunner::new(
        Arc::new(PassthroughEngine::new(raw, worker_name)),
        activity_queue,
    )
    .with_sink(store_sink)
    .with_next_queue(summary_queue.clone());

    let summary_engine = SummaryEngine::new(
        store_source,
        gains,
        lookups.preprocessing,
        lookups.prior_cost,
        worker_name,
    );
    let summary = EngineRunner::new(Arc::new(summary_engine), summary_queue)
        .with_sink(Arc::new(PgTransactionSummaryRepository::new(pool.clone())))
        .with_next_queue(delivery_queue);

    (Stages { activity, summary }, lookups.registry)
}
