//! Queue-driven engine orchestration.
//!
//! An [`EngineRunner`] drains PENDING items from its source queue, claims
//! each with a compare-and-swap to IN_PROGRESS, hands it to its engine,
//! persists the result and seeds the follow-on queues. Losing the claim
//! race is normal when several workers poll the same queue. A processing
//! failure propagates and leaves the item IN_PROGRESS for the operator.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Days;
use core_kernel::{
    field, DateRange, ProcessingQueue, QueueItem, QueueStatus, RealizedGainSource, Transaction,
    TransactionCode, TransactionSink, TransactionSource,
};
use domain_enrichment::SupplementaryLookup;
use tracing::{debug, info};

use crate::cleanup;
use crate::dividend::{DividendMergeResolver, HISTORY_WINDOW_DAYS};
use crate::error::EngineError;
use crate::netting::net_deposits_withdrawals;
use crate::rules::{apply_rules, Disposition};

/// Turns one claimed queue item into a batch of output transactions.
#[async_trait]
pub trait ProcessingEngine: Send + Sync {
    /// Short engine name, used in logs and queue claims.
    fn name(&self) -> &str;

    /// Audit identity stamped onto every produced transaction.
    fn modified_by(&self) -> &str;

    async fn process(&self, item: &QueueItem) -> Result<Vec<Transaction>, EngineError>;
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub items_claimed: usize,
    pub transactions_written: u64,
}

pub struct EngineRunner {
    engine: Arc<dyn ProcessingEngine>,
    source_queue: Arc<dyn ProcessingQueue>,
    sinks: Vec<Arc<dyn TransactionSink>>,
    next_queues: Vec<Arc<dyn ProcessingQueue>>,
}

impl EngineRunner {
    pub fn new(engine: Arc<dyn ProcessingEngine>, source_queue: Arc<dyn ProcessingQueue>) -> Self {
        Self {
            engine,
            source_queue,
            sinks: Vec::new(),
            next_queues: Vec::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TransactionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_next_queue(mut self, queue: Arc<dyn ProcessingQueue>) -> Self {
        self.next_queues.push(queue);
        self
    }

    /// One polling pass: claim and process every PENDING item.
    pub async fn run(&self) -> Result<RunSummary, EngineError> {
        let items = self.source_queue.get(QueueStatus::Pending).await?;
        if items.is_empty() {
            debug!(queue = self.source_queue.name(), "no pending work");
        }
        let mut summary = RunSummary::default();
        for item in items {
            let claimed = self
                .source_queue
                .update_status(&item, QueueStatus::InProgress, QueueStatus::Pending)
                .await?;
            if claimed == 0 {
                debug!(item = %item, "another worker claimed this item");
                continue;
            }
            summary.items_claimed += 1;
            info!(item = %item, engine = self.engine.name(), "processing queue item");

            let mut transactions = self.engine.process(&item).await?;
            if transactions.is_empty() {
                // A day with no surviving activity still writes one row so
                // the delete-then-insert sink replaces any stale batch.
                info!(item = %item, "no transactions produced; writing placeholder");
                transactions.push(self.placeholder(&item));
            }
            for sink in &self.sinks {
                let rows = sink.create(&transactions).await?;
                info!(sink = sink.name(), rows, "persisted batch");
                summary.transactions_written += rows;
            }
            for queue in &self.next_queues {
                let next = QueueItem::pending(item.portfolio_code.clone(), item.trade_date);
                queue.create(&next).await?;
                debug!(queue = queue.name(), item = %next, "enqueued follow-on work");
            }
            self.source_queue
                .update_status(&item, QueueStatus::Success, QueueStatus::InProgress)
                .await?;
        }
        Ok(summary)
    }

    fn placeholder(&self, item: &QueueItem) -> Transaction {
        let mut txn = Transaction::new();
        txn.portfolio_code = Some(item.portfolio_code.clone());
        txn.trade_date = Some(item.trade_date);
        txn.trade_date_original = Some(item.trade_date);
        txn.modified_by = Some(self.engine.modified_by().to_string());
        txn.add_lineage("placeholder", format!("No activity for {item}"));
        txn
    }
}

/// Copies source activity through unchanged, stamping identity and lineage.
pub struct PassthroughEngine {
    source: Arc<dyn TransactionSource>,
    modified_by: String,
}

impl PassthroughEngine {
    pub fn new(source: Arc<dyn TransactionSource>, modified_by: impl Into<String>) -> Self {
        Self {
            source,
            modified_by: modified_by.into(),
        }
    }
}

#[async_trait]
impl ProcessingEngine for PassthroughEngine {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn modified_by(&self) -> &str {
        &self.modified_by
    }

    async fn process(&self, item: &QueueItem) -> Result<Vec<Transaction>, EngineError> {
        let mut batch = self
            .source
            .get(&item.portfolio_code, DateRange::single(item.trade_date))
            .await?;
        for txn in &mut batch {
            txn.portfolio_code = Some(item.portfolio_code.clone());
            txn.trade_date = txn.date(field::TRADE_DATE).or(Some(item.trade_date));
            txn.trade_date_original = Some(item.trade_date);
            txn.modified_by = Some(self.modified_by.clone());
            txn.add_lineage("passthrough", format!("Loaded from {}", self.source.name()));
        }
        Ok(batch)
    }
}

/// The normalization engine: dividend merge, enrichment, the rule pass,
/// netting and cleanup, in that order.
pub struct SummaryEngine {
    source: Arc<dyn TransactionSource>,
    realized_gains: Arc<dyn RealizedGainSource>,
    preprocessing: Vec<Arc<dyn SupplementaryLookup>>,
    prior_cost: Arc<dyn SupplementaryLookup>,
    resolver: DividendMergeResolver,
    modified_by: String,
}

impl SummaryEngine {
    pub fn new(
        source: Arc<dyn TransactionSource>,
        realized_gains: Arc<dyn RealizedGainSource>,
        preprocessing: Vec<Arc<dyn SupplementaryLookup>>,
        prior_cost: Arc<dyn SupplementaryLookup>,
        modified_by: impl Into<String>,
    ) -> Self {
        Self {
            source,
            realized_gains,
            preprocessing,
            prior_cost,
            resolver: DividendMergeResolver::default(),
            modified_by: modified_by.into(),
        }
    }

    fn needs_prior_cost(txn: &Transaction) -> bool {
        let code = txn.code();
        (code == TransactionCode::Sell
            && txn.text(field::SEC_TYPE_BASE_CODE1) == Some("st"))
            || code == TransactionCode::LongOut
    }

    /// Runs enrichment, rules, netting and cleanup over an already-selected
    /// batch. Spawned records do not re-enter the rule pass.
    pub async fn process_batch(
        &self,
        item: &QueueItem,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<Transaction>, EngineError> {
        let mut kept = Vec::with_capacity(transactions.len());
        for mut txn in transactions {
            txn.trade_date_original = txn.date(field::TRADE_DATE);
            for lookup in &self.preprocessing {
                lookup.supplement(&mut txn).await?;
            }
            if Self::needs_prior_cost(&txn) {
                self.prior_cost.supplement(&mut txn).await?;
            }
            match apply_rules(&mut txn)? {
                Disposition::Keep => kept.push(txn),
                Disposition::Drop(reason) => {
                    debug!(transaction = %txn, reason = %reason, "dropped by rules");
                }
                Disposition::Spawn(spawned) => {
                    kept.push(txn);
                    kept.push(*spawned);
                }
            }
        }
        let mut netted = net_deposits_withdrawals(kept);
        for txn in &mut netted {
            cleanup::finalize(txn, item, &self.modified_by);
        }
        Ok(netted)
    }
}

#[async_trait]
impl ProcessingEngine for SummaryEngine {
    fn name(&self) -> &str {
        "summary"
    }

    fn modified_by(&self) -> &str {
        &self.modified_by
    }

    async fn process(&self, item: &QueueItem) -> Result<Vec<Transaction>, EngineError> {
        let lookback_start = item
            .trade_date
            .checked_sub_days(Days::new(HISTORY_WINDOW_DAYS))
            .unwrap_or(item.trade_date);
        let fetch_range = DateRange::new(lookback_start, item.trade_date);
        let raw = self
            .source
            .get(&item.portfolio_code, fetch_range)
            .await?;
        let gains = self
            .realized_gains
            .get(&item.portfolio_code, fetch_range)
            .await?;
        debug!(
            raw = raw.len(),
            gains = gains.len(),
            item = %item,
            "fetched activity with dividend lookback"
        );
        let window = DateRange::single(item.trade_date);
        let selected = self.resolver.resolve(raw, &window, &gains);
        self.process_batch(item, selected).await
    }
}
