use std::sync::Arc;

use async_trait::async_trait;
use core_kernel::{
    field, PortError, ProcessingQueue, QueueItem, QueueStatus, TransactionCode,
};
use domain_pipeline::{EngineRunner, PassthroughEngine, SummaryEngine};
use rust_decimal_macros::dec;
use test_utils::{date, InMemoryGains, InMemoryQueue, InMemorySink, InMemorySource, NoopLookup, TransactionBuilder};

fn pending_item() -> QueueItem {
    QueueItem::pending("ABC123", date(2024, 3, 15))
}

#[tokio::test]
async fn runner_claims_processes_and_completes() {
    let source = Arc::new(InMemorySource::new(vec![TransactionBuilder::new("by")
        .on(date(2024, 3, 15))
        .amount(dec!(100))
        .build()]));
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(
        Arc::new(PassthroughEngine::new(source, "worker_activity")),
        queue.clone(),
    )
    .with_sink(sink.clone());

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.items_claimed, 1);
    assert_eq!(summary.transactions_written, 1);
    assert_eq!(queue.snapshot()[0].status, QueueStatus::Success);

    let batch = sink.batch("ABC123", date(2024, 3, 15)).unwrap();
    assert_eq!(batch.len(), 1);
    let txn = &batch[0];
    assert_eq!(txn.portfolio_code.as_deref(), Some("ABC123"));
    assert_eq!(txn.trade_date_original, Some(date(2024, 3, 15)));
    assert_eq!(txn.modified_by.as_deref(), Some("worker_activity"));
    assert!(txn.lineage_text().contains("Loaded from in_memory_source"));
}

/// A queue whose claims always fail, as if another worker got there first.
struct RacyQueue {
    inner: InMemoryQueue,
}

#[async_trait]
impl ProcessingQueue for RacyQueue {
    fn name(&self) -> &str {
        "racy_queue"
    }

    async fn get(&self, status: QueueStatus) -> Result<Vec<QueueItem>, PortError> {
        self.inner.get(status).await
    }

    async fn create(&self, item: &QueueItem) -> Result<u64, PortError> {
        self.inner.create(item).await
    }

    async fn update_status(
        &self,
        _item: &QueueItem,
        _new_status: QueueStatus,
        _expected_old: QueueStatus,
    ) -> Result<u64, PortError> {
        Ok(0)
    }
}

#[tokio::test]
async fn lost_claim_race_skips_the_item() {
    let source = Arc::new(InMemorySource::new(vec![TransactionBuilder::new("by")
        .on(date(2024, 3, 15))
        .build()]));
    let queue = Arc::new(RacyQueue {
        inner: InMemoryQueue::with_items(vec![pending_item()]),
    });
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(
        Arc::new(PassthroughEngine::new(source, "worker_activity")),
        queue,
    )
    .with_sink(sink.clone());

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.items_claimed, 0);
    assert_eq!(summary.transactions_written, 0);
    assert!(sink.all().is_empty());
}

#[tokio::test]
async fn empty_day_writes_a_placeholder_row() {
    let source = Arc::new(InMemorySource::default());
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(
        Arc::new(PassthroughEngine::new(source, "worker_activity")),
        queue.clone(),
    )
    .with_sink(sink.clone());

    runner.run().await.unwrap();

    let batch = sink.batch("ABC123", date(2024, 3, 15)).unwrap();
    assert_eq!(batch.len(), 1);
    let placeholder = &batch[0];
    assert_eq!(placeholder.portfolio_code.as_deref(), Some("ABC123"));
    assert_eq!(placeholder.trade_date_original, Some(date(2024, 3, 15)));
    assert_eq!(placeholder.modified_by.as_deref(), Some("worker_activity"));
    assert!(placeholder.lineage_text().contains("No activity"));
    assert_eq!(queue.snapshot()[0].status, QueueStatus::Success);
}

#[tokio::test]
async fn follow_on_queue_is_seeded_once() {
    let source = Arc::new(InMemorySource::default());
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let next = Arc::new(InMemoryQueue::new());
    let runner = EngineRunner::new(
        Arc::new(PassthroughEngine::new(source, "worker_activity")),
        queue.clone(),
    )
    .with_sink(Arc::new(InMemorySink::new()))
    .with_next_queue(next.clone());

    runner.run().await.unwrap();

    let seeded = next.snapshot();
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].portfolio_code, "ABC123");
    assert_eq!(seeded[0].trade_date, date(2024, 3, 15));
    assert_eq!(seeded[0].status, QueueStatus::Pending);

    // Reprocessing the same item must not duplicate the follow-on work.
    queue.force_status("ABC123", date(2024, 3, 15), QueueStatus::Pending);
    runner.run().await.unwrap();
    assert_eq!(next.snapshot().len(), 1);
}

#[tokio::test]
async fn reprocessing_replaces_the_persisted_batch() {
    let source = Arc::new(InMemorySource::new(vec![TransactionBuilder::new("by")
        .on(date(2024, 3, 15))
        .amount(dec!(100))
        .build()]));
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(
        Arc::new(PassthroughEngine::new(source, "worker_activity")),
        queue.clone(),
    )
    .with_sink(sink.clone());

    runner.run().await.unwrap();
    queue.force_status("ABC123", date(2024, 3, 15), QueueStatus::Pending);
    runner.run().await.unwrap();

    assert_eq!(sink.all().len(), 1, "second run replaces, not appends");
}

fn summary_engine(source: Arc<InMemorySource>) -> Arc<SummaryEngine> {
    Arc::new(SummaryEngine::new(
        source,
        Arc::new(InMemoryGains::default()),
        Vec::new(),
        Arc::new(NoopLookup),
        "worker_summary",
    ))
}

#[tokio::test]
async fn summary_engine_nets_client_cash_end_to_end() {
    let deposit = TransactionBuilder::new("dp")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("cash", "client")
        .security_ids(1, 5)
        .identity(111, 1, 1)
        .amount(dec!(100))
        .build();
    let withdrawal = TransactionBuilder::new("wd")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("cash", "client")
        .security_ids(1, 5)
        .identity(222, 2, 1)
        .amount(dec!(40))
        .build();
    let source = Arc::new(InMemorySource::new(vec![deposit, withdrawal]));
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(summary_engine(source), queue.clone())
        .with_sink(sink.clone());

    let summary = runner.run().await.unwrap();
    assert_eq!(summary.items_claimed, 1);

    let batch = sink.batch("ABC123", date(2024, 3, 15)).unwrap();
    assert_eq!(batch.len(), 1, "the two legs net to one deposit");
    let net = &batch[0];
    assert_eq!(net.code(), TransactionCode::Deposit);
    assert_eq!(net.number(field::TRADE_AMOUNT), Some(dec!(60)));
    assert_eq!(net.number(field::CASH_FLOW), Some(dec!(60)));
    assert_eq!(net.text(field::TRANSACTION_NAME), Some("Contribution"));
    assert_eq!(net.text(field::NAME4STMT), Some("CASH DEPOSIT"));
    assert!(!net.is_set(field::QUANTITY));
    assert_eq!(net.portfolio_code.as_deref(), Some("ABC123"));
    assert_eq!(net.trade_date_original, Some(date(2024, 3, 15)));
    assert_eq!(net.modified_by.as_deref(), Some("worker_summary"));
    assert!(net.lineage_text().contains("Aggregated 2 cash legs"));
    assert_eq!(queue.snapshot()[0].status, QueueStatus::Success);
}

#[tokio::test]
async fn summary_engine_drops_internal_wash_legs() {
    let wash = TransactionBuilder::new("wd")
        .on(date(2024, 3, 15))
        .portfolio("ABC123")
        .symbols("dvwash", "cash")
        .amount(dec!(12))
        .build();
    let source = Arc::new(InMemorySource::new(vec![wash]));
    let queue = Arc::new(InMemoryQueue::with_items(vec![pending_item()]));
    let sink = Arc::new(InMemorySink::new());
    let runner = EngineRunner::new(summary_engine(source), queue)
        .with_sink(sink.clone());

    runner.run().await.unwrap();

    // A day where everything washed away still gets its placeholder batch.
    let batch = sink.batch("ABC123", date(2024, 3, 15)).unwrap();
    assert_eq!(batch.len(), 1);
    assert!(batch[0].lineage_text().contains("No activity"));
}
