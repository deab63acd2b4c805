//! Worker pool scenarios against in-memory fakes.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use common::{item, t0, Batch, FakeModel, FakeSource, MemoryStore};
use cryptonews_core::{SourceKind, Stance};
use cryptonews_llm::LanguageModel;
use cryptonews_pipeline::{ItemStore, WorkerPool};
use cryptonews_sources::Source;
use tracing_test::traced_test;

const INTERVAL: Duration = Duration::from_secs(120);

struct Harness {
    pool: WorkerPool,
    source: Arc<FakeSource>,
    model: Arc<FakeModel>,
    store: Arc<MemoryStore>,
}

async fn harness(kind: SourceKind, batches: Vec<Batch>, model: FakeModel, workers: usize) -> Harness {
    let source = Arc::new(FakeSource::new(kind, batches));
    let model = Arc::new(model);
    let store = Arc::new(MemoryStore::default());
    let pool = WorkerPool::new(
        vec![Arc::clone(&source) as Arc<dyn Source>],
        Arc::clone(&model) as Arc<dyn LanguageModel>,
        Arc::clone(&store) as Arc<dyn ItemStore>,
        INTERVAL,
    );
    pool.start(workers).await;
    Harness {
        pool,
        source,
        model,
        store,
    }
}

async fn drain(h: &Harness) {
    tokio::time::timeout(Duration::from_secs(10), h.pool.join())
        .await
        .expect("queue should drain");
}

#[tokio::test]
async fn duplicate_text_in_one_batch_is_stored_once() {
    let batch = vec![
        item(SourceKind::Twitter, "1", "Bitcoin rallies", t0() + TimeDelta::minutes(1)),
        item(SourceKind::Twitter, "2", "Bitcoin rallies", t0() + TimeDelta::minutes(2)),
    ];
    let h = harness(SourceKind::Twitter, vec![Batch::Items(batch)], FakeModel::default(), 2).await;

    assert!(h.pool.enqueue("twitter", Some(t0())));
    drain(&h).await;

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].external_id, "1");
    assert!(rows[0].content_hash.is_some());
    assert_eq!(h.store.batch_calls(), 1, "one atomic upsert per job");
    assert_eq!(h.model.chats(), 1);
    h.pool.stop().await;
}

#[tokio::test]
async fn non_empty_batch_advances_watermark_to_latest_item() {
    let batch = vec![
        item(SourceKind::Reddit, "a", "ETH upgrade ships", t0() + TimeDelta::minutes(10)),
        item(SourceKind::Reddit, "b", "SOL outage", t0() + TimeDelta::minutes(5)),
    ];
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], FakeModel::default(), 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;

    assert_eq!(
        h.pool.watermark(SourceKind::Reddit),
        Some(t0() + TimeDelta::minutes(10))
    );
    assert_eq!(h.store.rows().len(), 2);
    h.pool.stop().await;
}

#[tokio::test]
async fn empty_batch_leaves_watermark_at_requested_since() {
    let h = harness(SourceKind::Reddit, vec![Batch::Items(Vec::new())], FakeModel::default(), 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;

    assert_eq!(h.pool.watermark(SourceKind::Reddit), Some(t0()));
    assert_eq!(h.store.batch_calls(), 0);
    h.pool.stop().await;
}

#[tokio::test]
async fn failed_fetch_keeps_watermark_and_worker_survives() {
    let later = item(SourceKind::Telegram, "c:1", "Fed holds rates", t0() + TimeDelta::hours(1));
    let h = harness(
        SourceKind::Telegram,
        vec![Batch::Fail("timeout".to_string()), Batch::Items(vec![later])],
        FakeModel::default(),
        1,
    )
    .await;

    h.pool.enqueue("telegram", Some(t0()));
    drain(&h).await;
    assert_eq!(h.pool.watermark(SourceKind::Telegram), Some(t0()));
    assert!(h.store.rows().is_empty());

    h.pool.enqueue("telegram", None);
    drain(&h).await;
    assert_eq!(
        h.pool.watermark(SourceKind::Telegram),
        Some(t0() + TimeDelta::hours(1))
    );
    assert_eq!(h.store.rows().len(), 1);
    h.pool.stop().await;
}

#[tokio::test]
async fn panicking_job_does_not_kill_the_worker() {
    let next = item(SourceKind::Twitter, "9", "BTC dominance rises", t0() + TimeDelta::minutes(3));
    let h = harness(
        SourceKind::Twitter,
        vec![Batch::Panic, Batch::Items(vec![next])],
        FakeModel::default(),
        1,
    )
    .await;

    h.pool.enqueue("twitter", Some(t0()));
    h.pool.enqueue("twitter", Some(t0()));
    drain(&h).await;

    assert_eq!(h.store.rows().len(), 1);
    h.pool.stop().await;
}

#[tokio::test]
async fn persistence_failure_keeps_watermark() {
    let batch = vec![item(SourceKind::Reddit, "x", "Gold hits record", t0() + TimeDelta::minutes(1))];
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], FakeModel::default(), 1).await;
    h.store.fail_writes.store(true, Ordering::SeqCst);

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;

    assert_eq!(h.pool.watermark(SourceKind::Reddit), Some(t0()));
    assert_eq!(h.store.batch_calls(), 1);
    h.pool.stop().await;
}

#[tokio::test]
#[traced_test]
async fn unknown_or_unconfigured_source_is_rejected() {
    let h = harness(SourceKind::Twitter, Vec::new(), FakeModel::default(), 1).await;

    assert!(!h.pool.enqueue("myspace", None));
    assert!(!h.pool.enqueue("reddit", None));
    assert!(logs_contain("unknown source, ignoring enqueue"));
    assert!(logs_contain("myspace"));
    assert!(h.pool.watermark(SourceKind::Reddit).is_none());
    drain(&h).await;
    assert!(h.source.seen_since().is_empty());
    h.pool.stop().await;
}

#[tokio::test]
async fn first_job_defaults_to_twice_the_fetch_interval() {
    let h = harness(SourceKind::Reddit, Vec::new(), FakeModel::default(), 1).await;

    let before = Utc::now();
    h.pool.enqueue("reddit", None);
    drain(&h).await;
    let after = Utc::now();

    let seen = h.source.seen_since();
    assert_eq!(seen.len(), 1);
    let lookback = TimeDelta::seconds(240);
    assert!(seen[0] >= before - lookback && seen[0] <= after - lookback);
    h.pool.stop().await;
}

#[tokio::test]
async fn later_jobs_start_from_the_watermark() {
    let batch = vec![item(SourceKind::Reddit, "a", "ETF inflows", t0() + TimeDelta::minutes(30))];
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], FakeModel::default(), 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;
    h.pool.enqueue("reddit", None);
    drain(&h).await;

    assert_eq!(
        h.source.seen_since(),
        vec![t0(), t0() + TimeDelta::minutes(30)]
    );
    h.pool.stop().await;
}

#[tokio::test]
async fn explicit_older_since_never_moves_watermark_back() {
    let batch = vec![item(SourceKind::Reddit, "a", "ETF inflows", t0() + TimeDelta::minutes(30))];
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], FakeModel::default(), 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;
    h.pool.enqueue("reddit", Some(t0() - TimeDelta::days(1)));
    drain(&h).await;

    assert_eq!(
        h.pool.watermark(SourceKind::Reddit),
        Some(t0() + TimeDelta::minutes(30))
    );
    h.pool.stop().await;
}

#[tokio::test]
async fn embeddings_are_cached_across_jobs() {
    let first = vec![item(SourceKind::Twitter, "1", "Bitcoin rallies", t0() + TimeDelta::minutes(1))];
    let second = vec![item(SourceKind::Twitter, "2", "Bitcoin rallies", t0() + TimeDelta::minutes(2))];
    let h = harness(
        SourceKind::Twitter,
        vec![Batch::Items(first), Batch::Items(second)],
        FakeModel::default(),
        1,
    )
    .await;

    h.pool.enqueue("twitter", Some(t0()));
    h.pool.enqueue("twitter", None);
    drain(&h).await;

    assert_eq!(h.model.embeds(), 1);
    assert_eq!(h.pool.cached_embeddings(), 1);
    let rows = h.store.rows();
    assert_eq!(rows.len(), 2, "cross-job duplicates are left to the store");
    assert!(rows.iter().all(|r| r.embedding.is_some()));
    h.pool.stop().await;
}

#[tokio::test]
async fn malformed_classification_is_repaired_once() {
    let batch = vec![item(SourceKind::Reddit, "r", "SEC delays ETF decision", t0() + TimeDelta::minutes(1))];
    let model = FakeModel::with_replies(&["Sure! Here is the JSON you asked for", common::BEARISH]);
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], model, 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;

    assert_eq!(h.model.chats(), 2);
    let rows = h.store.rows();
    let labels = rows[0].classification().expect("repaired classification stored");
    assert_eq!(labels.stance, Stance::Bearish);
    h.pool.stop().await;
}

#[tokio::test]
async fn unrepairable_classification_still_persists_item() {
    let batch = vec![item(SourceKind::Reddit, "r", "lorem ipsum", t0() + TimeDelta::minutes(1))];
    let model = FakeModel::with_replies(&["nope", "still nope"]);
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], model, 1).await;

    h.pool.enqueue("reddit", Some(t0()));
    drain(&h).await;

    let rows = h.store.rows();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].sentiment.is_none());
    assert!(rows[0].embedding.is_some());
    h.pool.stop().await;
}

#[tokio::test]
async fn embedding_failure_is_isolated_to_one_item() {
    let batch = vec![
        item(SourceKind::Twitter, "1", "broken embed", t0() + TimeDelta::minutes(1)),
        item(SourceKind::Twitter, "2", "fine embed", t0() + TimeDelta::minutes(2)),
    ];
    let model = FakeModel::default().failing_embed_for("broken embed");
    let h = harness(SourceKind::Twitter, vec![Batch::Items(batch)], model, 1).await;

    h.pool.enqueue("twitter", Some(t0()));
    drain(&h).await;

    let rows = h.store.rows();
    assert_eq!(rows.len(), 2);
    let broken = rows.iter().find(|r| r.external_id == "1").unwrap();
    let fine = rows.iter().find(|r| r.external_id == "2").unwrap();
    assert!(broken.embedding.is_none());
    assert!(broken.sentiment.is_some());
    assert!(fine.embedding.is_some());
    assert_eq!(
        h.pool.watermark(SourceKind::Twitter),
        Some(t0() + TimeDelta::minutes(2))
    );
    h.pool.stop().await;
}

#[tokio::test]
async fn empty_text_skips_the_model() {
    let batch = vec![item(SourceKind::Telegram, "c:2", "", t0() + TimeDelta::minutes(1))];
    let h = harness(SourceKind::Telegram, vec![Batch::Items(batch)], FakeModel::default(), 1).await;

    h.pool.enqueue("telegram", Some(t0()));
    drain(&h).await;

    assert_eq!(h.model.chats(), 0);
    assert_eq!(h.model.embeds(), 0);
    assert_eq!(h.store.rows().len(), 1);
    h.pool.stop().await;
}

#[tokio::test]
async fn start_warms_up_and_stop_finishes_queued_work() {
    let batch = vec![item(SourceKind::Reddit, "q", "Oil spikes", t0() + TimeDelta::minutes(1))];
    let h = harness(SourceKind::Reddit, vec![Batch::Items(batch)], FakeModel::default(), 3).await;
    assert_eq!(h.model.warmups.load(Ordering::SeqCst), 1);
    assert_eq!(h.pool.source_names(), vec!["reddit"]);

    h.pool.enqueue("reddit", Some(t0()));
    tokio::time::timeout(Duration::from_secs(10), h.pool.stop())
        .await
        .expect("stop should return once workers exit");

    assert_eq!(h.store.rows().len(), 1, "job queued before stop still runs");
}
