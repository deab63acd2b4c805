//! Fixed-size pool of tokio workers draining a shared FIFO job queue.
//!
//! ```text
//! enqueue(source, since?) ──► JobQueue ──► worker 1..n
//!                                             │
//!                                             ├─► Source::fetch_since
//!                                             ├─► dedupe
//!                                             ├─► Enricher (classify + embed)
//!                                             ├─► ItemStore::upsert_many
//!                                             └─► advance watermark
//! ```
//!
//! Two jobs for the same source may run on different workers at the same
//! time; the store's `(source, external_id)` uniqueness absorbs the overlap
//! and watermarks only ever move forward.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use cryptonews_core::SourceKind;
use cryptonews_llm::LanguageModel;
use cryptonews_sources::Source;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::dedup::dedupe;
use crate::enricher::Enricher;
use crate::error::PipelineError;
use crate::store::ItemStore;

/// Fetch everything newer than `since` for `source`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub source: SourceKind,
    pub since: DateTime<Utc>,
}

#[derive(Debug)]
enum QueueEntry {
    Job(Job),
    Stop,
}

/// Stages a job moves through; used to label log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Fetching,
    Deduping,
    Enriching,
    Persisting,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Fetching => "fetching",
            Self::Deduping => "deduping",
            Self::Enriching => "enriching",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

struct JobFailure {
    state: JobState,
    error: PipelineError,
}

impl JobFailure {
    fn new(state: JobState, error: impl Into<PipelineError>) -> Self {
        Self {
            state,
            error: error.into(),
        }
    }
}

/// Unbounded FIFO with a pending-entry counter so callers can wait for it to
/// drain.
struct JobQueue {
    tx: mpsc::UnboundedSender<QueueEntry>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<QueueEntry>>,
    pending: watch::Sender<usize>,
}

impl JobQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (pending, _) = watch::channel(0);
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            pending,
        }
    }

    fn put(&self, entry: QueueEntry) {
        self.pending.send_modify(|n| *n += 1);
        if self.tx.send(entry).is_err() {
            // The receiver lives as long as the queue, so this only happens
            // during teardown.
            self.task_done();
        }
    }

    async fn get(&self) -> Option<QueueEntry> {
        self.rx.lock().await.recv().await
    }

    fn task_done(&self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }

    async fn join(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

struct PoolInner {
    sources: HashMap<SourceKind, Arc<dyn Source>>,
    order: Vec<SourceKind>,
    model: Arc<dyn LanguageModel>,
    store: Arc<dyn ItemStore>,
    enricher: Enricher,
    queue: JobQueue,
    watermarks: Mutex<HashMap<SourceKind, DateTime<Utc>>>,
    default_lookback: TimeDelta,
}

impl PoolInner {
    fn watermark(&self, source: SourceKind) -> Option<DateTime<Utc>> {
        self.watermarks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&source)
            .copied()
    }

    /// Move the watermark to `ts` unless it is already later.
    fn advance_watermark(&self, source: SourceKind, ts: DateTime<Utc>) {
        let mut marks = self.watermarks.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = marks.entry(source).or_insert(ts);
        if ts > *entry {
            *entry = ts;
        }
    }

    async fn run_job(&self, job: Job) -> Result<usize, JobFailure> {
        let Some(source) = self.sources.get(&job.source) else {
            return Ok(0);
        };

        tracing::info!(source = %job.source, since = %job.since, state = %JobState::Fetching, "fetching");
        let items = source
            .fetch_since(job.since)
            .await
            .map_err(|e| JobFailure::new(JobState::Fetching, e))?;
        if items.is_empty() {
            tracing::debug!(source = %job.source, "no new items");
            return Ok(0);
        }

        let fetched = items.len();
        tracing::debug!(source = %job.source, count = fetched, state = %JobState::Deduping, "deduplicating");
        let items = dedupe(items);
        let latest = items.iter().map(|i| i.published_at).max();
        tracing::info!(
            source = %job.source,
            count = items.len(),
            duplicates = fetched - items.len(),
            state = %JobState::Enriching,
            "processing items"
        );

        let enriched = self.enricher.enrich_batch(items).await;

        self.store
            .upsert_many(&enriched)
            .await
            .map_err(|e| JobFailure::new(JobState::Persisting, e))?;

        if let Some(latest) = latest {
            self.advance_watermark(job.source, latest);
        }
        Ok(enriched.len())
    }
}

async fn worker_loop(inner: Arc<PoolInner>, worker: usize) {
    tracing::debug!(worker, "worker started");
    while let Some(entry) = inner.queue.get().await {
        let job = match entry {
            QueueEntry::Stop => {
                inner.queue.task_done();
                break;
            }
            QueueEntry::Job(job) => job,
        };

        match AssertUnwindSafe(inner.run_job(job)).catch_unwind().await {
            Ok(Ok(count)) => {
                tracing::info!(worker, source = %job.source, count, state = %JobState::Done, "job done");
            }
            Ok(Err(failure)) => {
                tracing::error!(
                    worker,
                    source = %job.source,
                    state = %JobState::Failed,
                    failed_in = %failure.state,
                    error = %failure.error,
                    "job failed"
                );
            }
            Err(_) => {
                tracing::error!(worker, source = %job.source, state = %JobState::Failed, "job panicked");
            }
        }
        inner.queue.task_done();
    }
    tracing::debug!(worker, "worker stopped");
}

/// Ingestion worker pool. Cheap to share behind an `Arc`.
pub struct WorkerPool {
    inner: Arc<PoolInner>,
    handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// `fetch_interval` sets the default look-back for a source's first job:
    /// twice the interval before now.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn Source>>,
        model: Arc<dyn LanguageModel>,
        store: Arc<dyn ItemStore>,
        fetch_interval: Duration,
    ) -> Self {
        let order: Vec<SourceKind> = sources.iter().map(|s| s.kind()).collect();
        let sources = sources.into_iter().map(|s| (s.kind(), s)).collect();
        let default_lookback =
            TimeDelta::from_std(fetch_interval.saturating_mul(2)).unwrap_or(TimeDelta::MAX);
        let inner = PoolInner {
            sources,
            order,
            enricher: Enricher::new(Arc::clone(&model)),
            model,
            store,
            queue: JobQueue::new(),
            watermarks: Mutex::new(HashMap::new()),
            default_lookback,
        };
        Self {
            inner: Arc::new(inner),
            handles: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Warm the model (best effort), then spawn `workers` consumers.
    pub async fn start(&self, workers: usize) {
        self.inner.model.warmup().await;
        let mut handles = self.handles.lock().await;
        let offset = handles.len();
        for worker in offset..offset + workers {
            handles.push(tokio::spawn(worker_loop(Arc::clone(&self.inner), worker)));
        }
        tracing::info!(workers, sources = ?self.source_names(), "worker pool started");
    }

    /// Queue a fetch for `source_name`. Returns `false` (and logs) when the
    /// source is not configured.
    ///
    /// Without an explicit `since`, the job starts from the source's
    /// watermark, or twice the fetch interval before now on first use.
    pub fn enqueue(&self, source_name: &str, since: Option<DateTime<Utc>>) -> bool {
        let kind = match source_name.parse::<SourceKind>() {
            Ok(kind) if self.inner.sources.contains_key(&kind) => kind,
            _ => {
                tracing::warn!(source = source_name, "unknown source, ignoring enqueue");
                return false;
            }
        };

        let since = since
            .or_else(|| self.inner.watermark(kind))
            .unwrap_or_else(|| {
                Utc::now()
                    .checked_sub_signed(self.inner.default_lookback)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            });
        self.inner.advance_watermark(kind, since);

        tracing::debug!(source = %kind, %since, state = %JobState::Pending, "job queued");
        self.inner.queue.put(QueueEntry::Job(Job { source: kind, since }));
        true
    }

    /// Wait until every entry queued so far has been processed.
    pub async fn join(&self) {
        self.inner.queue.join().await;
    }

    /// Send one stop sentinel per worker and wait for all of them to exit.
    /// Jobs already queued ahead of the sentinels still run.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.handles.lock().await);
        for _ in &handles {
            self.inner.queue.put(QueueEntry::Stop);
        }
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker task ended abnormally");
            }
        }
        tracing::info!("worker pool stopped");
    }

    /// Configured source names, in configuration order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.inner.order.iter().map(|k| k.as_str()).collect()
    }

    #[must_use]
    pub fn watermark(&self, source: SourceKind) -> Option<DateTime<Utc>> {
        self.inner.watermark(source)
    }

    /// Number of embeddings cached so far.
    #[must_use]
    pub fn cached_embeddings(&self) -> usize {
        self.inner.enricher.cache().len()
    }
}
