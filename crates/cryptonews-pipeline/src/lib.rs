//! Ingestion pipeline: a worker pool that fetches, deduplicates, enriches and
//! persists posts, plus semantic search over what it stored.

pub mod dedup;
pub mod enricher;
pub mod error;
pub mod search;
pub mod store;
pub mod worker;

pub use dedup::{content_hash, dedupe};
pub use enricher::{EmbeddingCache, Enriched, Enricher};
pub use error::PipelineError;
pub use search::{cosine_similarity, rank, semantic_search, SearchFilters, SearchHit, DEFAULT_LIMIT};
pub use store::{ItemStore, PgItemStore};
pub use worker::{Job, JobState, WorkerPool};
