//! Postgres persistence for ingested items.

pub mod items;
pub mod pool;

use thiserror::Error;

pub use items::{
    get_item_by_external_id, list_search_candidates, upsert_item, upsert_items, CandidateFilter,
    ItemRow, UpsertRow,
};
pub use pool::{connect_pool, health_check, run_migrations, PoolConfig};

#[derive(Debug, Error)]
pub enum DbError {
    #[error("item not found")]
    NotFound,
    #[error("invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}
