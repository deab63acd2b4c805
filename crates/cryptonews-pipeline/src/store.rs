//! Persistence seam between the pipeline and the database.

use async_trait::async_trait;
use cryptonews_core::{ClassificationResult, NormalizedItem, SourceKind};
use cryptonews_db::{CandidateFilter, DbError, ItemRow, UpsertRow};
use sqlx::PgPool;

use crate::enricher::Enriched;

#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn get_by_external_id(
        &self,
        source: SourceKind,
        external_id: &str,
    ) -> Result<Option<ItemRow>, DbError>;

    /// Insert or update one item; safe to call repeatedly with the same key.
    async fn upsert_one(
        &self,
        item: &NormalizedItem,
        classification: Option<&ClassificationResult>,
        embedding: Option<&[f32]>,
    ) -> Result<ItemRow, DbError>;

    /// Persist a whole job's batch atomically.
    async fn upsert_many(&self, batch: &[Enriched]) -> Result<Vec<ItemRow>, DbError>;

    async fn search_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ItemRow>, DbError>;
}

/// [`ItemStore`] backed by the Postgres `items` table.
#[derive(Clone)]
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn get_by_external_id(
        &self,
        source: SourceKind,
        external_id: &str,
    ) -> Result<Option<ItemRow>, DbError> {
        cryptonews_db::get_item_by_external_id(&self.pool, source, external_id).await
    }

    async fn upsert_one(
        &self,
        item: &NormalizedItem,
        classification: Option<&ClassificationResult>,
        embedding: Option<&[f32]>,
    ) -> Result<ItemRow, DbError> {
        let row = UpsertRow {
            item,
            classification,
            embedding,
        };
        cryptonews_db::upsert_item(&self.pool, row).await
    }

    async fn upsert_many(&self, batch: &[Enriched]) -> Result<Vec<ItemRow>, DbError> {
        let rows: Vec<UpsertRow<'_>> = batch.iter().map(Enriched::as_upsert_row).collect();
        cryptonews_db::upsert_items(&self.pool, &rows).await
    }

    async fn search_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ItemRow>, DbError> {
        cryptonews_db::list_search_candidates(&self.pool, filter).await
    }
}
