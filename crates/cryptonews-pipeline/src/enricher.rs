//! Per-item LLM enrichment: classification plus a cached embedding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use cryptonews_core::{ClassificationResult, NormalizedItem};
use cryptonews_db::UpsertRow;
use cryptonews_llm::{classify_text, ClassifyOutcome, LanguageModel};

use crate::dedup::content_hash;

/// An item with whatever enrichment succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct Enriched {
    pub item: NormalizedItem,
    pub classification: Option<ClassificationResult>,
    pub embedding: Option<Vec<f32>>,
}

impl Enriched {
    #[must_use]
    pub fn as_upsert_row(&self) -> UpsertRow<'_> {
        UpsertRow {
            item: &self.item,
            classification: self.classification.as_ref(),
            embedding: self.embedding.as_deref(),
        }
    }
}

/// Embeddings keyed by content hash. Lives as long as the worker pool and is
/// never evicted.
#[derive(Default)]
pub struct EmbeddingCache {
    entries: Mutex<HashMap<String, Vec<f32>>>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn insert(&self, key: String, embedding: Vec<f32>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, embedding);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct Enricher {
    model: Arc<dyn LanguageModel>,
    cache: EmbeddingCache,
}

impl Enricher {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            cache: EmbeddingCache::default(),
        }
    }

    #[must_use]
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }

    /// Enrich items one at a time, in order.
    pub async fn enrich_batch(&self, items: Vec<NormalizedItem>) -> Vec<Enriched> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.enrich(item).await);
        }
        out
    }

    /// Classify and embed one item. Failures are logged and leave the
    /// corresponding field empty; they never fail the item.
    pub async fn enrich(&self, item: NormalizedItem) -> Enriched {
        if item.text.is_empty() {
            return Enriched {
                item,
                classification: None,
                embedding: None,
            };
        }
        let classification = self.classify(&item).await;
        let embedding = self.embed(&item).await;
        Enriched {
            item,
            classification,
            embedding,
        }
    }

    async fn classify(&self, item: &NormalizedItem) -> Option<ClassificationResult> {
        match classify_text(self.model.as_ref(), &item.text).await {
            Ok(ClassifyOutcome::Parsed(result)) => Some(result),
            Ok(ClassifyOutcome::RepairFailed { error }) => {
                tracing::warn!(
                    source = %item.source,
                    external_id = %item.external_id,
                    error = %error,
                    "classification did not match schema after repair"
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    source = %item.source,
                    external_id = %item.external_id,
                    error = %e,
                    "classification failed"
                );
                None
            }
        }
    }

    async fn embed(&self, item: &NormalizedItem) -> Option<Vec<f32>> {
        let key = item
            .content_hash
            .clone()
            .unwrap_or_else(|| content_hash(item.source, &item.text));
        if let Some(hit) = self.cache.get(&key) {
            return Some(hit);
        }

        match self.model.embed(std::slice::from_ref(&item.text)).await {
            Ok(vectors) => match vectors.into_iter().next() {
                Some(vector) if !vector.is_empty() => {
                    self.cache.insert(key, vector.clone());
                    Some(vector)
                }
                _ => {
                    tracing::warn!(
                        source = %item.source,
                        external_id = %item.external_id,
                        "embedding response was empty"
                    );
                    None
                }
            },
            Err(e) => {
                tracing::warn!(
                    source = %item.source,
                    external_id = %item.external_id,
                    error = %e,
                    "embedding failed"
                );
                None
            }
        }
    }
}
