//! Brute-force semantic search over stored embeddings.

use chrono::{DateTime, TimeDelta, Utc};
use cryptonews_core::{Sentiment, Stance};
use cryptonews_db::{CandidateFilter, ItemRow};
use cryptonews_llm::LanguageModel;

use crate::error::PipelineError;
use crate::store::ItemStore;

pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    /// Keep items sharing at least one topic. Empty means no topic filter.
    pub topics: Vec<String>,
    pub sentiment: Option<Sentiment>,
    pub stance: Option<Stance>,
    /// Only items published within the last N days. `0` is treated as unset.
    pub since_days: Option<u32>,
}

impl SearchFilters {
    /// Structured predicates the store can evaluate before scoring.
    #[must_use]
    pub fn candidate_filter(&self, now: DateTime<Utc>) -> CandidateFilter {
        let published_since = self
            .since_days
            .filter(|d| *d > 0)
            .and_then(|d| now.checked_sub_signed(TimeDelta::days(i64::from(d))));
        CandidateFilter {
            sentiment: self.sentiment,
            stance: self.stance,
            published_since,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub item: ItemRow,
    pub score: f64,
}

/// `a·b / (‖a‖‖b‖)`, or `0.0` when either vector has zero norm.
///
/// The dot product runs over the shorter of the two vectors; each norm uses
/// its full vector.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let norm_a = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| f64::from(*y).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Score `candidates` against `query` and return the best `limit`, highest
/// first. Ties keep candidate order. Items without a non-empty embedding, or sharing
/// no topic with a non-empty `topics`, are dropped.
#[must_use]
pub fn rank(query: &[f32], candidates: Vec<ItemRow>, topics: &[String], limit: usize) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = candidates
        .into_iter()
        .filter(|item| topics.is_empty() || item.topics.iter().any(|t| topics.contains(t)))
        .filter_map(|item| {
            let embedding = item.embedding.as_deref().filter(|v| !v.is_empty())?;
            let score = cosine_similarity(query, embedding);
            Some(SearchHit { item, score })
        })
        .collect();
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

/// Embed `query`, fetch filtered candidates from `store`, and rank them.
///
/// # Errors
///
/// Returns [`PipelineError::Llm`] if the query cannot be embedded, or
/// [`PipelineError::Store`] if candidates cannot be loaded.
pub async fn semantic_search(
    store: &dyn ItemStore,
    model: &dyn LanguageModel,
    query: &str,
    filters: &SearchFilters,
    limit: usize,
) -> Result<Vec<SearchHit>, PipelineError> {
    let query_vector = model
        .embed(&[query.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or(PipelineError::EmptyEmbedding)?;

    let candidates = store
        .search_candidates(&filters.candidate_filter(Utc::now()))
        .await?;
    let considered = candidates.len();
    let hits = rank(&query_vector, candidates, &filters.topics, limit);
    tracing::debug!(considered, returned = hits.len(), "semantic search");
    Ok(hits)
}
