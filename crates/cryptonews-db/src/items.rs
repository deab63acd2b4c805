//! Database operations for the `items` table.

use chrono::{DateTime, Utc};
use cryptonews_core::{
    ClassificationResult, Entity, Impact, NormalizedItem, Sentiment, SourceKind, Stance,
};
use serde_json::Value;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::DbError;

const ITEM_COLUMNS: &str = "id, source, external_id, author, published_at, lang, text, raw, \
     content_hash, tickers, entities, topics, sentiment, stance, impact, embedding, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A persisted item: the normalized post plus its enrichment.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub source: String,
    pub external_id: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub lang: Option<String>,
    pub text: String,
    pub raw: Value,
    pub content_hash: Option<String>,
    pub tickers: Vec<String>,
    pub entities: Value,
    pub topics: Vec<String>,
    pub sentiment: Option<i16>,
    pub stance: Option<String>,
    pub impact: Option<i16>,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemRow {
    /// The source column parsed back into a [`SourceKind`], if recognised.
    #[must_use]
    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source.parse().ok()
    }

    /// Rebuild the classification when all labelled columns are present.
    #[must_use]
    pub fn classification(&self) -> Option<ClassificationResult> {
        let sentiment = Sentiment::try_from(self.sentiment?).ok()?;
        let stance = self.stance.as_deref()?.parse::<Stance>().ok()?;
        let impact = Impact::try_from(self.impact?).ok()?;
        let entities: Vec<Entity> = serde_json::from_value(self.entities.clone()).unwrap_or_default();
        Some(ClassificationResult {
            topics: self.topics.clone(),
            sentiment,
            stance,
            impact,
            tickers: self.tickers.clone(),
            entities,
        })
    }
}

/// One entry of a batch upsert.
#[derive(Debug, Clone, Copy)]
pub struct UpsertRow<'a> {
    pub item: &'a NormalizedItem,
    pub classification: Option<&'a ClassificationResult>,
    pub embedding: Option<&'a [f32]>,
}

/// Structured predicates applied before semantic scoring.
#[derive(Debug, Clone, Default)]
pub struct CandidateFilter {
    pub sentiment: Option<Sentiment>,
    pub stance: Option<Stance>,
    pub published_since: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Look up an item by its provider identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_item_by_external_id(
    pool: &PgPool,
    source: SourceKind,
    external_id: &str,
) -> Result<Option<ItemRow>, DbError> {
    let mut conn = pool.acquire().await?;
    fetch_by_external_id(&mut conn, source, external_id).await
}

/// Insert or update a single item in its own transaction.
///
/// Existing rows (same `source`, `external_id`) are overwritten with the new
/// values. If a concurrent writer inserts the same key first, the existing
/// row is re-read and returned instead of failing.
///
/// # Errors
///
/// Returns [`DbError`] if a statement or the commit fails.
pub async fn upsert_item(pool: &PgPool, row: UpsertRow<'_>) -> Result<ItemRow, DbError> {
    let mut tx = pool.begin().await?;
    let stored = upsert_in(&mut tx, row).await?;
    tx.commit().await?;
    Ok(stored)
}

/// Upsert a whole batch atomically: either every row is written or none is.
///
/// # Errors
///
/// Returns [`DbError`] if any statement or the commit fails; the transaction
/// is rolled back on drop.
pub async fn upsert_items(pool: &PgPool, rows: &[UpsertRow<'_>]) -> Result<Vec<ItemRow>, DbError> {
    let mut tx = pool.begin().await?;
    let mut stored = Vec::with_capacity(rows.len());
    for row in rows {
        stored.push(upsert_in(&mut tx, *row).await?);
    }
    tx.commit().await?;
    Ok(stored)
}

/// List items matching the structured search predicates, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_search_candidates(
    pool: &PgPool,
    filter: &CandidateFilter,
) -> Result<Vec<ItemRow>, DbError> {
    let sql = format!(
        "SELECT {ITEM_COLUMNS} FROM items \
         WHERE ($1::SMALLINT IS NULL OR sentiment = $1) \
           AND ($2::TEXT IS NULL OR stance = $2) \
           AND ($3::TIMESTAMPTZ IS NULL OR published_at >= $3) \
         ORDER BY published_at DESC, id"
    );
    let rows = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(filter.sentiment.map(|s| i16::from(s.value())))
        .bind(filter.stance.map(Stance::as_str))
        .bind(filter.published_since)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

async fn fetch_by_external_id(
    conn: &mut PgConnection,
    source: SourceKind,
    external_id: &str,
) -> Result<Option<ItemRow>, DbError> {
    let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE source = $1 AND external_id = $2");
    let row = sqlx::query_as::<_, ItemRow>(&sql)
        .bind(source.as_str())
        .bind(external_id)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

async fn upsert_in(conn: &mut PgConnection, row: UpsertRow<'_>) -> Result<ItemRow, DbError> {
    let item = row.item;
    let labels = row.classification;
    let entities = serde_json::to_value(labels.map(|c| c.entities.as_slice()).unwrap_or_default())?;
    let tickers = labels.map(|c| c.tickers.clone()).unwrap_or_default();
    let topics = labels.map(|c| c.topics.clone()).unwrap_or_default();
    let sentiment = labels.map(|c| i16::from(c.sentiment.value()));
    let stance = labels.map(|c| c.stance.as_str());
    let impact = labels.map(|c| i16::from(c.impact.value()));
    let embedding = row.embedding.map(<[f32]>::to_vec);

    let update_sql = format!(
        "UPDATE items SET \
           author = $3, published_at = $4, lang = $5, text = $6, raw = $7, \
           content_hash = $8, tickers = $9, entities = $10, topics = $11, \
           sentiment = $12, stance = $13, impact = $14, embedding = $15, \
           updated_at = NOW() \
         WHERE source = $1 AND external_id = $2 \
         RETURNING {ITEM_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, ItemRow>(&update_sql)
        .bind(item.source.as_str())
        .bind(&item.external_id)
        .bind(&item.author)
        .bind(item.published_at)
        .bind(&item.lang)
        .bind(&item.text)
        .bind(&item.raw)
        .bind(&item.content_hash)
        .bind(&tickers)
        .bind(&entities)
        .bind(&topics)
        .bind(sentiment)
        .bind(stance)
        .bind(impact)
        .bind(&embedding)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(existing) = updated {
        return Ok(existing);
    }

    let insert_sql = format!(
        "INSERT INTO items \
           (source, external_id, author, published_at, lang, text, raw, content_hash, \
            tickers, entities, topics, sentiment, stance, impact, embedding) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (source, external_id) DO NOTHING \
         RETURNING {ITEM_COLUMNS}"
    );
    let inserted = sqlx::query_as::<_, ItemRow>(&insert_sql)
        .bind(item.source.as_str())
        .bind(&item.external_id)
        .bind(&item.author)
        .bind(item.published_at)
        .bind(&item.lang)
        .bind(&item.text)
        .bind(&item.raw)
        .bind(&item.content_hash)
        .bind(&tickers)
        .bind(&entities)
        .bind(&topics)
        .bind(sentiment)
        .bind(stance)
        .bind(impact)
        .bind(&embedding)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(created) = inserted {
        return Ok(created);
    }

    // Lost an insert race: another writer owns the row now.
    fetch_by_external_id(conn, item.source, &item.external_id)
        .await?
        .ok_or(DbError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with_labels() -> ItemRow {
        ItemRow {
            id: Uuid::new_v4(),
            source: "reddit".to_string(),
            external_id: "t3_abc".to_string(),
            author: None,
            published_at: Utc::now(),
            lang: Some("en".to_string()),
            text: "Bitcoin rallies".to_string(),
            raw: Value::Null,
            content_hash: None,
            tickers: vec!["BTC".to_string()],
            entities: serde_json::json!([{"type": "ORG", "text": "SEC"}]),
            topics: vec!["crypto".to_string()],
            sentiment: Some(1),
            stance: Some("bullish".to_string()),
            impact: Some(2),
            embedding: Some(vec![1.0, 0.0]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn classification_is_rebuilt_from_columns() {
        let c = row_with_labels().classification().expect("labels present");
        assert_eq!(c.sentiment, Sentiment::Positive);
        assert_eq!(c.stance, Stance::Bullish);
        assert_eq!(c.impact, Impact::High);
        assert_eq!(c.entities[0].text, "SEC");
    }

    #[test]
    fn classification_is_none_when_labels_missing() {
        let mut row = row_with_labels();
        row.sentiment = None;
        assert!(row.classification().is_none());
    }

    #[test]
    fn source_kind_parses_stored_name() {
        let mut row = row_with_labels();
        assert_eq!(row.source_kind(), Some(SourceKind::Reddit));
        row.source = "truth_social".to_string();
        assert_eq!(row.source_kind(), Some(SourceKind::TruthSocial));
    }
}
