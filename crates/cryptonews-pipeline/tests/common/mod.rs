//! In-memory fakes for the pipeline's source, model and store seams.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use cryptonews_core::{ClassificationResult, NormalizedItem, SourceKind};
use cryptonews_db::{CandidateFilter, DbError, ItemRow};
use cryptonews_llm::{LanguageModel, LlmError, Message};
use cryptonews_pipeline::{Enriched, ItemStore};
use cryptonews_sources::{Source, SourceError};
use uuid::Uuid;

pub const BULLISH: &str =
    r#"{"topics":["crypto"],"sentiment":1,"stance":"bullish","impact":2,"tickers":["BTC"]}"#;
pub const BEARISH: &str =
    r#"{"topics":["crypto"],"sentiment":-1,"stance":"bearish","impact":1,"tickers":["BTC"]}"#;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 13, 12, 0, 0).unwrap()
}

pub fn item(source: SourceKind, id: &str, text: &str, published_at: DateTime<Utc>) -> NormalizedItem {
    NormalizedItem::new(source, id, text, published_at)
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub enum Batch {
    Items(Vec<NormalizedItem>),
    Fail(String),
    Panic,
}

pub struct FakeSource {
    kind: SourceKind,
    batches: Mutex<VecDeque<Batch>>,
    pub calls: Mutex<Vec<DateTime<Utc>>>,
}

impl FakeSource {
    pub fn new(kind: SourceKind, batches: Vec<Batch>) -> Self {
        Self {
            kind,
            batches: Mutex::new(batches.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_since(&self) -> Vec<DateTime<Utc>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Source for FakeSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError> {
        self.calls.lock().unwrap().push(since);
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            None => Ok(Vec::new()),
            Some(Batch::Items(items)) => Ok(items),
            Some(Batch::Fail(reason)) => Err(SourceError::Payload {
                provider: self.kind,
                reason,
            }),
            Some(Batch::Panic) => panic!("source blew up"),
        }
    }

    fn normalize(&self, raw: serde_json::Value) -> Result<NormalizedItem, SourceError> {
        serde_json::from_value(raw).map_err(|e| SourceError::Payload {
            provider: self.kind,
            reason: e.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Language model
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeModel {
    /// Scripted chat answers, consumed first.
    pub replies: Mutex<VecDeque<String>>,
    /// Exact-text embeddings; anything else embeds to `[0.5, 0.5]`.
    pub vectors: HashMap<String, Vec<f32>>,
    /// Texts whose embedding request fails.
    pub embed_failures: Vec<String>,
    /// Answer every embedding request with an empty list.
    pub no_vectors: bool,
    pub chat_calls: AtomicUsize,
    pub embed_calls: AtomicUsize,
    pub warmups: AtomicUsize,
}

impl FakeModel {
    pub fn with_replies(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(ToString::to_string).collect()),
            ..Self::default()
        }
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_embed_for(mut self, text: &str) -> Self {
        self.embed_failures.push(text.to_string());
        self
    }

    pub fn chats(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embeds(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn chat(&self, messages: &[Message], _max_tokens: Option<u32>) -> Result<String, LlmError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reply) = self.replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        let prompt = messages.iter().map(|m| m.content.as_str()).collect::<String>();
        if prompt.contains("crash") {
            Ok(BEARISH.to_string())
        } else {
            Ok(BULLISH.to_string())
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if texts.iter().any(|t| self.embed_failures.contains(t)) {
            return Err(LlmError::EmptyResponse);
        }
        if self.no_vectors {
            return Ok(Vec::new());
        }
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or_else(|| vec![0.5, 0.5]))
            .collect())
    }

    async fn warmup(&self) {
        self.warmups.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<ItemRow>>,
    pub batches: AtomicUsize,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn rows(&self) -> Vec<ItemRow> {
        self.rows.lock().unwrap().clone()
    }

    pub fn batch_calls(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn write(
        &self,
        item: &NormalizedItem,
        classification: Option<&ClassificationResult>,
        embedding: Option<&[f32]>,
    ) -> ItemRow {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let existing = rows
            .iter()
            .position(|r| r.source == item.source.as_str() && r.external_id == item.external_id);
        let (id, created_at) = existing.map_or((Uuid::new_v4(), now), |i| (rows[i].id, rows[i].created_at));
        let row = ItemRow {
            id,
            source: item.source.as_str().to_string(),
            external_id: item.external_id.clone(),
            author: item.author.clone(),
            published_at: item.published_at,
            lang: item.lang.clone(),
            text: item.text.clone(),
            raw: item.raw.clone(),
            content_hash: item.content_hash.clone(),
            tickers: classification.map(|c| c.tickers.clone()).unwrap_or_default(),
            entities: serde_json::to_value(classification.map(|c| c.entities.clone()).unwrap_or_default())
                .unwrap(),
            topics: classification.map(|c| c.topics.clone()).unwrap_or_default(),
            sentiment: classification.map(|c| i16::from(c.sentiment.value())),
            stance: classification.map(|c| c.stance.as_str().to_string()),
            impact: classification.map(|c| i16::from(c.impact.value())),
            embedding: embedding.map(<[f32]>::to_vec),
            created_at,
            updated_at: now,
        };
        match existing {
            Some(i) => rows[i] = row.clone(),
            None => rows.push(row.clone()),
        }
        row
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn get_by_external_id(
        &self,
        source: SourceKind,
        external_id: &str,
    ) -> Result<Option<ItemRow>, DbError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.source == source.as_str() && r.external_id == external_id)
            .cloned())
    }

    async fn upsert_one(
        &self,
        item: &NormalizedItem,
        classification: Option<&ClassificationResult>,
        embedding: Option<&[f32]>,
    ) -> Result<ItemRow, DbError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::NotFound);
        }
        Ok(self.write(item, classification, embedding))
    }

    async fn upsert_many(&self, batch: &[Enriched]) -> Result<Vec<ItemRow>, DbError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(DbError::NotFound);
        }
        Ok(batch
            .iter()
            .map(|e| self.write(&e.item, e.classification.as_ref(), e.embedding.as_deref()))
            .collect())
    }

    async fn search_candidates(&self, filter: &CandidateFilter) -> Result<Vec<ItemRow>, DbError> {
        let mut rows: Vec<ItemRow> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| {
                filter
                    .sentiment
                    .is_none_or(|s| r.sentiment == Some(i16::from(s.value())))
            })
            .filter(|r| filter.stance.is_none_or(|s| r.stance.as_deref() == Some(s.as_str())))
            .filter(|r| filter.published_since.is_none_or(|t| r.published_at >= t))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(rows)
    }
}
