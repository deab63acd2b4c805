//! Twitter/X adapter over the v2 recent-search endpoint.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cryptonews_core::{AppConfig, NormalizedItem, SourceKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::normalizer::{clean_text, resolve_language};
use crate::{http_client, Source};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com";
// The recent-search endpoint rejects page sizes outside 10..=100.
const MIN_RESULTS: usize = 10;
const MAX_RESULTS: usize = 100;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    author_id: Option<String>,
    lang: Option<String>,
}

pub struct TwitterSource {
    client: reqwest::Client,
    bearer_token: Option<String>,
    queries: Vec<String>,
    max_results: usize,
    max_tokens: usize,
    base_url: String,
}

impl TwitterSource {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client("cryptonews/0.1")?,
            bearer_token: config.twitter_bearer_token.clone(),
            queries: config.twitter_queries.clone(),
            max_results: config.batch_size.clamp(MIN_RESULTS, MAX_RESULTS),
            max_tokens: config.max_text_tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn query(&self) -> String {
        self.queries.join(" OR ")
    }
}

#[async_trait]
impl Source for TwitterSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Twitter
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError> {
        let Some(token) = &self.bearer_token else {
            tracing::debug!(source = "twitter", "no bearer token configured, skipping");
            return Ok(Vec::new());
        };
        if self.queries.is_empty() {
            return Ok(Vec::new());
        }

        let response: SearchResponse = self
            .client
            .get(format!("{}/2/tweets/search/recent", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("query", self.query()),
                ("start_time", since.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("tweet.fields", "author_id,created_at,lang".to_string()),
                ("max_results", self.max_results.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut items = Vec::with_capacity(response.data.len());
        for tweet in response.data {
            match self.normalize(tweet) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(source = "twitter", error = %e, "skipping tweet"),
            }
        }
        tracing::debug!(source = "twitter", count = items.len(), %since, "fetched tweets");
        Ok(items)
    }

    fn normalize(&self, raw: Value) -> Result<NormalizedItem, SourceError> {
        let tweet: Tweet = serde_json::from_value(raw.clone())
            .map_err(|e| SourceError::payload(SourceKind::Twitter, e))?;
        let mut item = NormalizedItem::new(
            SourceKind::Twitter,
            tweet.id,
            clean_text(&tweet.text, self.max_tokens),
            tweet.created_at,
        );
        item.author = tweet.author_id;
        item.lang = resolve_language(tweet.lang, &item.text);
        item.raw = raw;
        Ok(item)
    }
}
