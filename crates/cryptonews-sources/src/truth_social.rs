//! Truth Social adapter over its Mastodon-compatible public timeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cryptonews_core::{AppConfig, NormalizedItem, SourceKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::normalizer::{clean_text, resolve_language};
use crate::{http_client, Source};

const MAX_STATUSES: usize = 40;

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    content: String,
    language: Option<String>,
    account: Option<Account>,
}

#[derive(Debug, Deserialize)]
struct Account {
    acct: Option<String>,
}

pub struct TruthSocialSource {
    client: reqwest::Client,
    access_token: Option<String>,
    limit: usize,
    max_tokens: usize,
    base_url: String,
}

impl TruthSocialSource {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client("cryptonews/0.1")?,
            access_token: config.truth_social_access_token.clone(),
            limit: config.batch_size.clamp(1, MAX_STATUSES),
            max_tokens: config.max_text_tokens,
            base_url: config.truth_social_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Source for TruthSocialSource {
    fn kind(&self) -> SourceKind {
        SourceKind::TruthSocial
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError> {
        let Some(token) = &self.access_token else {
            tracing::debug!(source = "truth_social", "no access token configured, skipping");
            return Ok(Vec::new());
        };

        let statuses: Vec<Value> = self
            .client
            .get(format!("{}/api/v1/timelines/public", self.base_url))
            .bearer_auth(token)
            .query(&[("limit", self.limit.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut items = Vec::new();
        for status in statuses {
            match self.normalize(status) {
                Ok(item) if item.published_at > since => items.push(item),
                Ok(_) => {}
                Err(e) => tracing::warn!(source = "truth_social", error = %e, "skipping status"),
            }
        }
        tracing::debug!(source = "truth_social", count = items.len(), %since, "fetched statuses");
        Ok(items)
    }

    fn normalize(&self, raw: Value) -> Result<NormalizedItem, SourceError> {
        let status: Status = serde_json::from_value(raw.clone())
            .map_err(|e| SourceError::payload(SourceKind::TruthSocial, e))?;
        let mut item = NormalizedItem::new(
            SourceKind::TruthSocial,
            status.id,
            clean_text(&status.content, self.max_tokens),
            status.created_at,
        );
        item.author = status.account.and_then(|a| a.acct);
        item.lang = resolve_language(status.language, &item.text);
        item.raw = raw;
        Ok(item)
    }
}
