//! Telegram adapter over the Bot API `getUpdates` long-poll endpoint.
//!
//! The bot must be an administrator of each configured channel to receive
//! its `channel_post` updates. Every successful poll confirms what it
//! received by sending `offset = last update_id + 1` on the next call;
//! without that Telegram keeps returning the same oldest page.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cryptonews_core::{AppConfig, NormalizedItem, SourceKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::normalizer::{clean_text, detect_language};
use crate::{http_client, Source};

const DEFAULT_BASE_URL: &str = "https://api.telegram.org";
const MAX_UPDATES: usize = 100;

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    channel_post: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelPost {
    message_id: i64,
    date: i64,
    chat: Chat,
    text: Option<String>,
    caption: Option<String>,
    author_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    username: Option<String>,
}

impl Chat {
    fn channel_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}

pub struct TelegramSource {
    client: reqwest::Client,
    bot_token: Option<String>,
    channels: Vec<String>,
    limit: usize,
    max_tokens: usize,
    base_url: String,
    /// Next `offset` to send; `0` until the first update is seen.
    next_offset: AtomicI64,
}

fn channel_key(name: &str) -> String {
    name.trim_start_matches('@').to_ascii_lowercase()
}

impl TelegramSource {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: http_client("cryptonews/0.1")?,
            bot_token: config.telegram_bot_token.clone(),
            channels: config.telegram_channels.iter().map(|c| channel_key(c)).collect(),
            limit: config.batch_size.clamp(1, MAX_UPDATES),
            max_tokens: config.max_text_tokens,
            base_url: DEFAULT_BASE_URL.to_string(),
            next_offset: AtomicI64::new(0),
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn is_watched(&self, chat: &Chat) -> bool {
        chat.username
            .as_deref()
            .is_some_and(|u| self.channels.contains(&channel_key(u)))
    }

    /// Confirm every update up to and including `last_update_id`.
    fn confirm_through(&self, last_update_id: i64) {
        self.next_offset
            .fetch_max(last_update_id.saturating_add(1), Ordering::SeqCst);
    }
}

#[async_trait]
impl Source for TelegramSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Telegram
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError> {
        let Some(token) = &self.bot_token else {
            tracing::debug!(source = "telegram", "no bot token configured, skipping");
            return Ok(Vec::new());
        };
        if self.channels.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = vec![
            ("allowed_updates", r#"["channel_post"]"#.to_string()),
            ("limit", self.limit.to_string()),
        ];
        let offset = self.next_offset.load(Ordering::SeqCst);
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }

        let response: UpdatesResponse = self
            .client
            .get(format!("{}/bot{token}/getUpdates", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return Err(SourceError::payload(
                SourceKind::Telegram,
                response.description.unwrap_or_else(|| "getUpdates returned ok=false".to_string()),
            ));
        }

        if let Some(last) = response.result.iter().map(|u| u.update_id).max() {
            self.confirm_through(last);
        }

        let mut items = Vec::new();
        for post in response.result.into_iter().filter_map(|u| u.channel_post) {
            let watched = serde_json::from_value::<ChannelPost>(post.clone())
                .is_ok_and(|p| self.is_watched(&p.chat));
            if !watched {
                continue;
            }
            match self.normalize(post) {
                Ok(item) if item.published_at > since => items.push(item),
                Ok(_) => {}
                Err(e) => tracing::warn!(source = "telegram", error = %e, "skipping channel post"),
            }
        }
        tracing::debug!(source = "telegram", count = items.len(), %since, "fetched channel posts");
        Ok(items)
    }

    fn normalize(&self, raw: Value) -> Result<NormalizedItem, SourceError> {
        let post: ChannelPost = serde_json::from_value(raw.clone())
            .map_err(|e| SourceError::payload(SourceKind::Telegram, e))?;
        let published_at = DateTime::from_timestamp(post.date, 0).ok_or_else(|| {
            SourceError::payload(SourceKind::Telegram, format!("date out of range: {}", post.date))
        })?;
        let channel = post.chat.channel_name();
        let body = post.text.or(post.caption).unwrap_or_default();

        let mut item = NormalizedItem::new(
            SourceKind::Telegram,
            format!("{channel}:{}", post.message_id),
            clean_text(&body, self.max_tokens),
            published_at,
        );
        item.author = post.author_signature;
        item.lang = detect_language(&item.text);
        item.raw = serde_json::json!({ "channel": channel, "message": raw });
        Ok(item)
    }
}
