//! Reddit adapter: client-credentials OAuth plus the `/r/{sub}/new` listing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cryptonews_core::{AppConfig, NormalizedItem, SourceKind};
use serde::Deserialize;
use serde_json::Value;

use crate::error::SourceError;
use crate::normalizer::{clean_text, detect_language};
use crate::{http_client, Source};

const DEFAULT_AUTH_BASE: &str = "https://www.reddit.com";
const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";
const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Value,
}

#[derive(Debug, Deserialize)]
struct PostData {
    id: String,
    name: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    author: Option<String>,
    subreddit: Option<String>,
    url: Option<String>,
}

pub struct RedditSource {
    client: reqwest::Client,
    credentials: Option<(String, String)>,
    subreddits: Vec<String>,
    user_agent: String,
    page_limit: usize,
    max_tokens: usize,
    auth_base: String,
    api_base: String,
}

impl RedditSource {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, SourceError> {
        let credentials = config
            .reddit_client_id
            .clone()
            .zip(config.reddit_client_secret.clone());
        Ok(Self {
            client: http_client(&config.reddit_user_agent)?,
            credentials,
            subreddits: config.reddit_subreddits.clone(),
            user_agent: config.reddit_user_agent.clone(),
            page_limit: config.batch_size.clamp(1, MAX_PAGE_LIMIT),
            max_tokens: config.max_text_tokens,
            auth_base: DEFAULT_AUTH_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point both the token endpoint and the listing API at `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        self.auth_base.clone_from(&base);
        self.api_base = base;
        self
    }

    async fn fetch_token(&self, client_id: &str, secret: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .post(format!("{}/api/v1/access_token", self.auth_base))
            .header("User-Agent", &self.user_agent)
            .basic_auth(client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Auth {
                provider: SourceKind::Reddit,
                reason: format!("token exchange failed with status {}", response.status()),
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| SourceError::Auth {
            provider: SourceKind::Reddit,
            reason: format!("token parse error: {e}"),
        })?;
        Ok(token.access_token)
    }

    async fn fetch_subreddit(&self, token: &str, subreddit: &str) -> Result<Vec<Value>, SourceError> {
        let listing: Listing = self
            .client
            .get(format!("{}/r/{subreddit}/new", self.api_base))
            .bearer_auth(token)
            .header("User-Agent", &self.user_agent)
            .query(&[("limit", self.page_limit.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }
}

#[async_trait]
impl Source for RedditSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Reddit
    }

    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError> {
        let Some((client_id, secret)) = &self.credentials else {
            tracing::debug!(source = "reddit", "no credentials configured, skipping");
            return Ok(Vec::new());
        };
        if self.subreddits.is_empty() {
            return Ok(Vec::new());
        }

        let token = self.fetch_token(client_id, secret).await?;
        let mut items = Vec::new();
        for subreddit in &self.subreddits {
            let posts = match self.fetch_subreddit(&token, subreddit).await {
                Ok(posts) => posts,
                Err(e) => {
                    tracing::warn!(
                        source = "reddit",
                        subreddit = subreddit.as_str(),
                        error = %e,
                        "subreddit fetch failed"
                    );
                    continue;
                }
            };
            for post in posts {
                match self.normalize(post) {
                    Ok(item) if item.published_at > since => items.push(item),
                    Ok(_) => {}
                    Err(e) => tracing::warn!(source = "reddit", error = %e, "skipping post"),
                }
            }
        }
        tracing::debug!(source = "reddit", count = items.len(), %since, "fetched posts");
        Ok(items)
    }

    fn normalize(&self, raw: Value) -> Result<NormalizedItem, SourceError> {
        let post: PostData = serde_json::from_value(raw)
            .map_err(|e| SourceError::payload(SourceKind::Reddit, e))?;

        #[allow(clippy::cast_possible_truncation)]
        let published_at = DateTime::from_timestamp(post.created_utc.trunc() as i64, 0)
            .ok_or_else(|| {
                SourceError::payload(
                    SourceKind::Reddit,
                    format!("created_utc out of range: {}", post.created_utc),
                )
            })?;
        let body = if post.selftext.trim().is_empty() {
            &post.title
        } else {
            &post.selftext
        };
        let external_id = post.name.clone().unwrap_or_else(|| format!("t3_{}", post.id));

        let mut item = NormalizedItem::new(
            SourceKind::Reddit,
            external_id,
            clean_text(body, self.max_tokens),
            published_at,
        );
        item.author = post.author.filter(|a| a != "[deleted]");
        item.lang = detect_language(&item.text);
        item.raw = serde_json::json!({
            "id": post.id,
            "subreddit": post.subreddit,
            "title": post.title,
            "url": post.url,
        });
        Ok(item)
    }
}
