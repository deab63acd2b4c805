//! Provider adapters that turn social-media posts into [`NormalizedItem`]s.
//!
//! Each adapter talks to the provider's public HTTP/JSON API, filters posts
//! newer than the caller's watermark, and runs the shared text normalizer.
//! An adapter without credentials returns an empty batch.

pub mod error;
pub mod normalizer;
pub mod reddit;
pub mod telegram;
pub mod truth_social;
pub mod twitter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cryptonews_core::{AppConfig, NormalizedItem, SourceKind};

pub use error::SourceError;
pub use reddit::RedditSource;
pub use telegram::TelegramSource;
pub use truth_social::TruthSocialSource;
pub use twitter::TwitterSource;

const HTTP_TIMEOUT_SECS: u64 = 30;

/// A provider feed the pipeline can poll.
#[async_trait]
pub trait Source: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Fetch every post published strictly after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the provider cannot be reached or answers
    /// with an unexpected payload.
    async fn fetch_since(&self, since: DateTime<Utc>) -> Result<Vec<NormalizedItem>, SourceError>;

    /// Convert one raw provider payload into a normalized item.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Payload`] if required fields are missing.
    fn normalize(&self, raw: serde_json::Value) -> Result<NormalizedItem, SourceError>;
}

pub(crate) fn http_client(user_agent: &str) -> Result<reqwest::Client, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

/// Instantiate one adapter per provider enabled in `config`.
///
/// # Errors
///
/// Returns [`SourceError::Http`] if an HTTP client cannot be constructed.
pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn Source>>, SourceError> {
    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    if config.enable_telegram {
        sources.push(Arc::new(TelegramSource::from_config(config)?));
    }
    if config.enable_twitter {
        sources.push(Arc::new(TwitterSource::from_config(config)?));
    }
    if config.enable_reddit {
        sources.push(Arc::new(RedditSource::from_config(config)?));
    }
    if config.enable_truth_social {
        sources.push(Arc::new(TruthSocialSource::from_config(config)?));
    }
    tracing::debug!(
        sources = ?sources.iter().map(|s| s.kind().as_str()).collect::<Vec<_>>(),
        "configured sources"
    );
    Ok(sources)
}
