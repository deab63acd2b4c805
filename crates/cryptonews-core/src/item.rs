use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The feeds the pipeline knows how to ingest from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Telegram,
    Twitter,
    Reddit,
    TruthSocial,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Telegram,
        SourceKind::Twitter,
        SourceKind::Reddit,
        SourceKind::TruthSocial,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Telegram => "telegram",
            SourceKind::Twitter => "twitter",
            SourceKind::Reddit => "reddit",
            SourceKind::TruthSocial => "truth_social",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown source: {s}"))
    }
}

/// A provider-agnostic representation of one fetched post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub source: SourceKind,
    /// Provider identifier, unique per source.
    pub external_id: String,
    pub text: String,
    /// Provider payload, stored verbatim.
    pub raw: serde_json::Value,
    pub published_at: DateTime<Utc>,
    pub author: Option<String>,
    pub lang: Option<String>,
    /// Set by the deduplicator, never by source adapters.
    pub content_hash: Option<String>,
}

impl NormalizedItem {
    /// Build an item with no optional metadata.
    #[must_use]
    pub fn new(
        source: SourceKind,
        external_id: impl Into<String>,
        text: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source,
            external_id: external_id.into(),
            text: text.into(),
            raw: serde_json::Value::Null,
            published_at,
            author: None,
            lang: None,
            content_hash: None,
        }
    }
}
