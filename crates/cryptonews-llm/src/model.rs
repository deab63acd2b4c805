use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Chat and embedding capability the pipeline depends on.
///
/// Implementations retry transient failures themselves; an `Err` means the
/// attempts are exhausted.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run a chat completion and return the assistant text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] once every attempt has failed.
    async fn chat(&self, messages: &[Message], max_tokens: Option<u32>)
        -> Result<String, LlmError>;

    /// Embed each input text, returning one vector per input in order.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] once every attempt has failed.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Prime the model so the first real request is not slow. Never fails.
    async fn warmup(&self) {}
}
