//! HTTP client for an OpenAI-compatible chat and embeddings endpoint.
//!
//! LM Studio, llama.cpp server and vLLM all expose `/chat/completions` and
//! `/embeddings` under a common base URL; this client only speaks that subset.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cryptonews_core::AppConfig;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::model::{LanguageModel, Message};
use crate::retry::{retry_with_backoff, BACKOFF_BASE_MS, MAX_ATTEMPTS};

const TEMPERATURE: f32 = 0.2;
const TOP_P: f32 = 0.9;
const DEFAULT_MAX_TOKENS: u32 = 1024;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Client for an LM Studio (OpenAI-compatible) server.
///
/// Use [`LmStudioClient::from_config`] in the binary or
/// [`LmStudioClient::with_base_url`] to point at a mock server in tests.
pub struct LmStudioClient {
    client: Client,
    api_key: String,
    chat_model: String,
    embed_model: String,
    chat_url: Url,
    embeddings_url: Url,
    backoff_base_ms: u64,
    warmed: AtomicBool,
}

impl LmStudioClient {
    /// Creates a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`LlmError::InvalidBaseUrl`] if `LMSTUDIO_BASE_URL` is not a URL.
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        Self::with_base_url(
            &config.lmstudio_base_url,
            &config.lmstudio_api_key,
            &config.llm_model,
            &config.embed_model,
            config.llm_request_timeout_secs,
        )
    }

    /// Creates a client against an explicit base URL such as
    /// `http://127.0.0.1:1234/v1`.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Http`] if the `reqwest::Client` cannot be built, or
    /// [`LlmError::InvalidBaseUrl`] if `base_url` is not a URL.
    pub fn with_base_url(
        base_url: &str,
        api_key: &str,
        chat_model: &str,
        embed_model: &str,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("cryptonews/0.1")
            .build()?;

        // A trailing slash makes `Url::join` append instead of replacing `v1`.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let invalid = |reason: String| LlmError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let base = Url::parse(&normalised).map_err(|e| invalid(e.to_string()))?;
        let chat_url = base
            .join("chat/completions")
            .map_err(|e| invalid(e.to_string()))?;
        let embeddings_url = base
            .join("embeddings")
            .map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            chat_model: chat_model.to_owned(),
            embed_model: embed_model.to_owned(),
            chat_url,
            embeddings_url,
            backoff_base_ms: BACKOFF_BASE_MS,
            warmed: AtomicBool::new(false),
        })
    }

    /// Overrides the retry back-off base (tests use `0`).
    #[must_use]
    pub fn with_backoff_base_ms(mut self, backoff_base_ms: u64) -> Self {
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    async fn post_json<B, R>(&self, url: &Url, body: &B) -> Result<R, LlmError>
    where
        B: Serialize + Sync,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .client
            .post(url.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| LlmError::Deserialize {
            context: url.path().to_string(),
            source: e,
        })
    }

    async fn chat_once(&self, messages: &[Message], max_tokens: u32) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: &self.chat_model,
            messages,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            max_tokens,
        };
        let response: ChatResponse = self.post_json(&self.chat_url, &request).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: texts,
        };
        let mut response: EmbeddingResponse = self.post_json(&self.embeddings_url, &request).await?;
        if response.data.len() != texts.len() {
            return Err(LlmError::EmbeddingCount {
                expected: texts.len(),
                actual: response.data.len(),
            });
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl LanguageModel for LmStudioClient {
    async fn chat(
        &self,
        messages: &[Message],
        max_tokens: Option<u32>,
    ) -> Result<String, LlmError> {
        let max_tokens = max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        retry_with_backoff(MAX_ATTEMPTS, self.backoff_base_ms, || {
            self.chat_once(messages, max_tokens)
        })
        .await
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        retry_with_backoff(MAX_ATTEMPTS, self.backoff_base_ms, || self.embed_once(texts)).await
    }

    async fn warmup(&self) {
        if self.warmed.swap(true, Ordering::SeqCst) {
            return;
        }
        let messages = [Message::system("You are warming up."), Message::user("OK")];
        match self.chat(&messages, Some(1)).await {
            Ok(_) => tracing::info!(model = %self.chat_model, "LLM warmup complete"),
            Err(e) => tracing::warn!(model = %self.chat_model, error = %e, "LLM warmup failed"),
        }
    }
}
