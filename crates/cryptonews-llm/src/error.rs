use thiserror::Error;

/// Errors returned by the LLM client.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Network or TLS failure, or a non-2xx status from the endpoint.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The base URL could not be parsed.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The endpoint answered but the completion carried no content.
    #[error("empty response from model")]
    EmptyResponse,

    /// The number of returned vectors does not match the number of inputs.
    #[error("expected {expected} embeddings, got {actual}")]
    EmbeddingCount { expected: usize, actual: usize },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
