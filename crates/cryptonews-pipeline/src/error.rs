use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    Source(#[from] cryptonews_sources::SourceError),

    #[error("persistence failed: {0}")]
    Store(#[from] cryptonews_db::DbError),

    #[error("LLM request failed: {0}")]
    Llm(#[from] cryptonews_llm::LlmError),

    #[error("embedding endpoint returned no vector")]
    EmptyEmbedding,
}
