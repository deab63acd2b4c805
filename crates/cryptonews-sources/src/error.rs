use cryptonews_core::SourceKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} authentication failed: {reason}")]
    Auth { provider: SourceKind, reason: String },

    #[error("{provider} payload could not be normalized: {reason}")]
    Payload { provider: SourceKind, reason: String },
}

impl SourceError {
    pub(crate) fn payload(provider: SourceKind, reason: impl std::fmt::Display) -> Self {
        Self::Payload {
            provider,
            reason: reason.to_string(),
        }
    }
}
