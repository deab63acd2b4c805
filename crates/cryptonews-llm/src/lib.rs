//! Client for an OpenAI-compatible LLM endpoint (LM Studio by default),
//! plus the classification prompt built on top of it.

pub mod classify;
pub mod client;
pub mod error;
pub mod model;
pub(crate) mod retry;

pub use classify::{classify_text, ClassifyOutcome, REPAIR_INSTRUCTION};
pub use client::LmStudioClient;
pub use error::LlmError;
pub use model::{LanguageModel, Message, Role};
