//! Crypto/macro news classification prompt with one schema-repair retry.

use cryptonews_core::ClassificationResult;

use crate::error::LlmError;
use crate::model::{LanguageModel, Message};

const SYSTEM_PROMPT: &str = "You are an analyst who labels crypto and macro news. Respond ONLY \
with JSON that strictly\nmatches the provided schema. Do not add commentary.";

const USER_TEMPLATE: &str = r#"Analyze the following post and classify it according to the schema:

Text:
"""
{text}
"""

Return JSON with keys: topics (list of "crypto", "macro", "regulation", "markets" as applicable),
sentiment (-1, 0, 1), stance ("bullish", "bearish", "neutral"), impact (0-2), tickers (list of symbols),
and entities (list of objects with type/text)."#;

/// Appended as a user turn when the first answer fails to parse.
pub const REPAIR_INSTRUCTION: &str =
    "Your previous response did not match the schema. Return valid JSON only.";

const CLASSIFY_MAX_TOKENS: u32 = 300;
const MAX_PARSE_ATTEMPTS: usize = 2;

/// Result of a classification round that reached the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyOutcome {
    Parsed(ClassificationResult),
    /// Both the first answer and the repaired answer failed validation.
    RepairFailed { error: String },
}

impl ClassifyOutcome {
    #[must_use]
    pub fn into_result(self) -> Option<ClassificationResult> {
        match self {
            Self::Parsed(result) => Some(result),
            Self::RepairFailed { .. } => None,
        }
    }
}

fn initial_messages(text: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(USER_TEMPLATE.replace("{text}", text)),
    ]
}

/// Classify `text`, retrying once with [`REPAIR_INSTRUCTION`] if the model's
/// answer is not valid JSON for [`ClassificationResult`].
///
/// # Errors
///
/// Returns [`LlmError`] when the chat request itself fails after retries.
/// Malformed model output is never an error; it yields
/// [`ClassifyOutcome::RepairFailed`].
pub async fn classify_text(
    model: &dyn LanguageModel,
    text: &str,
) -> Result<ClassifyOutcome, LlmError> {
    let mut messages = initial_messages(text);
    let mut last_error = String::new();

    for attempt in 0..MAX_PARSE_ATTEMPTS {
        if attempt > 0 {
            messages.push(Message::user(REPAIR_INSTRUCTION));
        }
        let response = model.chat(&messages, Some(CLASSIFY_MAX_TOKENS)).await?;
        match ClassificationResult::parse_json(&response) {
            Ok(result) => return Ok(ClassifyOutcome::Parsed(result)),
            Err(e) => {
                tracing::debug!(attempt, error = %e, "classification did not match schema");
                last_error = e.to_string();
            }
        }
    }

    Ok(ClassifyOutcome::RepairFailed { error: last_error })
}
