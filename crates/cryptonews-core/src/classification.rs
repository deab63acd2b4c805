//! Structured labels produced by the LLM classifier.
//!
//! The LLM is asked for a JSON object; [`ClassificationResult::parse_json`]
//! accepts it only when every enumerated field holds one of its allowed
//! values. `topics`, `tickers` and `entities` default to empty.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Sentiment {
    Negative,
    Neutral,
    Positive,
}

impl Sentiment {
    #[must_use]
    pub fn value(self) -> i8 {
        match self {
            Sentiment::Negative => -1,
            Sentiment::Neutral => 0,
            Sentiment::Positive => 1,
        }
    }
}

impl TryFrom<i8> for Sentiment {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Sentiment::Negative),
            0 => Ok(Sentiment::Neutral),
            1 => Ok(Sentiment::Positive),
            other => Err(format!("sentiment must be -1, 0 or 1, got {other}")),
        }
    }
}

impl TryFrom<i16> for Sentiment {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        i8::try_from(value)
            .map_err(|_| format!("sentiment must be -1, 0 or 1, got {value}"))
            .and_then(Sentiment::try_from)
    }
}

impl From<Sentiment> for i8 {
    fn from(value: Sentiment) -> Self {
        value.value()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stance {
    Bullish,
    Bearish,
    Neutral,
}

impl Stance {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Stance::Bullish => "bullish",
            Stance::Bearish => "bearish",
            Stance::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bullish" => Ok(Stance::Bullish),
            "bearish" => Ok(Stance::Bearish),
            "neutral" => Ok(Stance::Neutral),
            other => Err(format!("stance must be bullish, bearish or neutral, got {other}")),
        }
    }
}

/// Expected market impact, 0 (none) to 2 (high).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Impact {
    Low,
    Medium,
    High,
}

impl Impact {
    #[must_use]
    pub fn value(self) -> u8 {
        match self {
            Impact::Low => 0,
            Impact::Medium => 1,
            Impact::High => 2,
        }
    }
}

impl TryFrom<u8> for Impact {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Impact::Low),
            1 => Ok(Impact::Medium),
            2 => Ok(Impact::High),
            other => Err(format!("impact must be 0, 1 or 2, got {other}")),
        }
    }
}

impl TryFrom<i16> for Impact {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| format!("impact must be 0, 1 or 2, got {value}"))
            .and_then(Impact::try_from)
    }
}

impl From<Impact> for u8 {
    fn from(value: Impact) -> Self {
        value.value()
    }
}

/// A named entity mentioned in the text, e.g. `{"type": "ORG", "text": "SEC"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub topics: Vec<String>,
    pub sentiment: Sentiment,
    pub stance: Stance,
    pub impact: Impact,
    #[serde(default)]
    pub tickers: Vec<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl ClassificationResult {
    /// Parse an LLM response strictly: the whole string must be one JSON
    /// object matching the schema.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] on malformed JSON, missing required
    /// fields, or out-of-range enumerated values.
    pub fn parse_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
