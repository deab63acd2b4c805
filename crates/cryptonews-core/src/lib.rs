//! Shared domain types and configuration for the cryptonews workspace.

pub mod app_config;
pub mod classification;
pub mod config;
pub mod item;

use thiserror::Error;

pub use app_config::{AppConfig, LogFormat};
pub use classification::{ClassificationResult, Entity, Impact, Sentiment, Stance};
pub use config::{build_app_config, load_app_config, load_app_config_from_env};
pub use item::{NormalizedItem, SourceKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
