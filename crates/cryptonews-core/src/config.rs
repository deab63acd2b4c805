use crate::app_config::{AppConfig, LogFormat};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can feed a `HashMap`.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_flag = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match lookup(var) {
            Ok(raw) => parse_bool(var, &raw),
            Err(_) => Ok(default),
        }
    };

    let list = |var: &str| -> Vec<String> { lookup(var).map(|v| split_list(&v)).unwrap_or_default() };

    let database_url = require("DATABASE_URL")?;
    let log_level = or_default("CRYPTONEWS_LOG_LEVEL", "info");
    let log_format = parse_log_format(&or_default("CRYPTONEWS_LOG_FORMAT", "pretty"))?;

    let db_max_connections = parse_u32("CRYPTONEWS_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("CRYPTONEWS_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("CRYPTONEWS_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let lmstudio_base_url = or_default("LMSTUDIO_BASE_URL", "http://127.0.0.1:1234/v1");
    let lmstudio_api_key = or_default("LMSTUDIO_API_KEY", "lm-studio");
    let llm_model = or_default("LLM_MODEL", "openai/gpt-oss-20b");
    let embed_model = or_default("EMBED_MODEL", "nomic-embed-text");
    let llm_request_timeout_secs = parse_u64("LLM_REQUEST_TIMEOUT_SECS", "60")?;

    let worker_concurrency = parse_usize("WORKER_CONCURRENCY", "4")?;
    if worker_concurrency == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "WORKER_CONCURRENCY".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let fetch_interval_seconds = parse_u64("FETCH_INTERVAL_SECONDS", "120")?;
    if fetch_interval_seconds == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "FETCH_INTERVAL_SECONDS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        database_url,
        log_level,
        log_format,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        lmstudio_base_url,
        lmstudio_api_key,
        llm_model,
        embed_model,
        llm_request_timeout_secs,
        enable_telegram: parse_flag("ENABLE_TELEGRAM", true)?,
        telegram_bot_token: optional("TELEGRAM_BOT_TOKEN"),
        telegram_channels: list("TELEGRAM_CHANNELS"),
        enable_twitter: parse_flag("ENABLE_TWITTER", false)?,
        twitter_bearer_token: optional("TWITTER_BEARER_TOKEN"),
        twitter_queries: list("TWITTER_QUERIES"),
        enable_reddit: parse_flag("ENABLE_REDDIT", true)?,
        reddit_client_id: optional("REDDIT_CLIENT_ID"),
        reddit_client_secret: optional("REDDIT_CLIENT_SECRET"),
        reddit_subreddits: list("REDDIT_SUBREDDITS"),
        reddit_user_agent: or_default("REDDIT_USER_AGENT", "cryptonews-agent"),
        enable_truth_social: parse_flag("ENABLE_TRUTH_SOCIAL", false)?,
        truth_social_base_url: or_default("TRUTH_SOCIAL_BASE_URL", "https://truthsocial.com"),
        truth_social_access_token: optional("TRUTH_SOCIAL_ACCESS_TOKEN"),
        worker_concurrency,
        fetch_interval_seconds,
        batch_size: parse_usize("BATCH_SIZE", "50")?,
        max_text_tokens: parse_usize("MAX_TEXT_TOKENS", "1500")?,
    })
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}

fn parse_log_format(s: &str) -> Result<LogFormat, ConfigError> {
    match s {
        "pretty" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CRYPTONEWS_LOG_FORMAT".to_string(),
            reason: format!("expected 'pretty' or 'json', got '{other}'"),
        }),
    }
}

/// Split a comma-separated list, dropping blank entries.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
