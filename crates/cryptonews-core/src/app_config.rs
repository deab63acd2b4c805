#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
    pub log_format: LogFormat,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,

    pub lmstudio_base_url: String,
    pub lmstudio_api_key: String,
    pub llm_model: String,
    pub embed_model: String,
    pub llm_request_timeout_secs: u64,

    pub enable_telegram: bool,
    pub telegram_bot_token: Option<String>,
    pub telegram_channels: Vec<String>,

    pub enable_twitter: bool,
    pub twitter_bearer_token: Option<String>,
    pub twitter_queries: Vec<String>,

    pub enable_reddit: bool,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_subreddits: Vec<String>,
    pub reddit_user_agent: String,

    pub enable_truth_social: bool,
    pub truth_social_base_url: String,
    pub truth_social_access_token: Option<String>,

    pub worker_concurrency: usize,
    pub fetch_interval_seconds: u64,
    pub batch_size: usize,
    pub max_text_tokens: usize,
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "[redacted]")
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("lmstudio_base_url", &self.lmstudio_base_url)
            .field("lmstudio_api_key", &"[redacted]")
            .field("llm_model", &self.llm_model)
            .field("embed_model", &self.embed_model)
            .field("llm_request_timeout_secs", &self.llm_request_timeout_secs)
            .field("enable_telegram", &self.enable_telegram)
            .field(
                "telegram_bot_token",
                &redact(self.telegram_bot_token.as_ref()),
            )
            .field("telegram_channels", &self.telegram_channels)
            .field("enable_twitter", &self.enable_twitter)
            .field(
                "twitter_bearer_token",
                &redact(self.twitter_bearer_token.as_ref()),
            )
            .field("twitter_queries", &self.twitter_queries)
            .field("enable_reddit", &self.enable_reddit)
            .field("reddit_client_id", &redact(self.reddit_client_id.as_ref()))
            .field(
                "reddit_client_secret",
                &redact(self.reddit_client_secret.as_ref()),
            )
            .field("reddit_subreddits", &self.reddit_subreddits)
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("enable_truth_social", &self.enable_truth_social)
            .field("truth_social_base_url", &self.truth_social_base_url)
            .field(
                "truth_social_access_token",
                &redact(self.truth_social_access_token.as_ref()),
            )
            .field("worker_concurrency", &self.worker_concurrency)
            .field("fetch_interval_seconds", &self.fetch_interval_seconds)
            .field("batch_size", &self.batch_size)
            .field("max_text_tokens", &self.max_text_tokens)
            .finish()
    }
}
