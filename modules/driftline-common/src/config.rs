use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Brain provider (OpenAI-compatible endpoint)
    pub brain_api_key: String,
    pub brain_base_url: String,
    pub brain_model: String,
    pub brain_embedding_model: String,

    // Outbound fetch deadlines, seconds. Content scraping gets a longer
    // deadline than feed discovery.
    pub discover_timeout_secs: u64,
    pub hydrate_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            brain_api_key: required_env("BRAIN_API_KEY"),
            brain_base_url: env::var("BRAIN_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            brain_model: env::var("BRAIN_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            brain_embedding_model: env::var("BRAIN_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            discover_timeout_secs: env_u64("DISCOVER_TIMEOUT_SECS", 15),
            hydrate_timeout_secs: env_u64("HYDRATE_TIMEOUT_SECS", 45),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_u64(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(v) => v.parse().unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
