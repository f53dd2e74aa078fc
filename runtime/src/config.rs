//! Runtime configuration.
//!
//! The shared secret, user agent and inference token live in one [`Config`]
//! value that is handed to the server and the chain runner at construction.

use std::path::PathBuf;
use std::time::Duration;

/// Default wall-clock budget for one chain run.
pub const DEFAULT_TIME_BUDGET_SECS: u64 = 180;

/// Default base URL of the OpenAI-compatible inference API.
pub const DEFAULT_LLM_BASE_URL: &str = "https://aipipe.org/openai/v1";

/// Default inference model.
pub const DEFAULT_LLM_MODEL: &str = "gpt-4.1-nano";

/// Desktop Chrome user agent used when none is configured.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// CSS selector of the region quiz pages render their task into.
pub const RESULT_SELECTOR: &str = "#result";

/// Errors raised while reading configuration.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be set")]
    Missing { var: &'static str },

    #[error("{var} is not a valid number: {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Per-operation timeouts. Each suspension point in a step has its own bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeouts {
    pub navigate: Duration,
    pub network_idle: Duration,
    pub result_selector: Duration,
    pub submit: Duration,
    pub download: Duration,
    pub inference: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            navigate: Duration::from_secs(60),
            network_idle: Duration::from_secs(15),
            result_selector: Duration::from_secs(8),
            submit: Duration::from_secs(30),
            download: Duration::from_secs(30),
            inference: Duration::from_secs(40),
        }
    }
}

/// Inference collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub token: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
            model: DEFAULT_LLM_MODEL.to_string(),
            token: None,
        }
    }
}

/// Full runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Shared secret expected on inbound requests. `None` rejects every request.
    pub secret: Option<String>,
    pub user_agent: String,
    pub llm: LlmConfig,
    pub time_budget: Duration,
    pub timeouts: Timeouts,
    pub result_selector: String,
    pub chromium_path: Option<PathBuf>,
    pub max_concurrent_runs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            secret: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            llm: LlmConfig::default(),
            time_budget: Duration::from_secs(DEFAULT_TIME_BUDGET_SECS),
            timeouts: Timeouts::default(),
            result_selector: RESULT_SELECTOR.to_string(),
            chromium_path: None,
            max_concurrent_runs: 2,
        }
    }
}

impl Config {
    /// Build a config from `QUIZCHAIN_*` environment variables.
    ///
    /// Call `dotenv::dotenv()` first if a `.env` file should be honoured.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Config::default();

        config.secret = get("QUIZCHAIN_SECRET");

        if let Some(ua) = get("QUIZCHAIN_USER_AGENT") {
            config.user_agent = ua;
        }

        config.llm.token = get("QUIZCHAIN_LLM_TOKEN").or_else(|| get("AIPIPE_TOKEN"));
        if let Some(base) = get("QUIZCHAIN_LLM_BASE_URL") {
            config.llm.base_url = base;
        }
        if let Some(model) = get("QUIZCHAIN_LLM_MODEL") {
            config.llm.model = model;
        }

        if let Some(raw) = get("QUIZCHAIN_TIME_BUDGET_SECS") {
            let secs = parse_number("QUIZCHAIN_TIME_BUDGET_SECS", &raw)?;
            config.time_budget = Duration::from_secs(secs);
        }

        if let Some(raw) = get("QUIZCHAIN_MAX_CONCURRENT_RUNS") {
            let n = parse_number("QUIZCHAIN_MAX_CONCURRENT_RUNS", &raw)?;
            config.max_concurrent_runs = (n as usize).max(1);
        }

        config.chromium_path = get("QUIZCHAIN_CHROMIUM_PATH").map(PathBuf::from);

        Ok(config)
    }

    /// The configured secret, or an error naming the variable to set.
    pub fn require_secret(&self) -> Result<&str, ConfigError> {
        self.secret.as_deref().ok_or(ConfigError::Missing {
            var: "QUIZCHAIN_SECRET",
        })
    }
}

fn parse_number(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: value.to_string(),
    })
}

/// Mask a secret for logging: keep the first and last character.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 2 {
        return "***".to_string();
    }
    let mut out = String::with_capacity(chars.len());
    out.push(chars[0]);
    out.extend(std::iter::repeat('*').take(chars.len() - 2));
    out.push(chars[chars.len() - 1]);
    out
}
