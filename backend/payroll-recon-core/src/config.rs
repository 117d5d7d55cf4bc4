// src/config.rs

use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::ReconError;

pub const ENV_PREFIX: &str = "PAYROLL_";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOGS_PAGE_SIZE: u32 = 200;

/// Environment variables probed for a bearer token, in order, when no explicit
/// `PAYROLL_API_TOKEN` is configured.
pub const DEFAULT_TOKEN_ENV_VARS: [&str; 3] = ["PAYROLL_ACCESS_TOKEN", "ACCESS_TOKEN", "TOKEN"];

// Configuration for the backend client
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_token_env_vars")]
    pub token_env_vars: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_logs_page_size")]
    pub logs_page_size: u32,
}

fn default_token_env_vars() -> Vec<String> {
    DEFAULT_TOKEN_ENV_VARS.iter().map(|s| s.to_string()).collect()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_logs_page_size() -> u32 {
    DEFAULT_LOGS_PAGE_SIZE
}

impl ClientConfig {
    pub fn new<S: Into<String>>(base_url: S) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            token_env_vars: default_token_env_vars(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            logs_page_size: DEFAULT_LOGS_PAGE_SIZE,
        }
    }

    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Loads `PAYROLL_*` variables (after reading `.env` if present).
    pub fn from_env() -> Result<Self, ReconError> {
        dotenv::dotenv().ok();
        let config: ClientConfig = envy::prefixed(ENV_PREFIX)
            .from_env()
            .map_err(|e| {
                ReconError::Config(format!("Failed to load {}* settings: {}", ENV_PREFIX, e))
            })?;
        config.validate()?;
        debug!("Loaded client configuration for {}", config.base_url);
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ReconError::Config(format!("Invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ReconError::Config(format!(
                "base_url must be http(s), got '{}'",
                url.scheme()
            )));
        }
        if self.logs_page_size == 0 {
            return Err(ReconError::Config("logs_page_size must be positive".to_string()));
        }
        Ok(())
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
