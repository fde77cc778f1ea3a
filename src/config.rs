use std::time::Duration;

use serde::{Deserialize, de::DeserializeOwned};

use crate::error::{CmuApiError, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// The env vars holding the ScottyLabs scheduling credentials.
#[derive(Debug, Default, Deserialize)]
pub struct SchedulingEnv {
    pub scottylabs_app_id: Option<String>,
    pub scottylabs_app_secret_key: Option<String>,
}

/// Optional env overrides for the shared HTTP client.
#[derive(Debug, Default, Deserialize)]
pub struct RequestEnv {
    pub cmuapi_timeout_secs: Option<u64>,
    pub cmuapi_user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("cmuapi/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl RequestConfig {
    pub fn from_env() -> Result<Self> {
        let env = RequestEnv::load_from_env()?;
        Ok(Self::from(env))
    }
}

impl From<RequestEnv> for RequestConfig {
    fn from(env: RequestEnv) -> Self {
        let defaults = Self::default();
        Self {
            timeout: env
                .cmuapi_timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
            user_agent: env.cmuapi_user_agent.unwrap_or(defaults.user_agent),
        }
    }
}

// Extension trait.
pub trait LoadFromEnv: DeserializeOwned {
    fn load_from_env() -> Result<Self> {
        // Don't throw an error if .env file doesn't exist.
        let _ = dotenv::dotenv();
        envy::from_env::<Self>().map_err(|e| {
            CmuApiError::Config(format!("failed to load env variables into config struct: {e}"))
        })
    }
}

impl<T: DeserializeOwned> LoadFromEnv for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_config_defaults() {
        let config = RequestConfig::from(RequestEnv::default());
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(config.user_agent.starts_with("cmuapi/"));
    }

    #[test]
    fn test_request_config_overrides() {
        let config = RequestConfig::from(RequestEnv {
            cmuapi_timeout_secs: Some(3),
            cmuapi_user_agent: Some("printer-bot".to_string()),
        });
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.user_agent, "printer-bot");
    }
}
