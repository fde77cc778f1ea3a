use log::debug;
use reqwest::{Client, ClientBuilder, Response};

use crate::{config::RequestConfig, error::Result};

/// Shared HTTP plumbing for the three clients. Every request carries the
/// configured timeout; expiry surfaces as a network error.
#[derive(Debug, Clone)]
pub struct RequestClient {
    client: Client,
}

impl RequestClient {
    pub fn new() -> Result<Self> {
        Self::with_config(&RequestConfig::default())
    }

    pub fn with_config(config: &RequestConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch_url_response(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        Ok(response)
    }

    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response> {
        debug!("POST {url}");
        let response = self.client.post(url).form(form).send().await?;
        Ok(response)
    }
}
