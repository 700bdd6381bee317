//! HTTP client for the agent's local control API.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use crate::config::ApiConfig;

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Client for the API described by `config`. A wildcard bind address
    /// is reached over loopback.
    pub fn from_config(config: &ApiConfig) -> Self {
        let host = match config.bind.as_str() {
            "0.0.0.0" | "" => "127.0.0.1",
            "::" => "[::1]",
            other => other,
        };
        Self::new(&format!("http://{}:{}", host, config.port))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .context("Failed to connect to roomkeeper. Is it running?")?;
        Self::parse(response).await
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut request = self.client.post(format!("{}{}", self.base_url, path));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .context("Failed to connect to roomkeeper. Is it running?")?;
        Self::parse(response).await
    }

    async fn parse(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let json: Value = response
            .json()
            .await
            .context("Invalid response from roomkeeper")?;

        if !status.is_success() {
            bail!(
                "{}",
                json.get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error")
            );
        }
        Ok(json)
    }
}
