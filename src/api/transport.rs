//! HTTP transport for the Slack Web API
//!
//! This module owns the `reqwest` client and is the only place that touches
//! the network:
//! - Building the client with the optional proxy
//! - Attaching the bearer token to every call
//! - Issuing Web API method calls and raw file downloads
//!
//! There is no retry here; errors go straight back to the caller.

use crate::config::SlackConfig;
use crate::{HarvestError, Result};
use reqwest::{Client, Proxy};
use url::Url;

/// User agent sent with every request
const USER_AGENT: &str = concat!("slack-harvest/", env!("CARGO_PKG_VERSION"));

/// Builds an HTTP client, routing through the configured proxy if any
///
/// # Example
///
/// ```no_run
/// use slack_harvest::api::build_http_client;
/// use slack_harvest::config::SlackConfig;
///
/// let config = SlackConfig {
///     token: "xoxb-test".to_string(),
///     api_base_url: "https://slack.com/api/".to_string(),
///     proxy_host: Some("proxy.local".to_string()),
///     proxy_port: Some(3128),
///     include_private: false,
///     channels: "*".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &SlackConfig) -> Result<Client> {
    let mut builder = Client::builder().user_agent(USER_AGENT).gzip(true);

    if let Some(address) = config.proxy_address() {
        tracing::info!("Routing Slack API calls through proxy {}", address);
        builder = builder.proxy(Proxy::all(format!("http://{}", address))?);
    }

    Ok(builder.build()?)
}

/// Authenticated access to the Web API
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    base_url: Url,
    token: String,
}

impl Transport {
    pub fn new(config: &SlackConfig) -> Result<Self> {
        let client = build_http_client(config)?;
        let base_url = parse_base_url(&config.api_base_url)?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Calls a Web API method, returning the HTTP status and body
    ///
    /// # Arguments
    ///
    /// * `method` - Web API method name, e.g. `conversations.history`
    /// * `params` - Query parameters
    pub async fn call(&self, method: &str, params: &[(&str, String)]) -> Result<(u16, String)> {
        let url = self
            .base_url
            .join(method)
            .map_err(|e| crate::ConfigError::InvalidUrl(format!("{}: {}", method, e)))?;

        tracing::trace!(method = %method, "Calling Slack API");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(params)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                method: method.to_string(),
                source,
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|source| HarvestError::Http {
            method: method.to_string(),
            source,
        })?;

        Ok((status, body))
    }

    /// Downloads a private file URL with the same bearer token
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| HarvestError::Http {
                method: "file download".to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Status {
                method: "file download".to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| HarvestError::Http {
            method: "file download".to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Parses the API base URL, making sure relative joins keep its path
fn parse_base_url(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized)
        .map_err(|e| crate::ConfigError::InvalidUrl(format!("{}: {}", raw, e)).into())
}
