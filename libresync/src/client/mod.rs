//! Shared HTTP client for registry communication.
//!
//! This module wraps a single reqwest client that every registry-facing
//! component shares for the lifetime of a run. It owns connection pooling,
//! timeouts, proxy selection, the plain-HTTP allow list, and retrying of
//! transient failures.

use crate::error::{Result, ResyncError};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};


/// Configuration for the HTTP client.
///
/// # Examples
///
/// ```
/// use libresync::client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_timeout(60)
///     .with_retries(0)
///     .with_insecure_registry("localhost:5000");
/// assert_eq!(config.timeout_seconds, 60);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Maximum idle connections per host (default: 10)
    pub max_idle_per_host: usize,
    /// Extra attempts for transient failures (default: 2)
    pub retries: u32,
    /// Delay before the first retry; later retries wait proportionally longer (default: 500ms)
    pub retry_backoff: Duration,
    /// Explicit proxy URL; when unset reqwest honours `HTTPS_PROXY`
    pub proxy: Option<String>,
    /// Registry hosts contacted over plain HTTP
    pub insecure_registries: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            max_idle_per_host: 10,
            retries: 2,
            retry_backoff: Duration::from_millis(500),
            proxy: None,
            insecure_registries: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the maximum idle connections per host.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }

    /// Sets how many times a transient failure is retried.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Sets the base retry delay.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Routes every request through the given proxy.
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Contacts `host` over plain HTTP instead of HTTPS.
    pub fn with_insecure_registry(mut self, host: impl Into<String>) -> Self {
        self.insecure_registries.push(host.into());
        self
    }
}

/// HTTP client shared by the auth and registry clients.
#[derive(Debug, Clone)]
pub struct Client {
    /// The underlying HTTP client
    http_client: ReqwestClient,
    config: ClientConfig,
}

impl Client {
    /// Creates a new client with default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use libresync::client::Client;
    ///
    /// let client = Client::new().unwrap();
    /// assert_eq!(client.registry_url("gcr.io"), "https://gcr.io");
    /// ```
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a new client with custom configuration.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let mut builder = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(concat!("resync/", env!("CARGO_PKG_VERSION")));

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
                ResyncError::config_with_source("Invalid proxy URL", Some(proxy.as_str()), e)
            })?;
            builder = builder.proxy(proxy);
        }

        let http_client = builder
            .build()
            .map_err(|e| ResyncError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the base URL for a registry host.
    ///
    /// Hosts on the insecure list use `http://`, every other host `https://`.
    pub fn registry_url(&self, registry: &str) -> String {
        if self.config.insecure_registries.iter().any(|h| h == registry) {
            format!("http://{}", registry)
        } else {
            format!("https://{}", registry)
        }
    }

    /// Sends a request, retrying transient failures.
    ///
    /// `build` is invoked once per attempt. Any response that is not a
    /// transient failure is returned as is, whatever its status; callers
    /// decide what a status means for them.
    pub async fn send<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn(&ReqwestClient) -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let result = match build(&self.http_client).send().await {
                Ok(response) => Self::check_transient_status(response),
                Err(e) => Err(Self::translate_reqwest_error(e, url, self.config.timeout_seconds)),
            };

            match result {
                Err(e) if e.is_transient() && attempt < self.config.retries => {
                    attempt += 1;
                    let delay = self.config.retry_backoff * attempt;
                    warn!(%url, attempt, error = %e, "transient failure, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                other => {
                    debug!(%url, attempt, ok = other.is_ok(), "request finished");
                    return other;
                }
            }
        }
    }

    /// Turns rate limiting and server errors into transient errors.
    fn check_transient_status(response: Response) -> Result<Response> {
        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT => Err(ResyncError::network_status(
                format!("HTTP {} from {}", status.as_u16(), response.url()),
                status.as_u16(),
            )),
            _ => Ok(response),
        }
    }

    /// Translates a reqwest error into a ResyncError.
    fn translate_reqwest_error(error: reqwest::Error, url: &str, timeout: u64) -> ResyncError {
        if error.is_timeout() {
            ResyncError::network_with_source(
                format!("Request to {} timed out after {} seconds", url, timeout),
                error,
            )
        } else if error.is_connect() {
            ResyncError::network_with_source(format!("Failed to connect to {}", url), error)
        } else if error.is_request() {
            ResyncError::network_with_source(format!("Failed to send request to {}", url), error)
        } else {
            ResyncError::network_with_source(
                format!("Network error communicating with {}", url),
                error,
            )
        }
    }
}
