//! Shared HTTP transport for the data adapters and the notifier.
//!
//! Wraps a `reqwest::Client` with a per-request timeout and a bounded retry
//! with linear backoff. Only recoverable failures (network errors, 5xx, 429)
//! are retried.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use twscan_common::config::HttpConfig;
use twscan_common::util::truncate_with_ellipsis;

use super::provider::ProviderError;

/// HTTP client with retry.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry_count: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    /// Create a fetcher using the configured default timeout.
    pub fn new(config: &HttpConfig) -> Self {
        Self::with_timeout(config, config.timeout_secs)
    }

    /// Create a fetcher with an explicit timeout (seconds).
    pub fn with_timeout(config: &HttpConfig, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            retry_count: config.retry_count.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// GET `url` with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        self.with_retry(url, move || async move {
            let response = self.client.get(url).query(query).send().await?;
            Self::decode(response).await
        })
        .await
    }

    /// POST a JSON body to `url` and decode the JSON response.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ProviderError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        self.with_retry(url, move || async move {
            let response = self.client.post(url).json(body).send().await?;
            Self::decode(response).await
        })
        .await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ProviderError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body: truncate_with_ellipsis(&text, 200),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            ProviderError::Parse(format!("{} (body: {})", e, truncate_with_ellipsis(&text, 120)))
        })
    }

    /// Run `op` up to `retry_count` times while it fails recoverably.
    ///
    /// Urls are only logged without their query string since some carry tokens.
    async fn with_retry<F, Fut, T>(&self, url: &str, op: F) -> Result<T, ProviderError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let target = redact_url(url);
        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_recoverable() && attempt < self.retry_count => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        target = %target,
                        error = %e,
                        "Request failed, retrying..."
                    );
                    last_error = Some(e);
                    tokio::time::sleep(self.retry_backoff * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Network("no attempt made".into())))
    }
}

/// Strip the query string and any `/bot<token>` path segment from a url.
fn redact_url(url: &str) -> String {
    let base = url.split('?').next().unwrap_or(url);
    match base.find("/bot") {
        Some(idx) => {
            let rest = &base[idx + 4..];
            let tail = rest.find('/').map(|i| &rest[i..]).unwrap_or("");
            format!("{}/bot***{}", &base[..idx], tail)
        }
        None => base.to_string(),
    }
}
