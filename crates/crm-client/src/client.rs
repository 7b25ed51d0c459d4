use crate::error::CrmClientError;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tagsync_core::config::CrmConfig;
use tagsync_core::directory::{DirectoryError, TagDirectory};
use url::Url;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded retries with exponential backoff for transient directory errors.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt: `3` means up to four attempts total.
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (1-indexed): base, 2×base,
    /// 4×base, …
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff_base * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

// ---------------------------------------------------------------------------
// CrmClient
// ---------------------------------------------------------------------------

/// Client for the CRM's contact-tag API.
///
/// Endpoints, keyed by contact email:
/// - `GET    /contacts/{email}/tags` → `{"tags": ["..."]}`
/// - `POST   /contacts/{email}/tags` with `{"name": "..."}`
/// - `DELETE /contacts/{email}/tags/{tag}`
#[derive(Debug)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    tags: Vec<String>,
}

impl CrmClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, CrmClientError> {
        let url =
            Url::parse(base_url).map_err(|_| CrmClientError::InvalidBaseUrl(base_url.into()))?;
        if url.cannot_be_a_base() {
            return Err(CrmClientError::InvalidBaseUrl(base_url.into()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: url,
            api_key: api_key.into(),
            retry,
        })
    }

    /// Build a client from `tagsync.yaml`'s `crm` section, reading the API
    /// key from the configured environment variable.
    pub fn from_config(cfg: &CrmConfig) -> Result<Self, CrmClientError> {
        let api_key =
            std::env::var(&cfg.api_key_env).map_err(|_| CrmClientError::MissingApiKey {
                env: cfg.api_key_env.clone(),
            })?;
        Self::new(
            &cfg.base_url,
            api_key,
            Duration::from_secs(cfg.timeout_seconds),
            RetryPolicy {
                max_retries: cfg.max_retries,
                backoff_base: Duration::from_millis(cfg.backoff_base_ms),
            },
        )
    }

    fn contact_tags_url(&self, contact: &str, tag: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        {
            // Infallible: cannot_be_a_base rejected at construction.
            let mut segments = url.path_segments_mut().expect("base url validated");
            segments.pop_if_empty();
            segments.push("contacts");
            segments.push(contact);
            segments.push("tags");
            if let Some(tag) = tag {
                segments.push(tag);
            }
        }
        url
    }

    /// Send a request, retrying transient failures per the policy.
    ///
    /// Transient: request errors (timeout, connect) plus 408/429/5xx.
    /// Anything else non-2xx is permanent and returned immediately.
    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        op: &str,
    ) -> Result<reqwest::Response, DirectoryError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let req = request.try_clone().ok_or_else(|| {
                DirectoryError::Transport(format!("{op}: request not retryable"))
            })?;

            let transient_message = match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }
                    if !is_transient_status(status) {
                        let body = resp.text().await.unwrap_or_default();
                        return Err(DirectoryError::Permanent {
                            status: status.as_u16(),
                            message: truncate(&body, 200),
                        });
                    }
                    format!("{op}: status {status}")
                }
                Err(err) => format!("{op}: {err}"),
            };

            if attempt > self.retry.max_retries {
                return Err(DirectoryError::Transient {
                    message: transient_message,
                    attempts: attempt,
                });
            }

            let delay = self.retry.delay(attempt);
            tracing::debug!(op, attempt, delay_ms = delay.as_millis() as u64,
                "transient directory error, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

impl TagDirectory for CrmClient {
    async fn get_tags(&self, contact: &str) -> Result<Vec<String>, DirectoryError> {
        let url = self.contact_tags_url(contact, None);
        let request = self.http.get(url).bearer_auth(&self.api_key);
        let resp = self.send_with_retry(request, "get_tags").await?;
        let body: TagsResponse = resp
            .json()
            .await
            .map_err(|e| DirectoryError::Transport(format!("get_tags: {e}")))?;
        Ok(body.tags)
    }

    async fn add_tag(&self, contact: &str, tag: &str) -> Result<(), DirectoryError> {
        let url = self.contact_tags_url(contact, None);
        let request = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "name": tag }));
        self.send_with_retry(request, "add_tag").await?;
        Ok(())
    }

    async fn remove_tag(&self, contact: &str, tag: &str) -> Result<(), DirectoryError> {
        let url = self.contact_tags_url(contact, Some(tag));
        let request = self.http.delete(url).bearer_auth(&self.api_key);
        self.send_with_retry(request, "remove_tag").await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
