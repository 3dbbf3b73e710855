//! Page fetching with rate limiting, TLS policy and retries
//!
//! [`HttpFetcher`] performs single requests. [`RetryingFetcher`] wraps any
//! [`PageFetcher`] and retries transient failures according to a
//! [`RetryPolicy`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::{Quota, RateLimiter, clock::DefaultClock, state::{InMemoryState, direct::NotKeyed}};
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::infrastructure::config::HttpConfig;
use crate::infrastructure::fetch_error::FetchError;
use crate::infrastructure::retry_policy::{RetryPolicy, Sleeper, TokioSleeper};

/// Body of a successfully fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url`; non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        (**self).fetch(url).await
    }
}

/// reqwest-backed fetcher
pub struct HttpFetcher {
    verified: Client,
    unverified: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    verify_tls: bool,
    insecure_domains: Vec<String>,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("de-DE,de;q=0.9,en;q=0.8"));

        let build = |accept_invalid_certs: bool| {
            Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
                .default_headers(headers.clone())
                .cookie_store(true)
                .redirect(reqwest::redirect::Policy::limited(10))
                .danger_accept_invalid_certs(accept_invalid_certs)
                .build()
                .context("Failed to create HTTP client")
        };

        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).context("Rate limit must be greater than 0")?,
        );

        Ok(Self {
            verified: build(false)?,
            unverified: build(true)?,
            rate_limiter: RateLimiter::direct(quota),
            verify_tls: config.verify_tls,
            insecure_domains: config
                .insecure_domains
                .iter()
                .map(|d| d.trim().trim_start_matches("www.").to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        })
    }

    /// Whether certificates are checked for this host
    pub fn verifies_tls_for(&self, host: &str) -> bool {
        if !self.verify_tls {
            return false;
        }
        let host = host.to_lowercase();
        !self
            .insecure_domains
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl { url: url.to_string() })?;
        let host = parsed.host_str().unwrap_or_default();
        let client = if self.verifies_tls_for(host) {
            &self.verified
        } else {
            &self.unverified
        };

        self.rate_limiter.until_ready().await;
        debug!("🌐 Fetching {}", url);

        let response = client
            .get(parsed)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        debug!("✅ Fetched {} ({} chars)", url, body.len());

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Retries transient failures of the inner fetcher with capped backoff
pub struct RetryingFetcher<F, S = TokioSleeper> {
    inner: F,
    policy: RetryPolicy,
    sleeper: S,
}

impl<F: PageFetcher> RetryingFetcher<F, TokioSleeper> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self::with_sleeper(inner, policy, TokioSleeper)
    }
}

impl<F: PageFetcher, S: Sleeper> RetryingFetcher<F, S> {
    pub fn with_sleeper(inner: F, policy: RetryPolicy, sleeper: S) -> Self {
        Self { inner, policy, sleeper }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<F: PageFetcher, S: Sleeper> PageFetcher for RetryingFetcher<F, S> {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let error = match self.inner.fetch(url).await {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            if !error.is_transient() {
                return Err(error);
            }
            if !self.policy.should_retry(attempts) {
                warn!("❌ Giving up on {} after {} attempts: {}", url, attempts, error);
                return Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts,
                    last: Box::new(error),
                });
            }

            let delay = self.policy.delay_for(attempts);
            warn!(
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                "🔄 Transient error for {}, retrying: {}",
                url,
                error
            );
            self.sleeper.sleep(delay).await;
        }
    }
}
