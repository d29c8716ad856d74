//! The rate-limited EDGAR HTTP client.
//!
//! Every byte the library fetches flows through [`EdgarClient`]. It owns the three
//! concerns the SEC cares about: an identifying user-agent on every request, a
//! token-bucket rate limit (10 requests per second unless configured lower), and
//! polite retry behavior when the server pushes back.
//!
//! Retries are decided per response by [`Disposition`]: HTTP 429 and transport
//! failures retry with capped exponential backoff and full jitter (honoring
//! `Retry-After` when the server names a delay), 404 maps to
//! [`FilingError::NotFound`], and everything else fails fast. The backoff window
//! for attempt `n` is `[750ms · 2ⁿ / 2, 750ms · 2ⁿ]`; jitter spreads a fleet of
//! clients that all hit the limit at the same moment.

use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER, USER_AGENT};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::config::{EdgarConfig, EdgarUrls};
use super::error::{FilingError, Result};

/// Transient failures are retried this many times before giving up.
const RETRY_ATTEMPTS: u32 = 4;

/// Base backoff window; doubles per attempt.
const BASE_DELAY_MS: u64 = 750;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// What to do with one HTTP outcome.
#[derive(Debug)]
enum Disposition {
    Success,
    Missing,
    /// Retry, waiting at least this long when the server said so.
    Backoff(Option<Duration>),
    Fatal(StatusCode),
}

impl Disposition {
    fn of(status: StatusCode, headers: &HeaderMap) -> Self {
        match status {
            StatusCode::OK => Disposition::Success,
            StatusCode::NOT_FOUND => Disposition::Missing,
            StatusCode::TOO_MANY_REQUESTS => {
                let server_delay = headers
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .map(Duration::from_secs);
                Disposition::Backoff(server_delay)
            }
            other => Disposition::Fatal(other),
        }
    }
}

/// Backoff for a retry attempt: full jitter over the upper half of the doubled
/// window, so attempt 0 sleeps 375-750ms, attempt 1 sleeps 750-1500ms, and so on.
fn backoff_delay(attempt: u32) -> Duration {
    let ceiling = BASE_DELAY_MS.saturating_mul(1 << attempt.min(10));
    let floor = ceiling / 2;
    Duration::from_millis(floor + fastrand::u64(0..=ceiling - floor))
}

/// HTTP client for the SEC EDGAR system.
///
/// Construct one per process with your identity string and share it; it is cheap
/// to clone and the rate limiter is shared across clones, which is exactly what
/// the SEC's fair-access policy expects of a single application.
///
/// ```rust
/// # use filingkit::EdgarClient;
/// let edgar = EdgarClient::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), filingkit::FilingError>(())
/// ```
///
/// The defaults (10 req/s, 30s timeout, sec.gov endpoints) suit production use;
/// [`EdgarClient::with_config`] exists for tests against mock servers and for
/// deliberately slower crawls:
///
/// ```rust
/// # use filingkit::{EdgarClient, EdgarConfig, EdgarUrls};
/// # use std::time::Duration;
/// let config = EdgarConfig {
///     user_agent: "custom_app/2.0".to_string(),
///     rate_limit: 5,
///     timeout: Duration::from_secs(60),
///     base_urls: EdgarUrls::default(),
/// };
/// let edgar = EdgarClient::with_config(config)?;
/// # Ok::<(), filingkit::FilingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EdgarClient {
    pub(crate) client: reqwest::Client,
    pub(crate) limiter: Arc<Limiter>,
    pub(crate) urls: EdgarUrls,
}

impl EdgarClient {
    /// Creates a client with SEC-compliant defaults.
    ///
    /// `user_agent` is the identity the SEC requires: an application name and a
    /// working contact address, e.g. `"my_app/1.0 (me@example.com)"`. It is set
    /// here, at construction, and nowhere else.
    ///
    /// # Errors
    ///
    /// `FilingError::ConfigError` when the identity string is not a valid header
    /// value.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_config(EdgarConfig {
            user_agent: user_agent.to_string(),
            ..EdgarConfig::default()
        })
    }

    /// Creates a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// `FilingError::ConfigError` for an invalid user agent, a zero rate limit, or
    /// a reqwest client that cannot be built.
    pub fn with_config(config: EdgarConfig) -> Result<Self> {
        let identity = HeaderValue::from_str(&config.user_agent)
            .map_err(|e| FilingError::ConfigError(format!("Invalid user agent: {}", e)))?;
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, identity);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FilingError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.rate_limit).ok_or_else(|| {
            FilingError::ConfigError("Rate limit must be greater than zero".to_string())
        })?;

        Ok(EdgarClient {
            client,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            urls: config.base_urls,
        })
    }

    /// One rate-limited request with retries; returns the successful response.
    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            self.limiter.until_ready().await;

            let outcome = self.client.get(url).send().await;
            let retry_delay = match outcome {
                Ok(response) => {
                    match Disposition::of(response.status(), response.headers()) {
                        Disposition::Success => return Ok(response),
                        Disposition::Missing => return Err(FilingError::NotFound),
                        Disposition::Fatal(status) => {
                            let preview = response
                                .text()
                                .await
                                .unwrap_or_default()
                                .chars()
                                .take(200)
                                .collect::<String>();
                            return Err(FilingError::InvalidResponse(format!(
                                "Unexpected status code: {} for URL: {}. Response preview: {}",
                                status, url, preview
                            )));
                        }
                        Disposition::Backoff(server_delay) => {
                            if attempt >= RETRY_ATTEMPTS {
                                return Err(FilingError::RateLimitExceeded);
                            }
                            server_delay.unwrap_or_else(|| backoff_delay(attempt))
                        }
                    }
                }
                Err(error) => {
                    if attempt >= RETRY_ATTEMPTS {
                        return Err(FilingError::RequestError(error));
                    }
                    tracing::warn!(
                        "Request failed for {}: {}; attempt {} of {}",
                        url,
                        error,
                        attempt + 1,
                        RETRY_ATTEMPTS + 1
                    );
                    backoff_delay(attempt)
                }
            };

            tracing::warn!(
                "Backing off {:?} before retrying {} (attempt {} of {})",
                retry_delay,
                url,
                attempt + 1,
                RETRY_ATTEMPTS + 1
            );
            tokio::time::sleep(retry_delay).await;
            attempt += 1;
        }
    }

    /// Fetches a text resource.
    ///
    /// For `.json` URLs the body is sanity-checked: the SEC's error pages come back
    /// as HTML, occasionally even with a 200, and the JSON endpoints sometimes
    /// mislabel valid JSON as `text/html`. A body that starts like JSON is accepted
    /// regardless of the header; an HTML body for a JSON URL is surfaced as
    /// [`FilingError::UnexpectedContentType`] with a preview for debugging.
    pub async fn get(&self, url: &str) -> Result<String> {
        let response = self.send(url).await?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let body = response.text().await.map_err(FilingError::RequestError)?;

        if url.ends_with(".json") && content_type.contains("text/html") {
            if looks_like_json(&body) {
                tracing::warn!(
                    "JSON endpoint {} answered with a text/html content type; body is JSON, continuing",
                    url
                );
            } else {
                return Err(FilingError::UnexpectedContentType {
                    url: url.to_string(),
                    expected_pattern: "application/json".to_string(),
                    got_content_type: content_type,
                    content_preview: body.chars().take(200).collect(),
                });
            }
        }

        Ok(body)
    }

    /// Fetches a binary resource (gzipped index archives, mostly).
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(FilingError::RequestError)
    }

    /// Base URL for EDGAR archives (historical filings).
    pub fn archives_url(&self) -> &str {
        &self.urls.archives
    }

    /// Base URL for the EDGAR data API (structured data).
    pub fn data_url(&self) -> &str {
        &self.urls.data
    }

    /// Base URL for EDGAR support files (ticker mappings, etc.).
    pub fn files_url(&self) -> &str {
        &self.urls.files
    }
}

fn looks_like_json(body: &str) -> bool {
    matches!(body.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_windows() {
        for _ in 0..50 {
            let first = backoff_delay(0).as_millis();
            assert!((375..=750).contains(&first), "attempt 0 slept {}ms", first);

            let second = backoff_delay(1).as_millis();
            assert!((750..=1500).contains(&second), "attempt 1 slept {}ms", second);

            let third = backoff_delay(2).as_millis();
            assert!((1500..=3000).contains(&third), "attempt 2 slept {}ms", third);
        }
    }

    #[test]
    fn test_backoff_shift_is_capped() {
        // Pathological attempt counts must not overflow the shift.
        let huge = backoff_delay(64);
        assert!(huge >= backoff_delay(0));
    }

    #[test]
    fn test_json_sniffing() {
        assert!(looks_like_json("{\"cik\": 320193}"));
        assert!(looks_like_json("  [1, 2, 3]"));
        assert!(!looks_like_json("<html><body>Rate limited</body></html>"));
        assert!(!looks_like_json(""));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let config = EdgarConfig {
            rate_limit: 0,
            ..EdgarConfig::default()
        };
        assert!(matches!(
            EdgarClient::with_config(config),
            Err(FilingError::ConfigError(_))
        ));
    }
}
