// src/services/fetcher.rs

//! Rate-limited HTTP fetching with retries.
//!
//! All outbound traffic goes through [`RateLimitedFetcher`], which enforces
//! a global minimum interval between requests, rotates client identities
//! across attempts, and retries transient failures with exponential backoff.

use std::time::Duration;

use rand::Rng;
use reqwest::{Client, StatusCode, header};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{AppError, Result};
use crate::models::FetchConfig;

/// Global minimum-interval limiter for outbound requests.
///
/// The last-request instant is guarded by an async mutex so concurrent
/// callers queue up on it; waiting is cancellable by dropping the future.
#[derive(Debug)]
struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(requests_per_second: f64) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(1.0 / requests_per_second),
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request is allowed, then claim the slot.
    async fn acquire(&self) {
        let mut last_request = self.last_request.lock().await;
        if let Some(last) = *last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last_request = Some(Instant::now());
    }
}

/// HTTP fetcher with a global rate cap and retry on transient failures.
pub struct RateLimitedFetcher {
    client: Client,
    limiter: RateLimiter,
    max_attempts: u32,
    backoff_base: Duration,
    cooldown_secs: (u64, u64),
    user_agents: Vec<String>,
}

impl RateLimitedFetcher {
    /// Create a fetcher from the fetch configuration.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            limiter: RateLimiter::new(config.requests_per_second),
            max_attempts: config.max_attempts,
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            cooldown_secs: (config.cooldown_min_secs, config.cooldown_max_secs),
            user_agents: config.user_agents.clone(),
        })
    }

    /// Fetch a URL and return the response body.
    ///
    /// Any non-2xx status or transport error counts as a retryable failure.
    /// After the attempt ceiling is exhausted the last error is reported in
    /// [`AppError::FetchExhausted`].
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.backoff_with_jitter(attempt)).await;
            }

            self.limiter.acquire().await;

            match self.attempt(url, attempt).await {
                Ok(body) => {
                    log::debug!("Fetched {} on attempt {}", url, attempt + 1);
                    return Ok(body);
                }
                Err(AttemptError::Status(status)) => {
                    last_error = format!("status {status}");
                    log::warn!(
                        "Attempt {} for {} failed with status {}",
                        attempt + 1,
                        url,
                        status
                    );
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let cooldown = self.throttle_cooldown();
                        log::warn!("Upstream throttling, cooling down for {:?}", cooldown);
                        tokio::time::sleep(cooldown).await;
                    }
                }
                Err(AttemptError::Transport(e)) => {
                    last_error = e.to_string();
                    log::warn!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                }
            }
        }

        Err(AppError::FetchExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            last: last_error,
        })
    }

    /// Issue a single request with the identity for this attempt.
    async fn attempt(&self, url: &str, attempt: u32) -> std::result::Result<String, AttemptError> {
        let agent = &self.user_agents[attempt as usize % self.user_agents.len()];
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, agent.as_str())
            .header(
                header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .await
            .map_err(AttemptError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::Status(status));
        }

        response.text().await.map_err(AttemptError::Transport)
    }

    /// Exponential backoff for the given attempt plus uniform random jitter
    /// in `[0, backoff)`.
    fn backoff_with_jitter(&self, attempt: u32) -> Duration {
        let backoff = self.backoff_base * 2u32.saturating_pow(attempt);
        let jitter = backoff.mul_f64(rand::thread_rng().gen_range(0.0..1.0));
        backoff + jitter
    }

    /// Randomized extra sleep after an upstream 429.
    fn throttle_cooldown(&self) -> Duration {
        let (min, max) = self.cooldown_secs;
        Duration::from_secs(rand::thread_rng().gen_range(min..=max))
    }
}

/// Outcome of a single request attempt.
enum AttemptError {
    Status(StatusCode),
    Transport(reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Config with millisecond delays so retry tests run quickly.
    fn fast_config() -> FetchConfig {
        FetchConfig {
            backoff_base_ms: 1,
            cooldown_min_secs: 0,
            cooldown_max_secs: 0,
            ..FetchConfig::default()
        }
    }

    #[tokio::test]
    async fn fetch_returns_body_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RateLimitedFetcher::new(&FetchConfig {
            requests_per_second: 1000.0,
            ..fast_config()
        })
        .unwrap();

        let body = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn fetch_retries_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("after retry"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RateLimitedFetcher::new(&FetchConfig {
            requests_per_second: 1000.0,
            ..fast_config()
        })
        .unwrap();

        let body = fetcher
            .fetch(&format!("{}/flaky", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "after retry");
        // Mock expectations verify exactly 2 attempts were observed.
    }

    #[tokio::test]
    async fn fetch_exhausts_after_attempt_ceiling() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = RateLimitedFetcher::new(&FetchConfig {
            requests_per_second: 1000.0,
            ..fast_config()
        })
        .unwrap();

        let err = fetcher
            .fetch(&format!("{}/broken", server.uri()))
            .await
            .unwrap_err();
        match err {
            AppError::FetchExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(last.contains("500"), "last error was: {last}");
            }
            other => panic!("expected FetchExhausted, got {other}"),
        }
    }

    #[tokio::test]
    async fn fetch_cools_down_after_throttle_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/throttled"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = RateLimitedFetcher::new(&FetchConfig {
            requests_per_second: 1000.0,
            ..fast_config()
        })
        .unwrap();

        let body = fetcher
            .fetch(&format!("{}/throttled", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn limiter_first_acquire_is_immediate() {
        tokio::time::pause();

        let limiter = RateLimiter::new(0.5);
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn limiter_spaces_subsequent_acquires() {
        tokio::time::pause();

        let limiter = RateLimiter::new(0.5);
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(2));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[test]
    fn backoff_doubles_per_attempt_with_bounded_jitter() {
        let fetcher = RateLimitedFetcher::new(&FetchConfig::default()).unwrap();

        for _ in 0..50 {
            let first = fetcher.backoff_with_jitter(1);
            assert!(first >= Duration::from_secs(2));
            assert!(first < Duration::from_secs(4));

            let second = fetcher.backoff_with_jitter(2);
            assert!(second >= Duration::from_secs(4));
            assert!(second < Duration::from_secs(8));
        }
    }
}
