//! Shared HTTP plumbing: client construction and the fixed retry policy used
//! for robots.txt and page fetches.

use crate::error::Result;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{debug, warn};

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Gateway-style statuses worth another attempt.
pub const RETRY_STATUSES: [u16; 4] = [500, 502, 503, 504];

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: usize,
    pub backoff_factor: Duration,
}

impl RetryPolicy {
    pub const fn new(attempts: usize, backoff_factor: Duration) -> Self {
        Self {
            attempts,
            backoff_factor,
        }
    }

    /// No sleeping between attempts, used by tests and local fixtures.
    pub const fn immediate(attempts: usize) -> Self {
        Self::new(attempts, Duration::ZERO)
    }

    pub fn delay(&self, attempt: usize) -> Duration {
        self.backoff_factor * 2u32.saturating_pow(attempt as u32)
    }
}

pub fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout / 2)
        .no_proxy()
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()?;
    Ok(client)
}

/// GET `url`, retrying transport errors and [`RETRY_STATUSES`] until the
/// policy's attempts are used up. The last response is returned as-is, so
/// callers still decide what a non-200 status means for them.
pub async fn get_with_retries(client: &Client, url: &str, policy: RetryPolicy) -> Result<Response> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        let outcome = client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await;
        let last = attempt + 1 >= attempts;
        match outcome {
            Ok(response) => {
                let status = response.status().as_u16();
                if last || !RETRY_STATUSES.contains(&status) {
                    return Ok(response);
                }
                debug!("Retrying {} after status {}", url, status);
            }
            Err(e) => {
                if last {
                    return Err(e.into());
                }
                warn!("Attempt {} for {} failed: {}", attempt + 1, url, e);
            }
        }
        tokio::time::sleep(policy.delay(attempt)).await;
        attempt += 1;
    }
}
