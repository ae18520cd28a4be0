use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{DataError, DataResult};

/// Upper bound on a downloaded payload; the JHU US file is tens of megabytes.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Narrow interface to the remote CSV endpoints.
pub trait Fetch {
    fn fetch_text(&self, url: &str) -> DataResult<String>;
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Blocking HTTP GET with a global timeout and bounded retries.
pub struct HttpFetcher {
    agent: ureq::Agent,
    retry: RetryPolicy,
}

enum Attempt {
    Transient(String),
    Fatal(String),
}

impl HttpFetcher {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        let agent = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent, retry }
    }

    fn attempt(&self, url: &str) -> Result<String, Attempt> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|err| Attempt::Transient(err.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 || status >= 500 {
            return Err(Attempt::Transient(format!("HTTP {status}")));
        }
        if status >= 400 {
            return Err(Attempt::Fatal(format!("HTTP {status}")));
        }

        let mut body = response.into_body();
        body.with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_string()
            .map_err(|err| Attempt::Transient(err.to_string()))
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), RetryPolicy::default())
    }
}

impl Fetch for HttpFetcher {
    fn fetch_text(&self, url: &str) -> DataResult<String> {
        let attempts = self.retry.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!("GET {} (attempt {}/{})", url, attempt, attempts);
            match self.attempt(url) {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(message)) => {
                    return Err(DataError::Fetch {
                        url: url.to_string(),
                        message,
                    })
                }
                Err(Attempt::Transient(message)) => {
                    if attempt < attempts {
                        let delay = self.retry.delay_for(attempt);
                        warn!("{} failed: {}; retrying in {:?}", url, message, delay);
                        thread::sleep(delay);
                    }
                    last_error = message;
                }
            }
        }

        Err(DataError::Fetch {
            url: url.to_string(),
            message: format!("gave up after {attempts} attempts: {last_error}"),
        })
    }
}
