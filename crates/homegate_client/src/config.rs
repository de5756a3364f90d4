//! Configuration for the client.

use crate::error::{ClientError, ClientResult};
use std::time::Duration;
use url::Url;

/// Configuration for talking to one homegate server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server origin, e.g. `http://127.0.0.1:4000`.
    pub origin: Url,
    /// Timeout for one API request.
    pub request_timeout: Duration,
    /// Retry policy for API requests that fail with a retryable error.
    pub retry: RetryConfig,
    /// Backoff policy for push channel reconnects. `max_attempts` is
    /// ignored there: reconnects never give up while a token is held.
    pub reconnect: RetryConfig,
}

impl ClientConfig {
    /// Creates a configuration for `origin`.
    ///
    /// Only `http` and `https` origins are accepted.
    pub fn new(origin: &str) -> ClientResult<Self> {
        let origin =
            Url::parse(origin).map_err(|e| ClientError::InvalidOrigin(format!("{origin}: {e}")))?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ClientError::InvalidOrigin(format!(
                "unsupported scheme `{}`",
                origin.scheme()
            )));
        }
        if origin.host_str().is_none() {
            return Err(ClientError::InvalidOrigin("missing host".into()));
        }

        Ok(Self {
            origin,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::new(3),
            reconnect: RetryConfig::new(u32::MAX).with_max_delay(Duration::from_secs(10)),
        })
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the request retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the reconnect backoff policy.
    pub fn with_reconnect(mut self, reconnect: RetryConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// URL of the API endpoint.
    pub fn api_url(&self) -> ClientResult<Url> {
        self.origin
            .join("/graphql")
            .map_err(|e| ClientError::InvalidOrigin(e.to_string()))
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay, before jitter.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Calculates the delay before attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        // `min`/`max` drop a NaN operand; the result is in [0, max_delay].
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64()).max(0.0);

        let delay_secs = if self.add_jitter {
            // Up to 25% on top.
            delay_secs + delay_secs * 0.25 * time_jitter()
        } else {
            delay_secs
        };
        Duration::try_from_secs_f64(delay_secs).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

fn time_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    f64::from(nanos % 1000) / 1000.0
}
