//! Server configuration.

use crate::auth::{AuthConfig, TokenLifetime};
use crate::error::{ServerError, ServerResult};
use std::net::SocketAddr;
use std::time::Duration;

/// Environment variable holding the token signing secret.
pub const ENV_SECRET: &str = "HOMEGATE_SECRET";
/// Environment variable holding the login password.
pub const ENV_PASSWORD: &str = "HOMEGATE_PASSWORD";
/// Environment variable holding the token lifetime (e.g. `"1 day"`).
pub const ENV_TOKEN_TTL: &str = "HOMEGATE_TOKEN_TTL";
/// Environment variable holding the bind address.
pub const ENV_BIND: &str = "HOMEGATE_BIND";

/// Configuration for the API server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Token and credential settings.
    pub auth: AuthConfig,
    /// Request timeout.
    pub request_timeout: Duration,
    /// Capacity of the push fan-out buffer per subscriber.
    pub push_buffer: usize,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr, auth: AuthConfig) -> Self {
        Self {
            bind_addr,
            auth,
            request_timeout: Duration::from_secs(30),
            push_buffer: 64,
        }
    }

    /// Reads the configuration from `HOMEGATE_*` environment variables.
    ///
    /// The secret and password are required; their absence is a
    /// configuration error the process should not start with.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup(ENV_SECRET)
            .ok_or_else(|| ServerError::Config(format!("{ENV_SECRET} is not set")))?;
        let password = lookup(ENV_PASSWORD)
            .ok_or_else(|| ServerError::Config(format!("{ENV_PASSWORD} is not set")))?;

        let mut auth = AuthConfig::new(secret.into_bytes(), password)?;
        if let Some(ttl) = lookup(ENV_TOKEN_TTL) {
            auth = auth.with_lifetime(TokenLifetime::parse(&ttl)?);
        }

        let bind_addr = match lookup(ENV_BIND) {
            Some(addr) => addr
                .parse()
                .map_err(|e| ServerError::Config(format!("{ENV_BIND}: {e}")))?,
            None => default_bind_addr(),
        };

        Ok(Self::new(bind_addr, auth))
    }

    /// Sets the bind address.
    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the push buffer capacity.
    pub fn with_push_buffer(mut self, capacity: usize) -> Self {
        self.push_buffer = capacity.max(1);
        self
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 4000))
}

/// Parses a human duration such as `"1 day"`, `"12h"` or `"-5 s"` into
/// signed milliseconds. A bare number is taken as seconds.
pub fn parse_duration_millis(input: &str) -> ServerResult<i64> {
    let text = input.trim();
    let invalid = || ServerError::Config(format!("invalid duration: {input:?}"));

    let split = text
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let scale: f64 = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" | "msec" | "millisecond" | "milliseconds" => 1.0,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1_000.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000.0,
        "d" | "day" | "days" => 86_400_000.0,
        "w" | "week" | "weeks" => 604_800_000.0,
        _ => return Err(invalid()),
    };

    let millis = value * scale;
    if !millis.is_finite() || millis.abs() > i64::MAX as f64 {
        return Err(invalid());
    }
    Ok(millis.round() as i64)
}
