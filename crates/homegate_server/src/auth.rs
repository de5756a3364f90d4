//! Session token issuance and verification.
//!
//! Tokens are signed with HMAC-SHA256 under a single shared secret and
//! carry no claims beyond their issue and expiry times.
//!
//! ## Token Format
//!
//! Tokens are composed of:
//! - 8 bytes: issued-at (Unix millis, big-endian, signed)
//! - 8 bytes: expires-at (Unix millis, big-endian, signed)
//! - 32 bytes: HMAC-SHA256 signature over the first 16 bytes
//!
//! Total: 48 bytes, base64url-encoded (no padding) for transport.

use crate::config::parse_duration_millis;
use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::debug;
use zeroize::Zeroizing;

type HmacSha256 = Hmac<Sha256>;

const PAYLOAD_LEN: usize = 16;
const TOKEN_LEN: usize = PAYLOAD_LEN + 32;

/// Default token lifetime.
pub const DEFAULT_TOKEN_LIFETIME: &str = "1 day";

/// How long an issued token stays valid. May be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetime(i64);

impl TokenLifetime {
    /// Parses a duration string such as `"1 day"` or `"-1s"`.
    pub fn parse(text: &str) -> ServerResult<Self> {
        parse_duration_millis(text).map(Self)
    }

    /// Creates a lifetime from signed milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Returns the lifetime in signed milliseconds.
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl Default for TokenLifetime {
    fn default() -> Self {
        Self(24 * 60 * 60 * 1000)
    }
}

impl From<Duration> for TokenLifetime {
    fn from(duration: Duration) -> Self {
        Self(i64::try_from(duration.as_millis()).unwrap_or(i64::MAX))
    }
}

/// Authentication configuration.
#[derive(Clone)]
pub struct AuthConfig {
    secret: Zeroizing<Vec<u8>>,
    password: Zeroizing<String>,
    lifetime: TokenLifetime,
}

impl AuthConfig {
    /// Creates a new auth configuration.
    ///
    /// An empty secret or password is a configuration error.
    pub fn new(secret: Vec<u8>, password: impl Into<String>) -> ServerResult<Self> {
        let password = password.into();
        if secret.is_empty() {
            return Err(ServerError::Config("token secret is empty".into()));
        }
        if password.is_empty() {
            return Err(ServerError::Config("login password is empty".into()));
        }
        Ok(Self {
            secret: Zeroizing::new(secret),
            password: Zeroizing::new(password),
            lifetime: TokenLifetime::default(),
        })
    }

    /// Sets the token lifetime.
    pub fn with_lifetime(mut self, lifetime: TokenLifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns the token lifetime.
    pub fn lifetime(&self) -> TokenLifetime {
        self.lifetime
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("password", &"<redacted>")
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

/// A signed session token in transport form.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Returns the encoded token.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning the encoded string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// The verified contents of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenClaims {
    /// Issue time, Unix millis.
    pub issued_at: i64,
    /// Expiry time, Unix millis.
    pub expires_at: i64,
}

/// Issues and verifies session tokens.
///
/// Each service owns its configuration, so independent services with
/// different secrets can coexist in one process.
#[derive(Clone)]
pub struct TokenService {
    config: AuthConfig,
}

impl TokenService {
    /// Creates a new token service.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token valid for the configured lifetime.
    pub fn issue(&self) -> SessionToken {
        self.issue_at(now_millis())
    }

    /// Issues a token as if the current time were `now` (Unix millis).
    pub fn issue_at(&self, now: i64) -> SessionToken {
        let expires_at = now.saturating_add(self.config.lifetime.as_millis());

        let mut data = Vec::with_capacity(TOKEN_LEN);
        data.extend_from_slice(&now.to_be_bytes());
        data.extend_from_slice(&expires_at.to_be_bytes());
        let signature = self.mac(&data).finalize().into_bytes();
        data.extend_from_slice(&signature);

        debug!(expires_at, "issued session token");
        SessionToken(URL_SAFE_NO_PAD.encode(data))
    }

    /// Verifies a token against the current time.
    ///
    /// Returns `None` for malformed, forged and expired tokens alike.
    pub fn verify(&self, token: &str) -> Option<TokenClaims> {
        self.verify_at(token, now_millis())
    }

    /// Verifies a token as if the current time were `now` (Unix millis).
    pub fn verify_at(&self, token: &str, now: i64) -> Option<TokenClaims> {
        let bytes = URL_SAFE_NO_PAD.decode(token.trim()).ok()?;
        if bytes.len() != TOKEN_LEN {
            return None;
        }
        let (payload, signature) = bytes.split_at(PAYLOAD_LEN);

        self.mac(payload).verify_slice(signature).ok()?;

        let issued_at = i64::from_be_bytes(payload[0..8].try_into().ok()?);
        let expires_at = i64::from_be_bytes(payload[8..16].try_into().ok()?);
        if now >= expires_at {
            return None;
        }

        Some(TokenClaims {
            issued_at,
            expires_at,
        })
    }

    /// Checks the login password and issues a token on success.
    pub fn login(&self, password: &str) -> Option<SessionToken> {
        let expected = self.config.password.as_bytes();
        if bool::from(expected.ct_eq(password.as_bytes())) {
            Some(self.issue())
        } else {
            None
        }
    }

    fn mac(&self, data: &[u8]) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .unwrap_or_else(|_| unreachable!("HMAC can take key of any size"));
        mac.update(data);
        mac
    }
}

fn now_millis() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn service() -> TokenService {
        TokenService::new(AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec(), "pw").unwrap())
    }

    #[test]
    fn issue_and_verify() {
        let tokens = service();
        let token = tokens.issue();

        let claims = tokens.verify(token.as_str()).unwrap();
        assert_eq!(claims.expires_at - claims.issued_at, 86_400_000);
    }

    #[test]
    fn default_lifetime_is_one_day() {
        assert_eq!(
            TokenLifetime::parse(DEFAULT_TOKEN_LIFETIME).unwrap(),
            TokenLifetime::default()
        );
    }

    #[test]
    fn reject_tampered_token() {
        let tokens = service();
        let mut bytes = URL_SAFE_NO_PAD.decode(tokens.issue().as_str()).unwrap();
        bytes[30] ^= 0xFF; // Flip a bit in the signature

        assert!(tokens.verify(&URL_SAFE_NO_PAD.encode(&bytes)).is_none());
    }

    #[test]
    fn reject_extended_expiry() {
        let tokens = service();
        let mut bytes = URL_SAFE_NO_PAD.decode(tokens.issue().as_str()).unwrap();
        bytes[8..16].copy_from_slice(&i64::MAX.to_be_bytes());

        assert!(tokens.verify(&URL_SAFE_NO_PAD.encode(&bytes)).is_none());
    }

    #[test]
    fn reject_negative_lifetime() {
        let config = AuthConfig::new(b"secret".to_vec(), "pw")
            .unwrap()
            .with_lifetime(TokenLifetime::parse("-1 s").unwrap());
        let tokens = TokenService::new(config);

        assert!(tokens.verify(tokens.issue().as_str()).is_none());
    }

    #[test]
    fn reject_at_expiry_boundary() {
        let tokens = service();
        let token = tokens.issue_at(1_000);

        assert!(tokens.verify_at(token.as_str(), 1_000 + 86_399_999).is_some());
        assert!(tokens.verify_at(token.as_str(), 1_000 + 86_400_000).is_none());
    }

    #[test]
    fn reject_other_secret() {
        let other = TokenService::new(AuthConfig::new(b"another-secret".to_vec(), "pw").unwrap());
        let token = service().issue();

        assert!(other.verify(token.as_str()).is_none());
    }

    #[test]
    fn reject_malformed() {
        let tokens = service();
        assert!(tokens.verify("").is_none());
        assert!(tokens.verify("not base64 !!").is_none());
        assert!(tokens.verify(&URL_SAFE_NO_PAD.encode([0u8; 12])).is_none());
    }

    #[test]
    fn login_checks_password() {
        let tokens = service();
        assert!(tokens.login("pw").is_some());
        assert!(tokens.login("PW").is_none());
        assert!(tokens.login("").is_none());
    }

    #[test]
    fn empty_secret_is_config_error() {
        assert!(matches!(
            AuthConfig::new(Vec::new(), "pw"),
            Err(ServerError::Config(_))
        ));
        assert!(matches!(
            AuthConfig::new(b"secret".to_vec(), ""),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = AuthConfig::new(b"topsecret".to_vec(), "hunter2").unwrap();
        let text = format!("{config:?}{:?}", service().issue());
        assert!(!text.contains("topsecret"));
        assert!(!text.contains("hunter2"));
    }

    proptest! {
        #[test]
        fn any_single_byte_change_is_rejected(index in 0usize..TOKEN_LEN, flip in 1u8..=255) {
            let tokens = service();
            let mut bytes = URL_SAFE_NO_PAD.decode(tokens.issue().as_str()).unwrap();
            bytes[index] ^= flip;
            prop_assert!(tokens.verify(&URL_SAFE_NO_PAD.encode(&bytes)).is_none());
        }
    }
}
