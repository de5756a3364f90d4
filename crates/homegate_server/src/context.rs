//! Per-request authentication context.

use crate::auth::{TokenClaims, TokenService};
use crate::gateway::DeviceGateway;
use std::sync::Arc;
use tracing::debug;

const BEARER_PREFIX: &str = "Bearer ";

/// Authentication state of one request.
///
/// Starts `Unauthenticated`; moves to `Authenticated` at most once, before
/// any field resolves, and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No valid token was presented.
    Unauthenticated,
    /// A valid token was presented.
    Authenticated,
}

/// Context handed to every resolver for the lifetime of one API call.
#[derive(Clone)]
pub struct RequestContext {
    state: AuthState,
    gateway: Arc<dyn DeviceGateway>,
}

impl RequestContext {
    /// Builds the context from the raw `authorization` header value.
    ///
    /// A missing, empty, malformed, forged or expired token all yield an
    /// unauthenticated context.
    pub fn authenticate(
        tokens: &TokenService,
        header: Option<&str>,
        gateway: Arc<dyn DeviceGateway>,
    ) -> Self {
        let state = if is_valid_token(tokens, header) {
            AuthState::Authenticated
        } else {
            AuthState::Unauthenticated
        };
        Self { state, gateway }
    }

    /// Builds a context with an explicit state.
    pub fn with_state(state: AuthState, gateway: Arc<dyn DeviceGateway>) -> Self {
        Self { state, gateway }
    }

    /// Returns true if the request carried a valid session token.
    pub fn is_logged_in(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Returns the authentication state.
    pub fn state(&self) -> AuthState {
        self.state
    }

    /// Returns the device gateway.
    pub fn gateway(&self) -> &dyn DeviceGateway {
        self.gateway.as_ref()
    }
}

/// Verifies a header or query-parameter token value.
///
/// Used for both the HTTP `authorization` header and the push channel
/// `token` parameter so both transports share one check. An optional
/// `Bearer ` prefix is accepted in either place.
pub fn verify_token(tokens: &TokenService, value: Option<&str>) -> Option<TokenClaims> {
    let token = match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.strip_prefix(BEARER_PREFIX).unwrap_or(v),
        _ => return None,
    };
    let claims = tokens.verify(token);
    if claims.is_none() {
        debug!("rejected session token");
    }
    claims
}

/// Returns true if `value` carries a valid session token.
pub fn is_valid_token(tokens: &TokenService, value: Option<&str>) -> bool {
    verify_token(tokens, value).is_some()
}
