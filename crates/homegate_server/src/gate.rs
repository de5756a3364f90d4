//! Field-level authorization.
//!
//! `require_login` wraps a resolver at registration time. The wrapper
//! checks the request context before the wrapped body runs, so a rejected
//! call has no side effects.

use crate::context::RequestContext;
use crate::error::{ServerError, ServerResult};
use homegate_protocol::ApiRequest;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Message returned when a gated field is called without a session.
pub const AUTHENTICATION_REQUIRED: &str = "You must be logged in to perform this action";

/// A field resolver.
pub type Resolver =
    Arc<dyn Fn(&RequestContext, &ApiRequest) -> ServerResult<Value> + Send + Sync>;

/// Wraps `resolver` so it only runs for logged-in requests.
///
/// The wrapped resolver's return value and errors pass through unchanged.
pub fn require_login(resolver: Resolver) -> Resolver {
    Arc::new(move |ctx: &RequestContext, request: &ApiRequest| {
        if !ctx.is_logged_in() {
            warn!(field = %request.field, "rejected unauthenticated call");
            return Err(ServerError::Unauthenticated);
        }
        resolver(ctx, request)
    })
}

/// Builds a resolver from a closure.
pub fn resolver<F>(f: F) -> Resolver
where
    F: Fn(&RequestContext, &ApiRequest) -> ServerResult<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}
