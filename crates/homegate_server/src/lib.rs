//! # Homegate Server
//!
//! Authenticated device API and push channel server.
//!
//! This crate provides:
//! - Session tokens (HMAC-SHA256, time limited, no server-side revocation)
//! - A per-request authentication context
//! - Field-level authorization via `require_login`
//! - The device schema and its resolvers
//! - The `DeviceGateway` seam plus an in-memory implementation
//! - Push fan-out over WebSocket
//!
//! # Authentication
//!
//! ```rust,ignore
//! use homegate_server::{AuthConfig, TokenService};
//!
//! let config = AuthConfig::new(secret, password)?;
//! let tokens = TokenService::new(config);
//!
//! let token = tokens.login("password").expect("wrong password");
//! assert!(tokens.verify(token.as_str()).is_some());
//! ```
//!
//! Every HTTP call carries the token in its `authorization` header; the
//! push channel carries it in the `token` query parameter. An empty,
//! malformed, forged or expired token is treated as no token at all.

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used)]

mod auth;
mod config;
mod context;
mod error;
mod gate;
mod gateway;
pub mod http;
mod push;
mod resolvers;
mod schema;
mod server;

pub use auth::{AuthConfig, SessionToken, TokenClaims, TokenLifetime, TokenService, DEFAULT_TOKEN_LIFETIME};
pub use config::{parse_duration_millis, ServerConfig};
pub use context::{is_valid_token, verify_token, AuthState, RequestContext};
pub use error::{ServerError, ServerResult, INVALID_CREDENTIALS};
pub use gate::{require_login, resolver, Resolver, AUTHENTICATION_REQUIRED};
pub use gateway::{DeviceGateway, GatewayError, GatewayResult, MemoryGateway};
pub use push::PushHub;
pub use resolvers::{device_schema, parse_patch};
pub use schema::{Schema, SchemaBuilder};
pub use server::ApiServer;
