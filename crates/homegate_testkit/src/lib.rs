//! # Homegate Testkit
//!
//! Test utilities for homegate.
//!
//! This crate provides:
//! - Fixed credentials and a sample device fleet
//! - In-process and loopback-bound servers
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use homegate_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn talks_to_a_real_server() {
//!     let server = TestServer::start(sample_gateway()).await;
//!     let origin = server.origin();
//!     // ... point a client at `origin`
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
