//! # Homegate Protocol
//!
//! Wire types shared by the homegate API server and its clients.
//!
//! This crate provides:
//! - `Device`, `DeviceKind` and the partial `DeviceState` record
//! - The GraphQL-style request/response envelope (`ApiRequest`, `ApiResponse`)
//! - `PushEvent` frames sent over the push channel
//!
//! This is a pure protocol crate with no I/O operations. Everything is
//! JSON with camelCase field names.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod device;
mod envelope;
mod error;
mod event;

pub use device::{Device, DeviceKind, DeviceState, LIGHT_LEVEL_MAX};
pub use envelope::{ApiError, ApiRequest, ApiResponse, ErrorCode, OperationKind};
pub use error::{ProtocolError, ProtocolResult};
pub use event::PushEvent;
