//! # Homegate Client
//!
//! Keeps a client's view of the device fleet coherent while three sources
//! write to it: the user's optimistic edits, API responses and push
//! events.
//!
//! This crate provides:
//! - The color model (`calculate_device_color`, `hsv_to_rgb`)
//! - `DeviceStore`, the per-attribute reconciliation store
//! - `Session`, the token holder
//! - `ApiTransport` with an HTTP implementation and a mock
//! - `PushChannel`, the self-healing push connection
//! - `DeviceController`, which runs optimistic edits end to end
//!
//! # Example
//!
//! ```rust,ignore
//! use homegate_client::{ClientConfig, HomegateClient};
//!
//! let client = HomegateClient::new(ClientConfig::new("http://127.0.0.1:4000")?)?;
//! client.controller().login("password").await?;
//! client.controller().refresh_devices().await?;
//! client.controller().set_color("lamp", 200.0, 0.8).await?;
//!
//! let color = client.store().current_color("lamp");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used)]

mod client;
pub mod color;
mod config;
mod controller;
mod error;
mod http;
pub mod push;
mod session;
mod store;
mod transport;

pub use client::HomegateClient;
pub use color::{calculate_device_color, hsv_to_rgb, temperature_to_rgb, Rgb};
pub use config::{ClientConfig, RetryConfig};
pub use controller::DeviceController;
pub use error::{ClientError, ClientResult};
pub use http::HttpTransport;
pub use push::{push_url, PushChannel, PushConnection, PushConnector, PushState, TungsteniteConnector};
pub use session::Session;
pub use store::{layered, Attribute, DeviceStore, DeviceView, SyncOutcome};
pub use transport::{ApiTransport, MockTransport, RecordedRequest};
