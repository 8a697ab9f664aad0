//! HTTP + WebSocket server
//!
//! [`ServerBuilder`] assembles a [`ServerHost`] from configuration and
//! stores, then merges the REST and WebSocket exposures over it.

pub mod builder;
pub mod exposure;
pub mod host;

pub use builder::ServerBuilder;
pub use exposure::{RestExposure, WebSocketExposure};
pub use host::{ServerHost, Stores};
