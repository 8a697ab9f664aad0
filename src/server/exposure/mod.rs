//! API exposures
//!
//! Each exposure consumes the shared `ServerHost` and produces a Router for
//! its protocol.

pub mod rest;
pub mod websocket;

pub use rest::RestExposure;
pub use websocket::WebSocketExposure;
