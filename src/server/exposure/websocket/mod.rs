//! WebSocket exposure
//!
//! Serves `/ws?token=<jwt>[&zoneId=<zone>]`, the persistent channel every
//! customer, restaurant and rider app holds open. The wire format lives in
//! [`crate::realtime::protocol`].
//!
//! # Architecture
//!
//! ```text
//! Client ──ws──▶ /ws ──▶ ws_handler() ──verify──▶ ConnectionRegistry
//!                                                      │
//!                       EventDispatcher ──Outbound──▶ write loop ──▶ Client
//! ```
//!
//! Building the router also spawns the liveness sweep for the host's
//! registry, so it must run inside a Tokio runtime.

mod handler;

use crate::realtime::spawn_liveness_sweep;
use crate::server::host::ServerHost;
use anyhow::Result;
use axum::{Router, routing::get};
use std::sync::Arc;

pub struct WebSocketExposure;

impl WebSocketExposure {
    /// Build the WebSocket router from a host
    pub fn build_router(host: Arc<ServerHost>) -> Result<Router> {
        let realtime = &host.config.realtime;
        spawn_liveness_sweep(
            host.registry.clone(),
            realtime.sweep_interval(),
            realtime.heartbeat_timeout(),
        );

        let router = Router::new()
            .route("/ws", get(handler::ws_handler))
            .with_state(host);

        Ok(router)
    }
}
