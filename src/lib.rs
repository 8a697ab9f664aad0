//! # Courier
//!
//! Real-time order event distribution for a multi-vendor food delivery
//! platform.
//!
//! Customers, restaurants and riders each hold one authenticated WebSocket.
//! Every order lifecycle change, chat message and direct notification is
//! persisted to the recipient's history and routed to the live connections
//! it addresses: one actor, or every actor of a role. Actors with no live
//! connection fall back to device push.
//!
//! ## Features
//!
//! - **Connection registry**: one live connection per actor, replaced on reconnect
//! - **Addressed routing**: to an actor or a role, optionally narrowed by restaurant or zone
//! - **Liveness**: periodic sweep evicts silent connections and pings the rest
//! - **Order lifecycle**: placement, pricing and the status state machine
//! - **Order chat**: messages between the parties of an order
//! - **Notification history**: persisted before delivery, readable over REST
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! let mut config = CourierConfig::from_yaml_file("courier.yaml")?;
//! config.apply_env_overrides();
//! let bind = config.server.bind.clone();
//!
//! ServerBuilder::new()
//!     .with_config(config)
//!     .with_catalog_store(catalog)
//!     .serve(&bind)
//!     .await?;
//! ```

pub mod config;
pub mod core;
pub mod orders;
pub mod push;
pub mod realtime;
pub mod server;
pub mod service;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{Caller, Identity, JwtVerifier, Role, TokenVerifier},
        error::{AuthError, CourierError, OrderError},
        events::{Address, DomainEvent, RoutedEvent, Scope},
    };

    // === Orders ===
    pub use crate::orders::{
        ChatMessage, Charges, Coupon, Discount, Food, LineItemInput, NewOrder, Order,
        OrderStatus, PriceBreakdown, Restaurant, Rider, Variation,
    };

    // === Real-time ===
    pub use crate::realtime::{
        ConnectionRegistry, DispatchReport, EventDispatcher, Outbound, ServerMessage,
    };

    // === Storage ===
    pub use crate::storage::{
        CatalogStore, ChatStore, DeviceToken, DeviceTokenStore, InMemoryCatalogStore,
        InMemoryChatStore, InMemoryDeviceTokenStore, InMemoryNotificationStore,
        InMemoryOrderStore, Notification, NotificationStore, OrderStore,
    };

    // === Push ===
    pub use crate::push::{LogPushProvider, PushMessage, PushProvider};

    // === Config ===
    pub use crate::config::CourierConfig;

    // === Server ===
    pub use crate::server::{ServerBuilder, ServerHost};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use rust_decimal::Decimal;
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
