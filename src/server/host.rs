//! Server host: the composition root
//!
//! `ServerHost` owns the one connection registry of the process together
//! with the dispatcher and services built around it. Exposures (REST,
//! WebSocket) receive it as shared state and never build their own.

use crate::config::CourierConfig;
use crate::core::auth::TokenVerifier;
use crate::push::PushProvider;
use crate::realtime::{ConnectionRegistry, EventDispatcher};
use crate::service::{NotificationService, OrderService};
use crate::storage::{CatalogStore, ChatStore, DeviceTokenStore, NotificationStore, OrderStore};
use anyhow::Result;
use std::sync::Arc;

/// Every store the host wires together
pub struct Stores {
    pub notifications: Arc<dyn NotificationStore>,
    pub devices: Arc<dyn DeviceTokenStore>,
    pub orders: Arc<dyn OrderStore>,
    pub chats: Arc<dyn ChatStore>,
    pub catalog: Arc<dyn CatalogStore>,
}

pub struct ServerHost {
    pub config: Arc<CourierConfig>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub registry: Arc<ConnectionRegistry>,
    pub dispatcher: Arc<EventDispatcher>,
    pub orders: Arc<OrderService>,
    pub notifications: Arc<NotificationService>,
}

impl ServerHost {
    /// Build the host from builder components
    pub fn from_builder_components(
        config: CourierConfig,
        verifier: Arc<dyn TokenVerifier>,
        stores: Stores,
        push: Arc<dyn PushProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(ConnectionRegistry::new(config.realtime.outbound_buffer));
        let dispatcher = Arc::new(EventDispatcher::new(
            registry.clone(),
            config.realtime.scoped_broadcast,
            stores.notifications.clone(),
            stores.devices.clone(),
            push.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            stores.orders,
            stores.chats,
            stores.catalog,
            dispatcher.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            stores.notifications,
            stores.devices,
            dispatcher.clone(),
        ));

        tracing::debug!(
            push_provider = push.name(),
            scoped_broadcast = config.realtime.scoped_broadcast,
            "Server host assembled"
        );

        Ok(Self {
            config: Arc::new(config),
            verifier,
            registry,
            dispatcher,
            orders,
            notifications,
        })
    }

    /// Whether `key` matches the configured operator key
    pub fn is_operator_key(&self, key: &str) -> bool {
        self.config
            .auth
            .operator_key
            .as_deref()
            .is_some_and(|expected| !expected.is_empty() && expected == key)
    }
}
