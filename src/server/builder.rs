//! ServerBuilder for fluent API to build HTTP servers

use super::exposure::{RestExposure, WebSocketExposure};
use super::host::{ServerHost, Stores};
use crate::config::{CourierConfig, PushProviderKind};
use crate::core::auth::{JwtVerifier, TokenVerifier};
use crate::push::{LogPushProvider, PushProvider};
use crate::storage::{
    CatalogStore, ChatStore, DeviceTokenStore, InMemoryCatalogStore, InMemoryChatStore,
    InMemoryDeviceTokenStore, InMemoryNotificationStore, InMemoryOrderStore, NotificationStore,
    OrderStore,
};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the courier HTTP + WebSocket server
///
/// Unset stores default to their in-memory implementations, the verifier to
/// an HS256 [`JwtVerifier`] over `auth.jwt_secret`, and the push provider to
/// whatever `push.provider` names.
///
/// # Example
///
/// ```rust,ignore
/// let app = ServerBuilder::new()
///     .with_config(CourierConfig::from_yaml_file("courier.yaml")?)
///     .with_catalog_store(catalog)
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: CourierConfig,
    verifier: Option<Arc<dyn TokenVerifier>>,
    notifications: Option<Arc<dyn NotificationStore>>,
    devices: Option<Arc<dyn DeviceTokenStore>>,
    orders: Option<Arc<dyn OrderStore>>,
    chats: Option<Arc<dyn ChatStore>>,
    catalog: Option<Arc<dyn CatalogStore>>,
    push: Option<Arc<dyn PushProvider>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config: CourierConfig::default_config(),
            verifier: None,
            notifications: None,
            devices: None,
            orders: None,
            chats: None,
            catalog: None,
            push: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: CourierConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_verifier(mut self, verifier: impl TokenVerifier + 'static) -> Self {
        self.verifier = Some(Arc::new(verifier));
        self
    }

    pub fn with_notification_store(mut self, store: impl NotificationStore + 'static) -> Self {
        self.notifications = Some(Arc::new(store));
        self
    }

    pub fn with_device_token_store(mut self, store: impl DeviceTokenStore + 'static) -> Self {
        self.devices = Some(Arc::new(store));
        self
    }

    pub fn with_order_store(mut self, store: impl OrderStore + 'static) -> Self {
        self.orders = Some(Arc::new(store));
        self
    }

    pub fn with_chat_store(mut self, store: impl ChatStore + 'static) -> Self {
        self.chats = Some(Arc::new(store));
        self
    }

    pub fn with_catalog_store(mut self, store: impl CatalogStore + 'static) -> Self {
        self.catalog = Some(Arc::new(store));
        self
    }

    pub fn with_push_provider(mut self, provider: impl PushProvider + 'static) -> Self {
        self.push = Some(Arc::new(provider));
        self
    }

    /// Add custom routes
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(self) -> Result<ServerHost> {
        self.into_parts().map(|(host, _)| host)
    }

    /// Build the router and return the host alongside it
    ///
    /// Must be called inside a Tokio runtime: the liveness sweep is spawned here.
    pub fn build_with_host(self) -> Result<(Arc<ServerHost>, Router)> {
        let (host, custom_routes) = self.into_parts()?;
        let host = Arc::new(host);

        let rest_router = RestExposure::build_router(host.clone(), custom_routes)?;
        let ws_router = WebSocketExposure::build_router(host.clone())?;

        let app = rest_router
            .merge(ws_router)
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http());
        Ok((host, app))
    }

    /// Build the final router
    pub fn build(self) -> Result<Router> {
        self.build_with_host().map(|(_, app)| app)
    }

    /// Serve on `addr` until Ctrl+C or SIGTERM
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    fn into_parts(self) -> Result<(ServerHost, Vec<Router>)> {
        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => Arc::new(JwtVerifier::new(self.config.auth.jwt_secret.as_bytes())),
        };
        let push = match self.push {
            Some(push) => push,
            None => push_from_config(&self.config),
        };

        let stores = Stores {
            notifications: self
                .notifications
                .unwrap_or_else(|| Arc::new(InMemoryNotificationStore::new())),
            devices: self
                .devices
                .unwrap_or_else(|| Arc::new(InMemoryDeviceTokenStore::new())),
            orders: self
                .orders
                .unwrap_or_else(|| Arc::new(InMemoryOrderStore::new())),
            chats: self
                .chats
                .unwrap_or_else(|| Arc::new(InMemoryChatStore::new())),
            catalog: self
                .catalog
                .unwrap_or_else(|| Arc::new(InMemoryCatalogStore::new())),
        };

        let host = ServerHost::from_builder_components(self.config, verifier, stores, push)?;
        Ok((host, self.custom_routes))
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn push_from_config(config: &CourierConfig) -> Arc<dyn PushProvider> {
    match config.push.provider {
        PushProviderKind::Log => Arc::new(LogPushProvider),
        #[cfg(feature = "push")]
        PushProviderKind::Expo => {
            let endpoint = config
                .push
                .endpoint
                .clone()
                .unwrap_or_else(|| crate::push::expo::DEFAULT_ENDPOINT.to_string());
            Arc::new(crate::push::ExpoPushProvider::new(endpoint))
        }
        #[cfg(not(feature = "push"))]
        PushProviderKind::Expo => {
            tracing::warn!("push.provider = expo requires the `push` feature, logging pushes instead");
            Arc::new(LogPushProvider)
        }
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_host_with_defaults() {
        let host = ServerBuilder::new().build_host().unwrap();
        assert!(host.registry.is_empty());
        assert!(!host.dispatcher.router().is_scoped());
    }

    #[test]
    fn test_scoped_broadcast_reaches_router() {
        let mut config = CourierConfig::default_config();
        config.realtime.scoped_broadcast = true;
        let host = ServerBuilder::new().with_config(config).build_host().unwrap();
        assert!(host.dispatcher.router().is_scoped());
    }

    #[test]
    fn test_missing_secret_fails_build() {
        let result = ServerBuilder::new()
            .with_config(CourierConfig::default())
            .build_host();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_build_router() {
        let (host, _app) = ServerBuilder::new().build_with_host().unwrap();
        assert_eq!(host.registry.stats().total_connections, 0);
    }
}
