//! Event dispatcher
//!
//! ```text
//! RoutedEvent ──▶ persist Notification ──▶ route(address)
//!                                             │
//!                           ┌─── targets ─────┴──── none ───┐
//!                           ▼                               ▼
//!                try_send per connection         ToActor: device tokens
//!                   failed ──▶ evict                  ──▶ PushProvider
//! ```
//!
//! Dispatch never fails. Store, routing and push problems are logged and
//! reported in the [`DispatchReport`]; the transition that produced the
//! event has already been committed.

use super::protocol::ServerMessage;
use super::registry::{ConnectionRegistry, Outbound};
use super::router::AddressingRouter;
use crate::core::events::{Address, RoutedEvent};
use crate::push::{PushMessage, PushProvider};
use crate::storage::{DeviceTokenStore, Notification, NotificationStore};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Outcome of dispatching one routed event
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// `None` if the notification could not be persisted
    pub notification_id: Option<Uuid>,
    /// Live connections the event was queued on
    pub delivered: usize,
    /// Connections removed because the send failed
    pub evicted: usize,
    /// Device tokens handed to the push provider
    pub pushed: usize,
}

pub struct EventDispatcher {
    registry: Arc<ConnectionRegistry>,
    router: AddressingRouter,
    notifications: Arc<dyn NotificationStore>,
    devices: Arc<dyn DeviceTokenStore>,
    push: Arc<dyn PushProvider>,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        scoped_broadcast: bool,
        notifications: Arc<dyn NotificationStore>,
        devices: Arc<dyn DeviceTokenStore>,
        push: Arc<dyn PushProvider>,
    ) -> Self {
        Self {
            router: AddressingRouter::new(registry.clone(), scoped_broadcast),
            registry,
            notifications,
            devices,
            push,
        }
    }

    pub fn router(&self) -> &AddressingRouter {
        &self.router
    }

    /// Persist, then deliver one event to its live targets
    pub async fn dispatch(&self, routed: RoutedEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        let (title, message) = routed.event.render(&routed.address);
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: routed.address.clone(),
            title,
            message,
            kind: routed.event.kind().to_string(),
            payload: routed.event,
            read: false,
            created_at: Utc::now(),
        };

        match self.notifications.insert(notification.clone()).await {
            Ok(stored) => report.notification_id = Some(stored.id),
            Err(e) => {
                tracing::error!(
                    kind = %notification.kind,
                    error = %e,
                    "Failed to persist notification"
                );
            }
        }

        let targets = self.router.route(&notification.recipient);
        if !targets.is_empty() {
            let frame = Outbound::Message(ServerMessage::notification(&notification));
            for target in targets {
                match target.send(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        tracing::warn!(
                            actor_id = %target.actor_id,
                            connection_id = %target.connection_id,
                            error = %e,
                            "Delivery failed"
                        );
                        if self.registry.evict(&target, "Delivery failed") {
                            report.evicted += 1;
                        }
                    }
                }
            }
        }

        if report.delivered == 0 {
            tracing::debug!(
                kind = %notification.kind,
                recipient = ?notification.recipient,
                "No live connection for notification"
            );
            if let Address::ToActor { actor_id } = &notification.recipient {
                report.pushed = self.push_offline(actor_id, &notification).await;
            }
        }

        report
    }

    /// Dispatch a batch in order
    pub async fn dispatch_all(&self, events: Vec<RoutedEvent>) -> Vec<DispatchReport> {
        let mut reports = Vec::with_capacity(events.len());
        for event in events {
            reports.push(self.dispatch(event).await);
        }
        reports
    }

    async fn push_offline(&self, actor_id: &str, notification: &Notification) -> usize {
        let tokens = match self.devices.list_for(actor_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(actor_id = %actor_id, error = %e, "Failed to load device tokens");
                return 0;
            }
        };
        if tokens.is_empty() {
            return 0;
        }

        let message = PushMessage {
            title: notification.title.clone(),
            body: notification.message.clone(),
            data: serde_json::json!({
                "notification_id": notification.id,
                "type": notification.kind,
                "order_id": notification.payload.order_id(),
            }),
        };

        match self.push.send(&tokens, &message).await {
            Ok(sent) => sent,
            Err(e) => {
                tracing::warn!(
                    actor_id = %actor_id,
                    provider = self.push.name(),
                    error = %e,
                    "Push delivery failed"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Role;
    use crate::core::events::{DomainEvent, Scope};
    use crate::push::LogPushProvider;
    use crate::realtime::registry::fixtures::identity;
    use crate::storage::{InMemoryDeviceTokenStore, InMemoryNotificationStore};

    struct Harness {
        registry: Arc<ConnectionRegistry>,
        notifications: InMemoryNotificationStore,
        devices: InMemoryDeviceTokenStore,
        dispatcher: EventDispatcher,
    }

    fn harness(buffer: usize, scoped: bool) -> Harness {
        let registry = Arc::new(ConnectionRegistry::new(buffer));
        let notifications = InMemoryNotificationStore::new();
        let devices = InMemoryDeviceTokenStore::new();
        let dispatcher = EventDispatcher::new(
            registry.clone(),
            scoped,
            Arc::new(notifications.clone()),
            Arc::new(devices.clone()),
            Arc::new(LogPushProvider),
        );
        Harness {
            registry,
            notifications,
            devices,
            dispatcher,
        }
    }

    fn direct(address: Address) -> RoutedEvent {
        RoutedEvent::new(
            address,
            DomainEvent::Direct {
                title: "Hello".into(),
                message: "World".into(),
                tag: "DIRECT".into(),
                data: None,
            },
        )
    }

    #[tokio::test]
    async fn test_delivers_to_live_actor() {
        let h = harness(8, false);
        let (_handle, mut rx) = h
            .registry
            .register(&identity("u1", Role::Customer), None)
            .unwrap();

        let report = h.dispatcher.dispatch(direct(Address::actor("u1"))).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.pushed, 0);
        assert!(report.notification_id.is_some());

        match rx.recv().await {
            Some(Outbound::Message(ServerMessage::Notification { data, .. })) => {
                assert_eq!(Some(data.id), report.notification_id);
                assert_eq!(data.title, "Hello");
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_absent_actor_only_persists() {
        let h = harness(8, false);
        let report = h.dispatcher.dispatch(direct(Address::actor("ghost"))).await;

        assert_eq!(report.delivered, 0);
        assert_eq!(report.evicted, 0);
        assert_eq!(report.pushed, 0);
        assert_eq!(h.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_absent_actor_falls_back_to_devices() {
        let h = harness(8, false);
        h.devices.register("u1", "tok-a", "ios").await.unwrap();
        h.devices.register("u1", "tok-b", "android").await.unwrap();

        let report = h.dispatcher.dispatch(direct(Address::actor("u1"))).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.pushed, 2);
    }

    #[tokio::test]
    async fn test_role_broadcast_has_no_device_fallback() {
        let h = harness(8, false);
        h.devices.register("r1", "tok", "ios").await.unwrap();

        let report = h
            .dispatcher
            .dispatch(direct(Address::role(Role::Rider, None)))
            .await;
        assert_eq!(report.pushed, 0);
        assert_eq!(h.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_evicts_only_that_connection() {
        let h = harness(1, false);
        let (_a, _rx_a) = h.registry.register(&identity("r1", Role::Rider), None).unwrap();
        let (_b, mut rx_b) = h.registry.register(&identity("r2", Role::Rider), None).unwrap();

        // Fill r1's single-slot queue
        h.registry.lookup("r1").unwrap().send(Outbound::Ping).unwrap();

        let report = h
            .dispatcher
            .dispatch(direct(Address::role(Role::Rider, None)))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(report.evicted, 1);
        assert!(h.registry.lookup("r1").is_none());
        assert!(h.registry.lookup("r2").is_some());
        assert!(matches!(rx_b.recv().await, Some(Outbound::Message(_))));
    }

    #[tokio::test]
    async fn test_one_notification_per_event_regardless_of_outcome() {
        let h = harness(1, false);
        let (_a, rx) = h.registry.register(&identity("u1", Role::Customer), None).unwrap();
        drop(rx);

        h.dispatcher.dispatch(direct(Address::actor("u1"))).await;
        h.dispatcher.dispatch(direct(Address::actor("u2"))).await;
        h.dispatcher
            .dispatch(direct(Address::role(Role::Restaurant, None)))
            .await;

        assert_eq!(h.notifications.len(), 3);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_scoped_dispatch() {
        let h = harness(8, true);
        let (_a, mut rx_z1) = h
            .registry
            .register(&identity("r1", Role::Rider), Some("z1".into()))
            .unwrap();
        let (_b, mut rx_z2) = h
            .registry
            .register(&identity("r2", Role::Rider), Some("z2".into()))
            .unwrap();

        let report = h
            .dispatcher
            .dispatch(direct(Address::role(
                Role::Rider,
                Some(Scope::Zone("z1".into())),
            )))
            .await;

        assert_eq!(report.delivered, 1);
        assert!(rx_z1.try_recv().is_ok());
        assert!(rx_z2.try_recv().is_err());
    }
}
