//! Domain events and their addressing
//!
//! Order transitions and chat sends produce [`RoutedEvent`]s: a closed
//! [`DomainEvent`] plus exactly one [`Address`]. The dispatcher persists one
//! notification per routed event and resolves the address against the
//! connection registry.
//!
//! # Wire shape of the event payload
//!
//! ```json
//! {"kind": "ORDER_STATUS", "order_id": "...", "order_ref": "A1B2C3D4", "status": "ACCEPTED", ...}
//! ```

use crate::core::auth::Role;
use crate::orders::chat::ChatMessage;
use crate::orders::lifecycle::Order;
use crate::orders::status::OrderStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Narrows a role broadcast to one restaurant or one zone
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Restaurant(String),
    Zone(String),
}

/// Who an event is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Address {
    /// The single live connection of one actor
    ToActor { actor_id: String },
    /// Every live connection with the given role, optionally narrowed
    ToRole {
        role: Role,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<Scope>,
    },
}

impl Address {
    pub fn actor(actor_id: impl Into<String>) -> Self {
        Address::ToActor {
            actor_id: actor_id.into(),
        }
    }

    pub fn role(role: Role, scope: Option<Scope>) -> Self {
        Address::ToRole { role, scope }
    }

    /// Whether this address reaches the given actor. With `scoped` off a
    /// role broadcast reaches every actor of the role, as live routing does.
    pub fn includes(
        &self,
        actor_id: &str,
        role: Role,
        zone_id: Option<&str>,
        scoped: bool,
    ) -> bool {
        match self {
            Address::ToActor { actor_id: target } => target == actor_id,
            Address::ToRole {
                role: target,
                scope,
            } => {
                *target == role
                    && match scope {
                        _ if !scoped => true,
                        None => true,
                        Some(Scope::Restaurant(id)) => id == actor_id,
                        Some(Scope::Zone(zone)) => zone_id.is_none_or(|z| z == zone),
                    }
            }
        }
    }
}

/// Every kind of event the distribution layer knows how to deliver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DomainEvent {
    /// A new order was placed
    #[serde(rename = "NEW_ORDER")]
    OrderCreated { order: Box<Order> },

    /// An order moved to a new status
    #[serde(rename = "ORDER_STATUS")]
    OrderStatusChanged {
        order_id: Uuid,
        order_ref: String,
        status: OrderStatus,
        changed_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_time: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// A rider was bound to an order
    #[serde(rename = "RIDER_ASSIGNED")]
    RiderAssigned {
        order_id: Uuid,
        order_ref: String,
        rider_id: String,
        assigned_at: DateTime<Utc>,
    },

    /// A chat message on an order conversation
    #[serde(rename = "CHAT_MESSAGE")]
    ChatMessage { message: ChatMessage },

    /// An operator-authored notification with a free-form type tag
    #[serde(rename = "DIRECT")]
    Direct {
        title: String,
        message: String,
        tag: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
    },
}

impl DomainEvent {
    /// The notification type tag
    pub fn kind(&self) -> &str {
        match self {
            DomainEvent::OrderCreated { .. } => "NEW_ORDER",
            DomainEvent::OrderStatusChanged { .. } => "ORDER_STATUS",
            DomainEvent::RiderAssigned { .. } => "RIDER_ASSIGNED",
            DomainEvent::ChatMessage { .. } => "CHAT_MESSAGE",
            DomainEvent::Direct { tag, .. } => tag,
        }
    }

    /// The order this event concerns, if any
    pub fn order_id(&self) -> Option<Uuid> {
        match self {
            DomainEvent::OrderCreated { order } => Some(order.id),
            DomainEvent::OrderStatusChanged { order_id, .. }
            | DomainEvent::RiderAssigned { order_id, .. } => Some(*order_id),
            DomainEvent::ChatMessage { message } => Some(message.order_id),
            DomainEvent::Direct { .. } => None,
        }
    }

    /// Title and body for the notification record, worded for the recipient
    pub fn render(&self, address: &Address) -> (String, String) {
        match self {
            DomainEvent::OrderCreated { order } => match address {
                Address::ToRole {
                    role: Role::Rider, ..
                } => (
                    "New order available".to_string(),
                    format!("Order #{} is available for delivery", order.order_ref),
                ),
                _ => (
                    "New order".to_string(),
                    format!("Order #{} received", order.order_ref),
                ),
            },
            DomainEvent::OrderStatusChanged { status, .. } => (
                "Order update".to_string(),
                status.customer_message().to_string(),
            ),
            DomainEvent::RiderAssigned {
                order_ref,
                rider_id,
                ..
            } => match address {
                Address::ToActor { actor_id } if actor_id == rider_id => (
                    "New delivery".to_string(),
                    format!("You have been assigned order #{}", order_ref),
                ),
                _ => (
                    "Order update".to_string(),
                    OrderStatus::Assigned.customer_message().to_string(),
                ),
            },
            DomainEvent::ChatMessage { message } => {
                ("New message".to_string(), message.message.clone())
            }
            DomainEvent::Direct { title, message, .. } => (title.clone(), message.clone()),
        }
    }
}

/// A domain event bound to one address
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    pub address: Address,
    pub event: DomainEvent,
}

impl RoutedEvent {
    pub fn new(address: Address, event: DomainEvent) -> Self {
        Self { address, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_serialization() {
        let json = serde_json::to_value(Address::actor("u1")).unwrap();
        assert_eq!(json["mode"], "to_actor");
        assert_eq!(json["actor_id"], "u1");

        let json = serde_json::to_value(Address::role(
            Role::Rider,
            Some(Scope::Zone("z1".into())),
        ))
        .unwrap();
        assert_eq!(json["mode"], "to_role");
        assert_eq!(json["role"], "RIDER");
        assert_eq!(json["scope"]["kind"], "zone");
        assert_eq!(json["scope"]["id"], "z1");
    }

    #[test]
    fn test_address_includes() {
        let direct = Address::actor("u1");
        assert!(direct.includes("u1", Role::Customer, None, true));
        assert!(!direct.includes("u2", Role::Customer, None, false));

        let riders = Address::role(Role::Rider, None);
        assert!(riders.includes("r1", Role::Rider, None, true));
        assert!(!riders.includes("c1", Role::Customer, None, true));

        let zone = Address::role(Role::Rider, Some(Scope::Zone("z1".into())));
        assert!(zone.includes("r1", Role::Rider, Some("z1"), true));
        assert!(!zone.includes("r1", Role::Rider, Some("z2"), true));
        assert!(zone.includes("r1", Role::Rider, None, true));

        let restaurant = Address::role(Role::Restaurant, Some(Scope::Restaurant("rest-1".into())));
        assert!(restaurant.includes("rest-1", Role::Restaurant, None, true));
        assert!(!restaurant.includes("rest-2", Role::Restaurant, None, true));
    }

    #[test]
    fn test_unscoped_address_ignores_scope() {
        let zone = Address::role(Role::Rider, Some(Scope::Zone("z1".into())));
        assert!(zone.includes("r1", Role::Rider, Some("z2"), false));
        assert!(!zone.includes("c1", Role::Customer, Some("z1"), false));

        let restaurant = Address::role(Role::Restaurant, Some(Scope::Restaurant("rest-1".into())));
        assert!(restaurant.includes("rest-2", Role::Restaurant, None, false));
    }

    #[test]
    fn test_status_event_shape() {
        let event = DomainEvent::OrderStatusChanged {
            order_id: Uuid::new_v4(),
            order_ref: "ABCD1234".into(),
            status: OrderStatus::Picked,
            changed_at: Utc::now(),
            expected_time: None,
            reason: None,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "ORDER_STATUS");
        assert_eq!(json["status"], "PICKED");
        assert!(json.get("reason").is_none());

        let (title, message) = event.render(&Address::actor("c1"));
        assert_eq!(title, "Order update");
        assert_eq!(message, "Your order has been picked up");
    }

    #[test]
    fn test_direct_kind_is_its_tag() {
        let event = DomainEvent::Direct {
            title: "Promo".into(),
            message: "50% off".into(),
            tag: "PROMOTION".into(),
            data: None,
        };
        assert_eq!(event.kind(), "PROMOTION");
        assert_eq!(event.order_id(), None);
    }
}
