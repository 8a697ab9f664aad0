//! Per-order conversations
//!
//! Participants are the customer, the rider once one is bound, and the
//! restaurant once the order has been picked up. A message is delivered to
//! every other participant as its own routed event.

use crate::core::auth::{Identity, Role};
use crate::core::error::{AuthError, CourierError};
use crate::core::events::{Address, DomainEvent, RoutedEvent};
use crate::orders::lifecycle::Order;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Longest accepted message body
pub const MAX_MESSAGE_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub order_id: Uuid,
    pub sender_id: String,
    pub sender_role: Role,
    pub message: String,
    /// Strictly increasing within one order
    pub created_at: DateTime<Utc>,
}

/// `(role, actor_id)` of everyone allowed in the order's conversation
pub fn participants(order: &Order) -> Vec<(Role, &str)> {
    let mut out = vec![(Role::Customer, order.customer_id.as_str())];
    if let Some(rider_id) = &order.rider_id {
        out.push((Role::Rider, rider_id.as_str()));
    }
    if order.is_picked_up {
        out.push((Role::Restaurant, order.restaurant_id.as_str()));
    }
    out
}

pub fn is_participant(order: &Order, identity: &Identity) -> bool {
    participants(order)
        .into_iter()
        .any(|(role, id)| role == identity.role && id == identity.actor_id)
}

/// Build a message from `sender`. The store assigns the final timestamp.
pub fn compose(
    order: &Order,
    sender: &Identity,
    text: &str,
    now: DateTime<Utc>,
) -> Result<ChatMessage, CourierError> {
    if !is_participant(order, sender) {
        return Err(AuthError::Forbidden {
            message: format!("not a participant of order {}", order.id),
        }
        .into());
    }

    let text = text.trim();
    if text.is_empty() {
        return Err(CourierError::field("message", "message is empty"));
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(CourierError::field(
            "message",
            format!("longer than {} characters", MAX_MESSAGE_LEN),
        ));
    }

    Ok(ChatMessage {
        id: Uuid::new_v4(),
        order_id: order.id,
        sender_id: sender.actor_id.clone(),
        sender_role: sender.role,
        message: text.to_string(),
        created_at: now,
    })
}

/// One `CHAT_MESSAGE` event per participant other than the sender
pub fn fan_out(order: &Order, message: &ChatMessage) -> Vec<RoutedEvent> {
    participants(order)
        .into_iter()
        .filter(|(role, id)| !(*role == message.sender_role && *id == message.sender_id))
        .map(|(_, id)| {
            RoutedEvent::new(
                Address::actor(id),
                DomainEvent::ChatMessage {
                    message: message.clone(),
                },
            )
        })
        .collect()
}
