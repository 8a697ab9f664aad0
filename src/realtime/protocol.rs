//! Wire protocol for the `/ws` channel
//!
//! ## Server → Client
//!
//! ```json
//! // First frame after a successful handshake
//! {"type": "connection", "data": {"message": "...", "actor_id": "u1", "role": "CUSTOMER", "connection_id": "conn_..."}, "timestamp": "..."}
//!
//! // A routed event
//! {"type": "notification", "data": {"id": "...", "title": "...", "message": "...", "type": "ORDER_STATUS", "event": {"kind": "ORDER_STATUS", ...}, "created_at": "..."}, "timestamp": "..."}
//!
//! // Reply to an application-level ping
//! {"type": "pong", "timestamp": "..."}
//!
//! {"type": "error", "message": "...", "timestamp": "..."}
//! ```
//!
//! ## Client → Server
//!
//! ```json
//! {"type": "ping"}
//! ```

use crate::core::auth::Role;
use crate::core::events::DomainEvent;
use crate::storage::Notification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Missing or invalid token at handshake
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;
/// Evicted by the liveness sweep or a failed send
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Superseded by a newer connection of the same actor
pub const CLOSE_REPLACED: u16 = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Application-level keepalive, counts as a heartbeat
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connection {
        data: ConnectionAck,
        timestamp: DateTime<Utc>,
    },
    Notification {
        data: NotificationPayload,
        timestamp: DateTime<Utc>,
    },
    Pong {
        timestamp: DateTime<Utc>,
    },
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl ServerMessage {
    pub fn connection(ack: ConnectionAck) -> Self {
        ServerMessage::Connection {
            data: ack,
            timestamp: Utc::now(),
        }
    }

    pub fn notification(notification: &Notification) -> Self {
        ServerMessage::Notification {
            data: NotificationPayload::from(notification),
            timestamp: Utc::now(),
        }
    }

    pub fn pong() -> Self {
        ServerMessage::Pong {
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Echo of the resolved identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAck {
    pub message: String,
    pub actor_id: String,
    pub role: Role,
    pub connection_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub event: DomainEvent,
    pub created_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind.clone(),
            event: notification.payload.clone(),
            created_at: notification.created_at,
        }
    }
}
