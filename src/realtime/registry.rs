//! Connection registry
//!
//! Tracks the one live connection of every actor and owns liveness.
//!
//! # Architecture
//!
//! ```text
//! /ws handshake ──verify──▶ ConnectionRegistry::register()
//!                                  │
//!                    DashMap<actor_id, Connection>
//!                                  │
//!           router / dispatcher ◀──┴──▶ sweep task (ping_all + sweep)
//!                                  │
//!                     mpsc::Sender<Outbound> ──▶ socket write loop
//! ```
//!
//! Entries are keyed by actor id, so every operation on one actor takes the
//! same shard lock: a reconnect cannot interleave with a sweep eviction of
//! the entry it replaces, while different actors rarely contend.
//!
//! An entry exclusively owns the sending side of its socket's outbound
//! queue. Removing the entry closes the socket: a `Close` frame is queued
//! and the sender dropped, which ends the write loop.

use super::protocol::{CLOSE_GOING_AWAY, CLOSE_REPLACED, ServerMessage};
use crate::core::auth::{Identity, Role, TokenVerifier};
use crate::core::error::{AuthError, DeliveryError};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A frame queued for a socket's write loop
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    /// Transport-level heartbeat ping
    Ping,
    /// Send a close frame and stop writing
    Close { code: u16, reason: String },
}

/// One live transport session
#[derive(Debug, Clone)]
pub struct Connection {
    pub connection_id: String,
    pub actor_id: String,
    pub role: Role,
    /// Zone declared by a rider at handshake
    pub zone_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    tx: mpsc::Sender<Outbound>,
}

impl Connection {
    /// Non-blocking enqueue onto the socket's outbound queue
    pub fn send(&self, frame: Outbound) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn close(&self, code: u16, reason: &str) {
        // A full or closed queue is fine: dropping the entry's sender ends the write loop.
        let _ = self.send(Outbound::Close {
            code,
            reason: reason.to_string(),
        });
    }
}

/// What the handshake handler needs to know about its registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHandle {
    pub connection_id: String,
    pub actor_id: String,
    pub role: Role,
}

/// Live connection counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub by_role: BTreeMap<String, usize>,
}

pub struct ConnectionRegistry {
    connections: DashMap<String, Connection>,
    buffer: usize,
}

impl ConnectionRegistry {
    /// `buffer` bounds each connection's outbound queue
    pub fn new(buffer: usize) -> Self {
        Self {
            connections: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Verify a handshake token and register the resulting identity
    pub async fn connect(
        &self,
        verifier: &dyn TokenVerifier,
        token: Option<&str>,
        zone_id: Option<String>,
    ) -> Result<(ConnectionHandle, mpsc::Receiver<Outbound>), AuthError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(AuthError::Unauthenticated)?;
        let identity = verifier.verify(token).await?;
        self.register(&identity, zone_id)
    }

    /// Register a verified identity, replacing and closing any previous
    /// connection of the same actor.
    ///
    /// Returns the handle plus the receiver the socket write loop drains.
    pub fn register(
        &self,
        identity: &Identity,
        zone_id: Option<String>,
    ) -> Result<(ConnectionHandle, mpsc::Receiver<Outbound>), AuthError> {
        let now = Utc::now();
        if identity.actor_id.is_empty() || identity.is_expired_at(now) {
            return Err(AuthError::Unauthenticated);
        }

        let connection_id = format!("conn_{}", Uuid::new_v4().simple());
        let (tx, rx) = mpsc::channel(self.buffer);

        let connection = Connection {
            connection_id: connection_id.clone(),
            actor_id: identity.actor_id.clone(),
            role: identity.role,
            zone_id: if identity.role == Role::Rider {
                zone_id
            } else {
                None
            },
            created_at: now,
            last_heartbeat: now,
            tx,
        };

        if let Some(previous) = self
            .connections
            .insert(identity.actor_id.clone(), connection)
        {
            previous.close(CLOSE_REPLACED, "Replaced by a newer connection");
            tracing::info!(
                actor_id = %identity.actor_id,
                connection_id = %connection_id,
                replaced = %previous.connection_id,
                "Connection replaced"
            );
        } else {
            tracing::info!(
                actor_id = %identity.actor_id,
                role = %identity.role,
                connection_id = %connection_id,
                "Connection registered"
            );
        }

        Ok((
            ConnectionHandle {
                connection_id,
                actor_id: identity.actor_id.clone(),
                role: identity.role,
            },
            rx,
        ))
    }

    /// Remove the actor's entry if it still belongs to `connection_id`
    pub fn unregister(&self, actor_id: &str, connection_id: &str) -> bool {
        let removed = self
            .connections
            .remove_if(actor_id, |_, c| c.connection_id == connection_id)
            .is_some();

        if removed {
            tracing::debug!(
                actor_id = %actor_id,
                connection_id = %connection_id,
                "Connection unregistered"
            );
        }
        removed
    }

    /// Remove and close one specific connection after a failed send
    pub fn evict(&self, connection: &Connection, reason: &str) -> bool {
        match self.connections.remove_if(&connection.actor_id, |_, c| {
            c.connection_id == connection.connection_id
        }) {
            Some((_, evicted)) => {
                evicted.close(CLOSE_GOING_AWAY, reason);
                tracing::warn!(
                    actor_id = %evicted.actor_id,
                    connection_id = %evicted.connection_id,
                    reason = reason,
                    "Connection evicted"
                );
                true
            }
            None => false,
        }
    }

    /// Refresh the actor's heartbeat. Unknown actors are ignored.
    pub fn heartbeat_ack(&self, actor_id: &str) {
        if let Some(mut connection) = self.connections.get_mut(actor_id) {
            connection.last_heartbeat = Utc::now();
        }
    }

    pub fn lookup(&self, actor_id: &str) -> Option<Connection> {
        self.connections.get(actor_id).map(|c| c.clone())
    }

    pub fn lookup_by_role(&self, role: Role) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.clone())
            .collect()
    }

    /// Evict every connection whose last heartbeat is older than `now - timeout`
    pub fn sweep(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<Connection> {
        let cutoff = now - timeout;
        let stale: Vec<String> = self
            .connections
            .iter()
            .filter(|c| c.last_heartbeat < cutoff)
            .map(|c| c.key().clone())
            .collect();

        let mut evicted = Vec::new();
        for actor_id in stale {
            // Re-checked under the shard lock: the entry may have been
            // replaced or acked since the scan.
            if let Some((_, connection)) = self
                .connections
                .remove_if(&actor_id, |_, c| c.last_heartbeat < cutoff)
            {
                connection.close(CLOSE_GOING_AWAY, "Heartbeat timeout");
                tracing::info!(
                    actor_id = %connection.actor_id,
                    connection_id = %connection.connection_id,
                    "Connection swept"
                );
                evicted.push(connection);
            }
        }
        evicted
    }

    /// Queue a heartbeat ping on every connection, evicting those whose
    /// queue rejects it. Returns the number evicted.
    pub fn ping_all(&self) -> usize {
        let failed: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| c.send(Outbound::Ping).is_err())
            .map(|c| c.clone())
            .collect();

        failed
            .iter()
            .filter(|c| self.evict(c, "Heartbeat ping failed"))
            .count()
    }

    pub fn stats(&self) -> ConnectionStats {
        let mut by_role: BTreeMap<String, usize> = Role::ALL
            .iter()
            .map(|r| (r.as_str().to_string(), 0))
            .collect();
        for connection in self.connections.iter() {
            *by_role
                .entry(connection.role.as_str().to_string())
                .or_default() += 1;
        }

        ConnectionStats {
            total_connections: self.connections.len(),
            by_role,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}
