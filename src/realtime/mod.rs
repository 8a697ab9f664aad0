//! Real-time distribution: registry, routing and dispatch
//!
//! ```text
//! OrderService ──RoutedEvent──▶ EventDispatcher ──▶ AddressingRouter ──▶ ConnectionRegistry
//!                                     │                                        ▲
//!                               NotificationStore                    liveness sweep task
//! ```

pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod router;

pub use dispatcher::{DispatchReport, EventDispatcher};
pub use protocol::{ClientMessage, ConnectionAck, NotificationPayload, ServerMessage};
pub use registry::{Connection, ConnectionHandle, ConnectionRegistry, ConnectionStats, Outbound};
pub use router::AddressingRouter;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the background liveness task.
///
/// Every `interval` it evicts connections silent for longer than `timeout`
/// plus one `interval` of grace, then pings the survivors. The first tick
/// fires immediately, so a fresh connection is pinged right away. A client
/// answering each ping is never older than one interval at the next sweep,
/// so it survives even when `timeout` equals `interval`.
pub fn spawn_liveness_sweep(
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    timeout: Duration,
) -> JoinHandle<()> {
    let cutoff = chrono::Duration::from_std(timeout.saturating_add(interval))
        .unwrap_or(chrono::Duration::seconds(60));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_secs = interval.as_secs(),
            cutoff_secs = cutoff.num_seconds(),
            "Liveness sweep started"
        );

        loop {
            ticker.tick().await;

            let swept = registry.sweep(Utc::now(), cutoff);
            let failed = registry.ping_all();
            if !swept.is_empty() || failed > 0 {
                tracing::info!(
                    swept = swept.len(),
                    ping_failures = failed,
                    remaining = registry.len(),
                    "Liveness sweep"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::Role;
    use crate::realtime::registry::fixtures::identity;

    #[tokio::test]
    async fn test_sweep_task_evicts_silent_connection() {
        let registry = Arc::new(ConnectionRegistry::default());
        let (_handle, mut rx) = registry
            .register(&identity("u1", Role::Customer), None)
            .unwrap();

        let task = spawn_liveness_sweep(
            registry.clone(),
            Duration::from_millis(50),
            Duration::from_millis(10),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(registry.lookup("u1").is_none());
        assert!(matches!(rx.recv().await, Some(Outbound::Close { .. })));
        task.abort();
    }

    #[tokio::test]
    async fn test_sweep_task_pings_live_connections() {
        let registry = Arc::new(ConnectionRegistry::default());
        let (_handle, mut rx) = registry
            .register(&identity("u1", Role::Customer), None)
            .unwrap();

        let task = spawn_liveness_sweep(
            registry.clone(),
            Duration::from_millis(30),
            Duration::from_secs(60),
        );

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap();
        assert!(matches!(frame, Some(Outbound::Ping)));
        assert!(registry.lookup("u1").is_some());
        task.abort();
    }

    #[tokio::test]
    async fn test_responsive_client_survives_tight_timeout() {
        let registry = Arc::new(ConnectionRegistry::default());
        let (_handle, mut rx) = registry
            .register(&identity("u1", Role::Customer), None)
            .unwrap();

        let acker = registry.clone();
        let client = tokio::spawn(async move {
            let mut pings = 0usize;
            while let Some(frame) = rx.recv().await {
                match frame {
                    Outbound::Ping => {
                        pings += 1;
                        acker.heartbeat_ack("u1");
                    }
                    Outbound::Close { reason, .. } => return Err((pings, reason)),
                    Outbound::Message(_) => {}
                }
            }
            Ok(pings)
        });

        let task = spawn_liveness_sweep(
            registry.clone(),
            Duration::from_millis(20),
            Duration::from_millis(20),
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(registry.lookup("u1").is_some(), "responsive client was evicted");
        assert!(!client.is_finished());

        task.abort();
        client.abort();
    }

    #[tokio::test]
    async fn test_first_ping_is_sent_without_waiting_an_interval() {
        let registry = Arc::new(ConnectionRegistry::default());
        let (_handle, mut rx) = registry
            .register(&identity("u1", Role::Customer), None)
            .unwrap();

        let task = spawn_liveness_sweep(
            registry.clone(),
            Duration::from_secs(30),
            Duration::from_secs(30),
        );

        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(matches!(frame, Some(Outbound::Ping)));
        task.abort();
    }
}
