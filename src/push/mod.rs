//! Offline delivery to device tokens
//!
//! The dispatcher falls back to a [`PushProvider`] when a directly addressed
//! actor has no live connection. Providers are best effort: a failure is
//! logged by the caller and never retried.

#[cfg(feature = "push")]
pub mod expo;

use crate::storage::DeviceToken;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

#[cfg(feature = "push")]
pub use expo::ExpoPushProvider;

/// What a device shows for a notification
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deliver to every token. Returns how many were accepted.
    async fn send(&self, tokens: &[DeviceToken], message: &PushMessage) -> Result<usize>;
}

/// Records pushes in the log only
#[derive(Debug, Clone, Default)]
pub struct LogPushProvider;

#[async_trait]
impl PushProvider for LogPushProvider {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, tokens: &[DeviceToken], message: &PushMessage) -> Result<usize> {
        for token in tokens {
            tracing::info!(
                actor_id = %token.actor_id,
                platform = %token.platform,
                title = %message.title,
                "Push notification"
            );
        }
        Ok(tokens.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_log_provider_accepts_all() {
        let token = DeviceToken {
            id: Uuid::new_v4(),
            actor_id: "u1".into(),
            token: "ExponentPushToken[abc]".into(),
            platform: "ios".into(),
            created_at: Utc::now(),
        };
        let message = PushMessage {
            title: "Order update".into(),
            body: "Your order has been delivered".into(),
            data: serde_json::Value::Null,
        };

        let sent = LogPushProvider
            .send(&[token.clone(), token], &message)
            .await
            .unwrap();
        assert_eq!(sent, 2);
        assert_eq!(LogPushProvider.name(), "log");
    }
}
