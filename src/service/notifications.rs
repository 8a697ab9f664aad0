//! Notification history, direct notifications and device tokens

use crate::core::auth::{Caller, Identity};
use crate::core::error::{AuthError, CourierError};
use crate::core::events::{Address, DomainEvent, RoutedEvent};
use crate::realtime::{DispatchReport, EventDispatcher};
use crate::storage::{DeviceToken, DeviceTokenStore, Notification, NotificationStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Longest page a history query returns
pub const MAX_PAGE: usize = 200;

/// An ad-hoc notification for one actor
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DirectNotification {
    #[validate(length(min = 1, message = "recipient is required"))]
    pub recipient_id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    /// Free-form type tag, `DIRECT` when omitted
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceTokenInput {
    #[validate(length(min = 1, max = 512, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 1, max = 32))]
    pub platform: String,
}

pub struct NotificationService {
    notifications: Arc<dyn NotificationStore>,
    devices: Arc<dyn DeviceTokenStore>,
    dispatcher: Arc<EventDispatcher>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        devices: Arc<dyn DeviceTokenStore>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            notifications,
            devices,
            dispatcher,
        }
    }

    /// The actor's history, newest first, including matching role broadcasts
    pub async fn list(
        &self,
        identity: &Identity,
        zone_id: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>, CourierError> {
        let limit = limit.unwrap_or(MAX_PAGE).min(MAX_PAGE);
        self.notifications
            .list_for(
                &identity.actor_id,
                identity.role,
                zone_id,
                self.scoped(),
                Some(limit),
            )
            .await
            .map_err(|e| CourierError::storage("list notifications", e))
    }

    fn scoped(&self) -> bool {
        self.dispatcher.router().is_scoped()
    }

    /// Mark one of the actor's notifications as read
    pub async fn mark_read(
        &self,
        identity: &Identity,
        id: &Uuid,
    ) -> Result<Notification, CourierError> {
        let existing = self
            .notifications
            .get(id)
            .await
            .map_err(|e| CourierError::storage("load notification", e))?
            .filter(|n| {
                n.recipient
                    .includes(&identity.actor_id, identity.role, None, self.scoped())
            })
            .ok_or_else(|| CourierError::not_found("notification", id))?;

        self.notifications
            .mark_read(&existing.id)
            .await
            .map_err(|e| CourierError::storage("mark notification read", e))?
            .ok_or_else(|| CourierError::not_found("notification", id))
    }

    /// Persist and push an operator-authored notification to one actor
    pub async fn send_direct(
        &self,
        caller: &Caller,
        input: DirectNotification,
    ) -> Result<DispatchReport, CourierError> {
        if !caller.is_operator() {
            return Err(AuthError::Forbidden {
                message: "direct notifications are operator-only".to_string(),
            }
            .into());
        }
        input.validate()?;

        let event = DomainEvent::Direct {
            title: input.title,
            message: input.message,
            tag: input
                .kind
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| "DIRECT".to_string()),
            data: input.data,
        };

        Ok(self
            .dispatcher
            .dispatch(RoutedEvent::new(Address::actor(input.recipient_id), event))
            .await)
    }

    pub async fn register_device_token(
        &self,
        identity: &Identity,
        input: DeviceTokenInput,
    ) -> Result<DeviceToken, CourierError> {
        input.validate()?;

        let token = self
            .devices
            .register(&identity.actor_id, &input.token, &input.platform)
            .await
            .map_err(|e| CourierError::storage("register device token", e))?;

        tracing::debug!(
            actor_id = %identity.actor_id,
            platform = %token.platform,
            "Device token registered"
        );
        Ok(token)
    }

    /// Remove one of the actor's own tokens
    pub async fn remove_device_token(
        &self,
        identity: &Identity,
        id: &Uuid,
    ) -> Result<(), CourierError> {
        let owned = self
            .devices
            .get(id)
            .await
            .map_err(|e| CourierError::storage("load device token", e))?
            .is_some_and(|t| t.actor_id == identity.actor_id);
        if !owned {
            return Err(CourierError::not_found("device_token", id));
        }

        self.devices
            .remove(id)
            .await
            .map_err(|e| CourierError::storage("remove device token", e))?;
        Ok(())
    }

    pub async fn list_device_tokens(
        &self,
        identity: &Identity,
    ) -> Result<Vec<DeviceToken>, CourierError> {
        self.devices
            .list_for(&identity.actor_id)
            .await
            .map_err(|e| CourierError::storage("list device tokens", e))
    }
}
