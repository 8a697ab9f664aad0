//! Persistence seams for the distribution layer
//!
//! The authoritative data layer lives elsewhere; these traits cover the
//! records this crate reads or writes. Every method returns
//! `anyhow::Result` and the service layer maps failures into
//! [`CourierError::Storage`](crate::core::error::CourierError).

pub mod in_memory;

use crate::core::auth::Role;
use crate::core::events::{Address, DomainEvent};
use crate::orders::{ChatMessage, Coupon, Order, OrderStatus, Restaurant, Rider};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use in_memory::{
    InMemoryCatalogStore, InMemoryChatStore, InMemoryDeviceTokenStore, InMemoryNotificationStore,
    InMemoryOrderStore,
};

/// Durable record of one routed event
///
/// Written before any live send is attempted; clients reconcile missed
/// pushes by listing these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub recipient: Address,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: DomainEvent,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// Offline delivery address of one device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub actor_id: String,
    pub token: String,
    pub platform: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<Notification>;

    async fn get(&self, id: &Uuid) -> Result<Option<Notification>>;

    /// Notifications addressed to the actor directly or through a matching
    /// role broadcast, newest first. Broadcast scopes apply only when
    /// `scoped` is set.
    async fn list_for(
        &self,
        actor_id: &str,
        role: Role,
        zone_id: Option<&str>,
        scoped: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>>;

    /// Set the read flag. `None` when the id is unknown.
    async fn mark_read(&self, id: &Uuid) -> Result<Option<Notification>>;
}

/// Tokens are not deduplicated: registering the same token twice yields two records.
#[async_trait]
pub trait DeviceTokenStore: Send + Sync {
    async fn register(&self, actor_id: &str, token: &str, platform: &str) -> Result<DeviceToken>;

    async fn get(&self, id: &Uuid) -> Result<Option<DeviceToken>>;

    /// Returns whether a record was removed
    async fn remove(&self, id: &Uuid) -> Result<bool>;

    async fn list_for(&self, actor_id: &str) -> Result<Vec<DeviceToken>>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: Order) -> Result<Order>;

    async fn get(&self, id: &Uuid) -> Result<Option<Order>>;

    /// Replace the stored order only if its status is still `expected`.
    ///
    /// Returns `false` when another transition got there first.
    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<bool>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append a message, bumping its timestamp past the previous message of
    /// the same order if needed. Returns the stored message.
    async fn append(&self, message: ChatMessage) -> Result<ChatMessage>;

    /// Oldest first
    async fn list(&self, order_id: &Uuid) -> Result<Vec<ChatMessage>>;
}

/// Read side of restaurants, riders and coupons
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn restaurant(&self, id: &str) -> Result<Option<Restaurant>>;

    async fn rider(&self, id: &str) -> Result<Option<Rider>>;

    async fn coupon(&self, code: &str) -> Result<Option<Coupon>>;

    /// Count one use of a coupon unless it is disabled or used up.
    ///
    /// Check and increment are atomic. Returns `false` when no use was
    /// counted; an unknown code is an error.
    async fn redeem_coupon(&self, code: &str) -> Result<bool>;
}
