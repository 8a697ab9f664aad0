//! In-memory stores for testing and development
//!
//! Each store wraps its map in `Arc<RwLock<_>>` so clones share state.

use super::{
    CatalogStore, ChatStore, DeviceToken, DeviceTokenStore, Notification, NotificationStore,
    OrderStore,
};
use crate::core::auth::Role;
use crate::orders::{ChatMessage, Coupon, Order, OrderStatus, Restaurant, Rider};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// Notifications in insertion order
#[derive(Clone, Default)]
pub struct InMemoryNotificationStore {
    notifications: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records
    pub fn len(&self) -> usize {
        self.notifications.read().map(|n| n.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: Notification) -> Result<Notification> {
        let mut notifications = self
            .notifications
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        notifications.push(notification.clone());

        Ok(notification)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Notification>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(notifications.iter().find(|n| &n.id == id).cloned())
    }

    async fn list_for(
        &self,
        actor_id: &str,
        role: Role,
        zone_id: Option<&str>,
        scoped: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>> {
        let notifications = self
            .notifications
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(notifications
            .iter()
            .rev()
            .filter(|n| n.recipient.includes(actor_id, role, zone_id, scoped))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: &Uuid) -> Result<Option<Notification>> {
        let mut notifications = self
            .notifications
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(notifications.iter_mut().find(|n| &n.id == id).map(|n| {
            n.read = true;
            n.clone()
        }))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDeviceTokenStore {
    tokens: Arc<RwLock<HashMap<Uuid, DeviceToken>>>,
}

impl InMemoryDeviceTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeviceTokenStore for InMemoryDeviceTokenStore {
    async fn register(&self, actor_id: &str, token: &str, platform: &str) -> Result<DeviceToken> {
        let record = DeviceToken {
            id: Uuid::new_v4(),
            actor_id: actor_id.to_string(),
            token: token.to_string(),
            platform: platform.to_string(),
            created_at: Utc::now(),
        };

        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        tokens.insert(record.id, record.clone());

        Ok(record)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<DeviceToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(tokens.get(id).cloned())
    }

    async fn remove(&self, id: &Uuid) -> Result<bool> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        Ok(tokens.remove(id).is_some())
    }

    async fn list_for(&self, actor_id: &str) -> Result<Vec<DeviceToken>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        let mut out: Vec<_> = tokens
            .values()
            .filter(|t| t.actor_id == actor_id)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created_at);

        Ok(out)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<Uuid, Order>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<Order> {
        let mut orders = self
            .orders
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        if orders.contains_key(&order.id) {
            return Err(anyhow!("Order {} already exists", order.id));
        }
        orders.insert(order.id, order.clone());

        Ok(order)
    }

    async fn get(&self, id: &Uuid) -> Result<Option<Order>> {
        let orders = self
            .orders
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(orders.get(id).cloned())
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<bool> {
        let mut orders = self
            .orders
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let current = orders
            .get_mut(&order.id)
            .ok_or_else(|| anyhow!("Order not found"))?;

        if current.status != expected {
            return Ok(false);
        }
        *current = order.clone();

        Ok(true)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryChatStore {
    conversations: Arc<RwLock<HashMap<Uuid, Vec<ChatMessage>>>>,
}

impl InMemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn append(&self, mut message: ChatMessage) -> Result<ChatMessage> {
        let mut conversations = self
            .conversations
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let log = conversations.entry(message.order_id).or_default();
        if let Some(last) = log.last().map(|m| m.created_at) {
            if message.created_at <= last {
                message.created_at = last + Duration::microseconds(1);
            }
        }
        log.push(message.clone());

        Ok(message)
    }

    async fn list(&self, order_id: &Uuid) -> Result<Vec<ChatMessage>> {
        let conversations = self
            .conversations
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(conversations.get(order_id).cloned().unwrap_or_default())
    }
}

/// Restaurants, riders and coupons keyed by id / code
#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    restaurants: Arc<RwLock<HashMap<String, Restaurant>>>,
    riders: Arc<RwLock<HashMap<String, Rider>>>,
    coupons: Arc<RwLock<HashMap<String, Coupon>>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_restaurant(&self, restaurant: Restaurant) -> Result<()> {
        self.restaurants
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .insert(restaurant.id.clone(), restaurant);
        Ok(())
    }

    pub fn put_rider(&self, rider: Rider) -> Result<()> {
        self.riders
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .insert(rider.id.clone(), rider);
        Ok(())
    }

    pub fn put_coupon(&self, coupon: Coupon) -> Result<()> {
        self.coupons
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?
            .insert(coupon.code.clone(), coupon);
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn restaurant(&self, id: &str) -> Result<Option<Restaurant>> {
        let restaurants = self
            .restaurants
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(restaurants.get(id).cloned())
    }

    async fn rider(&self, id: &str) -> Result<Option<Rider>> {
        let riders = self
            .riders
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(riders.get(id).cloned())
    }

    async fn coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let coupons = self
            .coupons
            .read()
            .map_err(|e| anyhow!("Failed to acquire read lock: {}", e))?;

        Ok(coupons.get(code).cloned())
    }

    async fn redeem_coupon(&self, code: &str) -> Result<bool> {
        let mut coupons = self
            .coupons
            .write()
            .map_err(|e| anyhow!("Failed to acquire write lock: {}", e))?;

        let coupon = coupons
            .get_mut(code)
            .ok_or_else(|| anyhow!("Coupon {} not found", code))?;
        let used_up = coupon
            .usage_limit
            .is_some_and(|limit| coupon.times_used >= limit);
        if !coupon.enabled || used_up {
            return Ok(false);
        }
        coupon.times_used += 1;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::events::{Address, DomainEvent, Scope};
    use crate::orders::lifecycle::fixtures::placed;
    use chrono::DateTime;

    fn notification(recipient: Address) -> Notification {
        Notification {
            id: Uuid::new_v4(),
            recipient,
            title: "t".into(),
            message: "m".into(),
            kind: "DIRECT".into(),
            payload: DomainEvent::Direct {
                title: "t".into(),
                message: "m".into(),
                tag: "DIRECT".into(),
                data: None,
            },
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_notifications_newest_first() {
        let store = InMemoryNotificationStore::new();
        let first = store.insert(notification(Address::actor("u1"))).await.unwrap();
        let second = store
            .insert(notification(Address::role(Role::Customer, None)))
            .await
            .unwrap();
        store.insert(notification(Address::actor("u2"))).await.unwrap();

        let listed = store.list_for("u1", Role::Customer, None, true, None).await.unwrap();
        let ids: Vec<_> = listed.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let limited = store
            .list_for("u1", Role::Customer, None, true, Some(1))
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_scoped_broadcast_history() {
        let store = InMemoryNotificationStore::new();
        store
            .insert(notification(Address::role(
                Role::Rider,
                Some(Scope::Zone("z1".into())),
            )))
            .await
            .unwrap();

        assert_eq!(
            store.list_for("r1", Role::Rider, Some("z1"), true, None).await.unwrap().len(),
            1
        );
        assert!(
            store
                .list_for("r1", Role::Rider, Some("z2"), true, None)
                .await
                .unwrap()
                .is_empty()
        );
        // Unscoped history matches unscoped live routing
        assert_eq!(
            store.list_for("r1", Role::Rider, Some("z2"), false, None).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_mark_read() {
        let store = InMemoryNotificationStore::new();
        let n = store.insert(notification(Address::actor("u1"))).await.unwrap();

        let updated = store.mark_read(&n.id).await.unwrap().unwrap();
        assert!(updated.read);
        assert!(store.get(&n.id).await.unwrap().unwrap().read);
        assert!(store.mark_read(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_device_tokens_are_not_deduplicated() {
        let store = InMemoryDeviceTokenStore::new();
        let a = store.register("u1", "tok", "ios").await.unwrap();
        let b = store.register("u1", "tok", "ios").await.unwrap();
        store.register("u2", "other", "android").await.unwrap();

        assert_ne!(a.id, b.id);
        assert_eq!(store.list_for("u1").await.unwrap().len(), 2);

        assert!(store.remove(&a.id).await.unwrap());
        assert!(!store.remove(&a.id).await.unwrap());
        assert_eq!(store.list_for("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_order_update_compares_status() {
        let store = InMemoryOrderStore::new();
        let mut order = store.insert(placed()).await.unwrap();

        order.status = OrderStatus::Accepted;
        assert!(store.update(&order, OrderStatus::Pending).await.unwrap());
        assert!(!store.update(&order, OrderStatus::Pending).await.unwrap());
        assert_eq!(
            store.get(&order.id).await.unwrap().unwrap().status,
            OrderStatus::Accepted
        );
    }

    #[tokio::test]
    async fn test_chat_timestamps_strictly_increase() {
        let store = InMemoryChatStore::new();
        let order_id = Uuid::new_v4();
        let at = DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        let message = |text: &str| ChatMessage {
            id: Uuid::new_v4(),
            order_id,
            sender_id: "c1".into(),
            sender_role: Role::Customer,
            message: text.into(),
            created_at: at,
        };

        let first = store.append(message("one")).await.unwrap();
        let second = store.append(message("two")).await.unwrap();
        assert!(second.created_at > first.created_at);

        let log = store.list(&order_id).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].message, "one");
    }

    #[tokio::test]
    async fn test_redeem_coupon() {
        use crate::orders::pricing::fixtures::percent_coupon;

        let store = InMemoryCatalogStore::new();
        store.put_coupon(percent_coupon(10, None)).unwrap();
        assert!(store.redeem_coupon("SAVE").await.unwrap());
        assert_eq!(store.coupon("SAVE").await.unwrap().unwrap().times_used, 1);
        assert!(store.redeem_coupon("NOPE").await.is_err());
    }

    #[tokio::test]
    async fn test_redeem_coupon_stops_at_limit() {
        use crate::orders::pricing::fixtures::percent_coupon;

        let store = InMemoryCatalogStore::new();
        let mut coupon = percent_coupon(10, None);
        coupon.usage_limit = Some(2);
        store.put_coupon(coupon).unwrap();

        assert!(store.redeem_coupon("SAVE").await.unwrap());
        assert!(store.redeem_coupon("SAVE").await.unwrap());
        assert!(!store.redeem_coupon("SAVE").await.unwrap());
        assert_eq!(store.coupon("SAVE").await.unwrap().unwrap().times_used, 2);
    }

    #[tokio::test]
    async fn test_disabled_coupon_is_not_redeemed() {
        use crate::orders::pricing::fixtures::percent_coupon;

        let store = InMemoryCatalogStore::new();
        let mut coupon = percent_coupon(10, None);
        coupon.enabled = false;
        store.put_coupon(coupon).unwrap();

        assert!(!store.redeem_coupon("SAVE").await.unwrap());
        assert_eq!(store.coupon("SAVE").await.unwrap().unwrap().times_used, 0);
    }
}
