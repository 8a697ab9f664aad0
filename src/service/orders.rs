//! Order mutation triggers
//!
//! Each operation loads the order, lets the aggregate check the caller and
//! the transition, commits with a compare-and-set on the previous status,
//! and only then dispatches the emitted events. A per-order lock spans
//! commit and dispatch so one order's events leave in commit order.

use crate::core::auth::{Caller, Identity, Role};
use crate::core::error::{AuthError, CourierError, OrderError};
use crate::core::events::RoutedEvent;
use crate::orders::chat;
use crate::orders::{ChatMessage, NewOrder, Order};
use crate::realtime::EventDispatcher;
use crate::storage::{CatalogStore, ChatStore, OrderStore};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    chats: Arc<dyn ChatStore>,
    catalog: Arc<dyn CatalogStore>,
    dispatcher: Arc<EventDispatcher>,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        chats: Arc<dyn ChatStore>,
        catalog: Arc<dyn CatalogStore>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            orders,
            chats,
            catalog,
            dispatcher,
            locks: DashMap::new(),
        }
    }

    /// Place an order as the calling customer
    pub async fn create(&self, caller: &Caller, input: NewOrder) -> Result<Order, CourierError> {
        let customer_id = match caller {
            Caller::Actor(identity) if identity.role == Role::Customer => identity.actor_id.clone(),
            _ => {
                return Err(AuthError::Forbidden {
                    message: "only customers may place orders".to_string(),
                }
                .into());
            }
        };

        let restaurant = self
            .catalog
            .restaurant(&input.restaurant_id)
            .await
            .map_err(|e| CourierError::storage("load restaurant", e))?
            .ok_or_else(|| CourierError::not_found("restaurant", &input.restaurant_id))?;

        let coupon = match &input.coupon_code {
            Some(code) => Some(
                self.catalog
                    .coupon(code)
                    .await
                    .map_err(|e| CourierError::storage("load coupon", e))?
                    .ok_or_else(|| CourierError::field("coupon", format!("unknown coupon '{}'", code)))?,
            ),
            None => None,
        };

        let (order, events) =
            Order::place(&customer_id, &restaurant, &input, coupon.as_ref(), Utc::now())?;

        // The check in `place` ran against a snapshot; the store decides
        if let Some(coupon) = &coupon {
            let redeemed = self
                .catalog
                .redeem_coupon(&coupon.code)
                .await
                .map_err(|e| CourierError::storage("redeem coupon", e))?;
            if !redeemed {
                return Err(CourierError::field(
                    "coupon",
                    format!("coupon '{}' has reached its usage limit", coupon.code),
                ));
            }
        }

        let order_id = order.id;
        let lock = self.lock_for(order_id);
        let _guard = lock.lock().await;

        let order = match self.orders.insert(order).await {
            Ok(order) => order,
            Err(e) => {
                self.locks.remove(&order_id);
                return Err(CourierError::storage("insert order", e));
            }
        };

        tracing::info!(
            order_id = %order.id,
            order_ref = %order.order_ref,
            restaurant_id = %order.restaurant_id,
            total = %order.order_amount(),
            "Order placed"
        );

        self.dispatcher.dispatch_all(events).await;

        Ok(order)
    }

    pub async fn get(&self, caller: &Caller, id: &Uuid) -> Result<Order, CourierError> {
        let order = self.load(id).await?;
        let visible = caller.is_operator()
            || caller.is(Role::Customer, &order.customer_id)
            || caller.is(Role::Restaurant, &order.restaurant_id)
            || order
                .rider_id
                .as_deref()
                .is_some_and(|rider| caller.is(Role::Rider, rider));
        if !visible {
            // Do not reveal that the order exists
            return Err(CourierError::not_found("order", id));
        }
        Ok(order)
    }

    pub async fn accept(
        &self,
        caller: &Caller,
        id: &Uuid,
        preparation_minutes: Option<i64>,
    ) -> Result<Order, CourierError> {
        self.transition(id, |order| {
            order.accept(caller, preparation_minutes, Utc::now())
        })
        .await
    }

    pub async fn assign(
        &self,
        caller: &Caller,
        id: &Uuid,
        rider_id: &str,
    ) -> Result<Order, CourierError> {
        let rider = self
            .catalog
            .rider(rider_id)
            .await
            .map_err(|e| CourierError::storage("load rider", e))?
            .ok_or_else(|| CourierError::not_found("rider", rider_id))?;

        self.transition(id, |order| order.assign(caller, &rider, Utc::now()))
            .await
    }

    pub async fn pick(&self, caller: &Caller, id: &Uuid) -> Result<Order, CourierError> {
        self.transition(id, |order| order.pick(caller, Utc::now()))
            .await
    }

    pub async fn deliver(&self, caller: &Caller, id: &Uuid) -> Result<Order, CourierError> {
        self.transition(id, |order| order.deliver(caller, Utc::now()))
            .await
    }

    pub async fn cancel(
        &self,
        caller: &Caller,
        id: &Uuid,
        reason: &str,
    ) -> Result<Order, CourierError> {
        self.transition(id, |order| order.cancel(caller, reason, Utc::now()))
            .await
    }

    /// Post a chat message and fan it out to the other participants
    pub async fn send_chat(
        &self,
        sender: &Identity,
        order_id: &Uuid,
        text: &str,
    ) -> Result<ChatMessage, CourierError> {
        let order = self.load(order_id).await?;
        let message = chat::compose(&order, sender, text, Utc::now())?;

        // Terminal orders emit no further status events to order against
        let lock = (!order.status.is_terminal()).then(|| self.lock_for(order.id));
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let message = self
            .chats
            .append(message)
            .await
            .map_err(|e| CourierError::storage("append chat message", e))?;

        self.dispatcher
            .dispatch_all(chat::fan_out(&order, &message))
            .await;

        Ok(message)
    }

    /// The order's conversation, oldest first. Participants only.
    pub async fn list_chat(
        &self,
        caller: &Caller,
        order_id: &Uuid,
    ) -> Result<Vec<ChatMessage>, CourierError> {
        let order = self.load(order_id).await?;
        let allowed = match caller {
            Caller::Operator => true,
            Caller::Actor(identity) => chat::is_participant(&order, identity),
        };
        if !allowed {
            return Err(AuthError::Forbidden {
                message: format!("not a participant of order {}", order.id),
            }
            .into());
        }

        self.chats
            .list(order_id)
            .await
            .map_err(|e| CourierError::storage("list chat messages", e))
    }

    async fn transition<F>(&self, id: &Uuid, apply: F) -> Result<Order, CourierError>
    where
        F: FnOnce(&mut Order) -> Result<Vec<RoutedEvent>, CourierError>,
    {
        let lock = self.lock_for(*id);
        let _guard = lock.lock().await;

        let mut order = self.load(id).await?;
        let previous = order.status;
        let events = apply(&mut order)?;

        let committed = self
            .orders
            .update(&order, previous)
            .await
            .map_err(|e| CourierError::storage("update order", e))?;
        if !committed {
            let current = self.load(id).await?;
            return Err(OrderError::InvalidTransition {
                order_id: *id,
                from: current.status,
                to: order.status,
            }
            .into());
        }

        tracing::info!(
            order_id = %order.id,
            from = %previous,
            to = %order.status,
            "Order status changed"
        );

        self.dispatcher.dispatch_all(events).await;

        if order.status.is_terminal() {
            self.locks.remove(id);
        }

        Ok(order)
    }

    async fn load(&self, id: &Uuid) -> Result<Order, CourierError> {
        self.orders
            .get(id)
            .await
            .map_err(|e| CourierError::storage("load order", e))?
            .ok_or_else(|| CourierError::not_found("order", id))
    }

    fn lock_for(&self, id: Uuid) -> Arc<Mutex<()>> {
        self.locks.entry(id).or_default().clone()
    }
}
