//! The order aggregate and its transitions
//!
//! Each transition checks the caller, checks the state machine, stamps the
//! relevant timestamp and returns the routed events it emits. Nothing here
//! touches a store or a connection: the caller persists the order first and
//! dispatches the events afterwards, in the returned order.

use crate::core::auth::{Caller, Role};
use crate::core::error::{AuthError, CourierError, OrderError};
use crate::core::events::{Address, DomainEvent, RoutedEvent, Scope};
use crate::orders::pricing::{self, Charges, Coupon, LineItemInput, PriceBreakdown, Restaurant};
use crate::orders::status::OrderStatus;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Minimum length of a cancellation reason
pub const MIN_CANCEL_REASON: usize = 5;

/// Order placement input
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewOrder {
    #[validate(length(min = 1, message = "restaurant id is required"))]
    pub restaurant_id: String,
    #[validate(length(min = 1, message = "order has no items"), nested)]
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub charges: Charges,
    #[validate(length(min = 1, message = "delivery address is required"))]
    pub delivery_address: String,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// A rider as seen by the assignment guard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: String,
    pub name: String,
    pub zone_id: String,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Short human-facing reference
    pub order_ref: String,
    pub customer_id: String,
    pub restaurant_id: String,
    pub zone_id: String,
    pub rider_id: Option<String>,
    pub status: OrderStatus,
    pub pricing: PriceBreakdown,
    pub delivery_address: String,
    pub instructions: Option<String>,
    pub preparation_minutes: i64,
    pub expected_time: Option<DateTime<Utc>>,
    pub is_picked_up: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Validate and price a new order.
    ///
    /// Emits `NEW_ORDER` to restaurant dashboards (scoped to this restaurant)
    /// and riders (scoped to its zone).
    pub fn place(
        customer_id: &str,
        restaurant: &Restaurant,
        input: &NewOrder,
        coupon: Option<&Coupon>,
        now: DateTime<Utc>,
    ) -> Result<(Order, Vec<RoutedEvent>), CourierError> {
        input.validate()?;

        if input.restaurant_id != restaurant.id {
            return Err(CourierError::field(
                "restaurant_id",
                "does not match the priced restaurant",
            ));
        }

        let pricing = pricing::price_order(restaurant, &input.items, coupon, input.charges, now)?;

        let id = Uuid::new_v4();
        let order = Order {
            id,
            order_ref: id.simple().to_string()[..8].to_uppercase(),
            customer_id: customer_id.to_string(),
            restaurant_id: restaurant.id.clone(),
            zone_id: restaurant.zone_id.clone(),
            rider_id: None,
            status: OrderStatus::Pending,
            pricing,
            delivery_address: input.delivery_address.clone(),
            instructions: input.instructions.clone(),
            preparation_minutes: restaurant.preparation_minutes,
            expected_time: None,
            is_picked_up: false,
            reason: None,
            created_at: now,
            accepted_at: None,
            assigned_at: None,
            picked_at: None,
            delivered_at: None,
            cancelled_at: None,
        };

        let created = DomainEvent::OrderCreated {
            order: Box::new(order.clone()),
        };
        let events = vec![
            RoutedEvent::new(
                Address::role(
                    Role::Restaurant,
                    Some(Scope::Restaurant(order.restaurant_id.clone())),
                ),
                created.clone(),
            ),
            RoutedEvent::new(
                Address::role(Role::Rider, Some(Scope::Zone(order.zone_id.clone()))),
                created,
            ),
        ];

        Ok((order, events))
    }

    pub fn order_amount(&self) -> rust_decimal::Decimal {
        self.pricing.total
    }

    /// PENDING → ACCEPTED, by the order's restaurant
    pub fn accept(
        &mut self,
        caller: &Caller,
        preparation_minutes: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoutedEvent>, CourierError> {
        if !(caller.is_operator() || caller.is(Role::Restaurant, &self.restaurant_id)) {
            return Err(forbidden("only the order's restaurant may accept it"));
        }
        if preparation_minutes.is_some_and(|minutes| minutes <= 0) {
            return Err(CourierError::field(
                "preparation_minutes",
                "must be positive",
            ));
        }
        self.advance(OrderStatus::Accepted)?;

        if let Some(minutes) = preparation_minutes {
            self.preparation_minutes = minutes;
        }
        self.accepted_at = Some(now);
        self.expected_time = Some(now + Duration::minutes(self.preparation_minutes));

        Ok(vec![self.status_event_to_customer(now)])
    }

    /// ACCEPTED → ASSIGNED: bind a rider.
    ///
    /// The restaurant may assign any rider; a rider may only assign themself.
    pub fn assign(
        &mut self,
        caller: &Caller,
        rider: &Rider,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoutedEvent>, CourierError> {
        let allowed = caller.is_operator()
            || caller.is(Role::Restaurant, &self.restaurant_id)
            || caller.is(Role::Rider, &rider.id);
        if !allowed {
            return Err(forbidden("caller may not assign this rider"));
        }
        if !rider.available {
            return Err(CourierError::field(
                "rider_id",
                format!("rider '{}' is not available", rider.id),
            ));
        }
        self.advance(OrderStatus::Assigned)?;

        self.rider_id = Some(rider.id.clone());
        self.assigned_at = Some(now);

        let event = DomainEvent::RiderAssigned {
            order_id: self.id,
            order_ref: self.order_ref.clone(),
            rider_id: rider.id.clone(),
            assigned_at: now,
        };
        Ok(vec![
            RoutedEvent::new(Address::actor(&self.customer_id), event.clone()),
            RoutedEvent::new(Address::actor(&rider.id), event),
        ])
    }

    /// ASSIGNED/ACCEPTED → PICKED, by the bound rider
    pub fn pick(
        &mut self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoutedEvent>, CourierError> {
        self.require_bound_rider(caller)?;
        self.advance(OrderStatus::Picked)?;

        self.is_picked_up = true;
        self.picked_at = Some(now);

        Ok(vec![self.status_event_to_customer(now)])
    }

    /// PICKED → DELIVERED, by the bound rider
    pub fn deliver(
        &mut self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoutedEvent>, CourierError> {
        self.require_bound_rider(caller)?;
        self.advance(OrderStatus::Delivered)?;

        self.delivered_at = Some(now);

        Ok(vec![self.status_event_to_customer(now)])
    }

    /// PENDING/ACCEPTED → CANCELLED, by the customer or the restaurant
    pub fn cancel(
        &mut self,
        caller: &Caller,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<RoutedEvent>, CourierError> {
        let allowed = caller.is_operator()
            || caller.is(Role::Customer, &self.customer_id)
            || caller.is(Role::Restaurant, &self.restaurant_id);
        if !allowed {
            return Err(forbidden("caller may not cancel this order"));
        }
        let reason = reason.trim();
        if reason.chars().count() < MIN_CANCEL_REASON {
            return Err(CourierError::field(
                "reason",
                format!("must be at least {} characters", MIN_CANCEL_REASON),
            ));
        }
        self.advance(OrderStatus::Cancelled)?;

        self.reason = Some(reason.to_string());
        self.cancelled_at = Some(now);

        Ok(vec![self.status_event_to_customer(now)])
    }

    fn require_bound_rider(&self, caller: &Caller) -> Result<(), CourierError> {
        if caller.is_operator() {
            return Ok(());
        }
        match &self.rider_id {
            Some(rider_id) if caller.is(Role::Rider, rider_id) => Ok(()),
            _ => Err(forbidden("only the rider bound to this order may do that")),
        }
    }

    fn advance(&mut self, to: OrderStatus) -> Result<(), CourierError> {
        if !self.status.can_transition_to(to) {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                from: self.status,
                to,
            }
            .into());
        }
        self.status = to;
        Ok(())
    }

    fn status_event_to_customer(&self, now: DateTime<Utc>) -> RoutedEvent {
        RoutedEvent::new(
            Address::actor(&self.customer_id),
            DomainEvent::OrderStatusChanged {
                order_id: self.id,
                order_ref: self.order_ref.clone(),
                status: self.status,
                changed_at: now,
                expected_time: self.expected_time,
                reason: self.reason.clone(),
            },
        )
    }
}

fn forbidden(message: &str) -> CourierError {
    AuthError::Forbidden {
        message: message.to_string(),
    }
    .into()
}
