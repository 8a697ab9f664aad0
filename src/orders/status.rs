//! Order status state machine
//!
//! ```text
//!  PENDING ──▶ ACCEPTED ──▶ ASSIGNED ──▶ PICKED ──▶ DELIVERED
//!     │            │  └──────────────────▲
//!     └────────────┴──▶ CANCELLED
//! ```
//!
//! `DELIVERED` and `CANCELLED` are terminal. A transition is legal only if it
//! appears in [`OrderStatus::can_transition_to`]; applying the same
//! transition twice is therefore always rejected.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Assigned,
    Picked,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Assigned => "ASSIGNED",
            OrderStatus::Picked => "PICKED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    /// The transition table
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Pending, Cancelled)
                | (Accepted, Assigned)
                | (Accepted, Picked)
                | (Accepted, Cancelled)
                | (Assigned, Picked)
                | (Picked, Delivered)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Customer-facing line used in status notifications
    pub fn customer_message(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Your order has been received",
            OrderStatus::Accepted => "Your order is being prepared",
            OrderStatus::Assigned => "A rider has been assigned to your order",
            OrderStatus::Picked => "Your order has been picked up",
            OrderStatus::Delivered => "Your order has been delivered",
            OrderStatus::Cancelled => "Your order has been cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
