//! Operations the REST layer calls after authenticating the caller

pub mod notifications;
pub mod orders;

pub use notifications::{DeviceTokenInput, DirectNotification, NotificationService};
pub use orders::OrderService;
