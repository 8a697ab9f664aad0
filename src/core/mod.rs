//! Core types shared by every layer: identities, errors and domain events

pub mod auth;
pub mod error;
pub mod events;

pub use auth::{Caller, Claims, Identity, JwtVerifier, Role, TokenVerifier};
pub use error::{CourierError, DeliveryError};
pub use events::{Address, DomainEvent, RoutedEvent, Scope};
