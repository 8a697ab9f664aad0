//! Typed error handling for courier
//!
//! Transition-level failures (`Auth`, `Order`, `Validation`) propagate to the
//! caller of a mutation. Delivery-level failures never do: they are modelled
//! separately by [`DeliveryError`] and only ever logged.
//!
//! # Error Categories
//!
//! - [`AuthError`]: missing or invalid identity, insufficient rights
//! - [`EntityError`]: unknown orders, notifications, device tokens, riders
//! - [`OrderError`]: illegal order-status transitions
//! - [`ValidationError`]: order-creation and request input checks
//! - [`StorageError`]: store backend failures
//! - [`ConfigError`]: configuration parsing
//!
//! # Example
//!
//! ```rust,ignore
//! match service.accept(order_id, &caller).await {
//!     Ok(order) => println!("accepted {}", order.order_ref),
//!     Err(CourierError::Order(OrderError::InvalidTransition { from, .. })) => {
//!         println!("order is already {}", from);
//!     }
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

use crate::orders::status::OrderStatus;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// The main error type for courier operations
#[derive(Debug)]
pub enum CourierError {
    /// Identity and permission errors
    Auth(AuthError),

    /// Unknown resources
    Entity(EntityError),

    /// Order state machine errors
    Order(OrderError),

    /// Input validation errors
    Validation(ValidationError),

    /// Storage backend errors
    Storage(StorageError),

    /// Configuration errors
    Config(ConfigError),

    /// Internal errors (should not happen in normal operation)
    Internal(String),
}

impl fmt::Display for CourierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourierError::Auth(e) => write!(f, "{}", e),
            CourierError::Entity(e) => write!(f, "{}", e),
            CourierError::Order(e) => write!(f, "{}", e),
            CourierError::Validation(e) => write!(f, "{}", e),
            CourierError::Storage(e) => write!(f, "{}", e),
            CourierError::Config(e) => write!(f, "{}", e),
            CourierError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for CourierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CourierError::Auth(e) => Some(e),
            CourierError::Entity(e) => Some(e),
            CourierError::Order(e) => Some(e),
            CourierError::Validation(e) => Some(e),
            CourierError::Storage(e) => Some(e),
            CourierError::Config(e) => Some(e),
            CourierError::Internal(_) => None,
        }
    }
}

/// Error response structure for HTTP responses
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CourierError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            CourierError::Auth(e) => e.status_code(),
            CourierError::Entity(_) => StatusCode::NOT_FOUND,
            CourierError::Order(_) => StatusCode::CONFLICT,
            CourierError::Validation(_) => StatusCode::BAD_REQUEST,
            CourierError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CourierError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CourierError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CourierError::Auth(e) => e.error_code(),
            CourierError::Entity(_) => "NOT_FOUND",
            CourierError::Order(_) => "INVALID_TRANSITION",
            CourierError::Validation(_) => "VALIDATION_ERROR",
            CourierError::Storage(_) => "STORAGE_ERROR",
            CourierError::Config(_) => "CONFIG_ERROR",
            CourierError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            CourierError::Entity(EntityError::NotFound { entity_type, id }) => {
                Some(serde_json::json!({ "entity_type": entity_type, "id": id }))
            }
            CourierError::Order(OrderError::InvalidTransition { order_id, from, to }) => {
                Some(serde_json::json!({
                    "order_id": order_id.to_string(),
                    "from": from.as_str(),
                    "to": to.as_str(),
                }))
            }
            CourierError::Validation(ValidationError::FieldErrors(errors)) => {
                Some(serde_json::json!({ "fields": errors }))
            }
            _ => None,
        }
    }

    /// Shorthand for a single-field validation failure
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        CourierError::Validation(ValidationError::FieldError {
            field: field.to_string(),
            message: message.into(),
        })
    }

    /// Shorthand for an unknown resource
    pub fn not_found(entity_type: &str, id: impl ToString) -> Self {
        CourierError::Entity(EntityError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        })
    }

    /// Wrap a store failure
    pub fn storage(operation: &str, err: anyhow::Error) -> Self {
        CourierError::Storage(StorageError::OperationFailed {
            operation: operation.to_string(),
            message: err.to_string(),
        })
    }
}

impl IntoResponse for CourierError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

// =============================================================================
// Auth Errors
// =============================================================================

/// Errors related to identity and permissions
#[derive(Debug)]
pub enum AuthError {
    /// No identity was presented
    Unauthenticated,

    /// The presented token could not be verified
    InvalidToken { message: String },

    /// The presented token is past its expiry
    TokenExpired,

    /// The identity is valid but may not perform the action
    Forbidden { message: String },
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Unauthenticated => write!(f, "Authentication required"),
            AuthError::InvalidToken { message } => write!(f, "Invalid token: {}", message),
            AuthError::TokenExpired => write!(f, "Token expired"),
            AuthError::Forbidden { message } => write!(f, "Forbidden: {}", message),
        }
    }
}

impl std::error::Error for AuthError {}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::InvalidToken { .. } => "INVALID_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::Forbidden { .. } => "FORBIDDEN",
        }
    }

    /// Whether this error means no usable identity was presented at all
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self, AuthError::Forbidden { .. })
    }
}

impl From<AuthError> for CourierError {
    fn from(err: AuthError) -> Self {
        CourierError::Auth(err)
    }
}

// =============================================================================
// Entity Errors
// =============================================================================

/// Errors related to resource lookup
#[derive(Debug)]
pub enum EntityError {
    /// Resource was not found
    NotFound { entity_type: String, id: String },
}

impl fmt::Display for EntityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityError::NotFound { entity_type, id } => {
                write!(f, "{} with id '{}' not found", entity_type, id)
            }
        }
    }
}

impl std::error::Error for EntityError {}

impl From<EntityError> for CourierError {
    fn from(err: EntityError) -> Self {
        CourierError::Entity(err)
    }
}

// =============================================================================
// Order Errors
// =============================================================================

/// Errors raised by the order state machine
#[derive(Debug)]
pub enum OrderError {
    /// The requested status change is not legal from the current status
    InvalidTransition {
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderError::InvalidTransition { order_id, from, to } => write!(
                f,
                "Order '{}' cannot move from {} to {}",
                order_id, from, to
            ),
        }
    }
}

impl std::error::Error for OrderError {}

impl From<OrderError> for CourierError {
    fn from(err: OrderError) -> Self {
        CourierError::Order(err)
    }
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors related to input validation
#[derive(Debug)]
pub enum ValidationError {
    /// Single field validation error
    FieldError { field: String, message: String },

    /// Multiple field validation errors
    FieldErrors(Vec<FieldValidationError>),

    /// Invalid JSON format
    InvalidJson { message: String },
}

/// A single field validation error
#[derive(Debug, Clone, Serialize)]
pub struct FieldValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::FieldError { field, message } => {
                write!(f, "Validation error for field '{}': {}", field, message)
            }
            ValidationError::FieldErrors(errors) => {
                let msgs: Vec<String> = errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                write!(f, "Validation errors: {}", msgs.join(", "))
            }
            ValidationError::InvalidJson { message } => {
                write!(f, "Invalid JSON: {}", message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for CourierError {
    fn from(err: ValidationError) -> Self {
        CourierError::Validation(err)
    }
}

impl From<validator::ValidationErrors> for ValidationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldValidationError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| FieldValidationError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        ValidationError::FieldErrors(fields)
    }
}

impl From<validator::ValidationErrors> for CourierError {
    fn from(errors: validator::ValidationErrors) -> Self {
        CourierError::Validation(errors.into())
    }
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors related to store backends
#[derive(Debug)]
pub enum StorageError {
    /// A store operation failed
    OperationFailed { operation: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::OperationFailed { operation, message } => {
                write!(f, "Storage {} failed: {}", operation, message)
            }
        }
    }
}

impl std::error::Error for StorageError {}

impl From<StorageError> for CourierError {
    fn from(err: StorageError) -> Self {
        CourierError::Storage(err)
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to parse configuration
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// Invalid value in configuration
    InvalidValue {
        field: String,
        value: String,
        message: String,
    },

    /// IO error while reading configuration
    IoError { message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ParseError { file, message } => {
                if let Some(file) = file {
                    write!(f, "Failed to parse config file '{}': {}", file, message)
                } else {
                    write!(f, "Failed to parse config: {}", message)
                }
            }
            ConfigError::InvalidValue {
                field,
                value,
                message,
            } => write!(
                f,
                "Invalid value '{}' for field '{}': {}",
                value, field, message
            ),
            ConfigError::IoError { message } => write!(f, "IO error: {}", message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for CourierError {
    fn from(err: ConfigError) -> Self {
        CourierError::Config(err)
    }
}

// =============================================================================
// Delivery Errors (internal, never surfaced to a transition caller)
// =============================================================================

/// A live send to one connection failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The connection's writer has gone away
    Closed,
    /// The connection's outbound buffer is full
    BufferFull,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Closed => write!(f, "connection closed"),
            DeliveryError::BufferFull => write!(f, "outbound buffer full"),
        }
    }
}

impl std::error::Error for DeliveryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_maps_to_conflict() {
        let err: CourierError = OrderError::InvalidTransition {
            order_id: Uuid::new_v4(),
            from: OrderStatus::Delivered,
            to: OrderStatus::Accepted,
        }
        .into();

        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        let details = err.to_response().details.expect("details");
        assert_eq!(details["from"], "DELIVERED");
        assert_eq!(details["to"], "ACCEPTED");
    }

    #[test]
    fn test_auth_errors_status() {
        assert_eq!(
            CourierError::from(AuthError::Unauthenticated).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CourierError::from(AuthError::Forbidden {
                message: "not your order".into()
            })
            .status_code(),
            StatusCode::FORBIDDEN
        );
        assert!(AuthError::TokenExpired.is_unauthenticated());
        assert!(
            !AuthError::Forbidden {
                message: String::new()
            }
            .is_unauthenticated()
        );
    }

    #[test]
    fn test_field_shorthand() {
        let err = CourierError::field("reason", "too short");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Validation error for field 'reason': too short"
        );
    }

    #[test]
    fn test_not_found_details() {
        let err = CourierError::not_found("notification", "abc");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        let details = err.to_response().details.expect("details");
        assert_eq!(details["entity_type"], "notification");
        assert_eq!(details["id"], "abc");
    }
}
