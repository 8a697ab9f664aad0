//! Tests for the typed error handling system
//!
//! These tests verify that:
//! - Errors map to the right HTTP status codes and error codes
//! - Error responses are `{code, message, details}` JSON
//! - The REST surface rejects bad identities and bad input consistently

mod common;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::*;
use courier::core::error::{
    AuthError, ConfigError, CourierError, EntityError, OrderError, ValidationError,
};
use courier::orders::OrderStatus;
use courier::prelude::Role;
use serde_json::{Value, json};
use uuid::Uuid;

// =============================================================================
// Status and error codes
// =============================================================================

mod status_code_tests {
    use super::*;

    #[test]
    fn test_auth_errors() {
        let unauthenticated = CourierError::Auth(AuthError::Unauthenticated);
        assert_eq!(unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(unauthenticated.error_code(), "UNAUTHENTICATED");

        let expired = CourierError::Auth(AuthError::TokenExpired);
        assert_eq!(expired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(expired.error_code(), "TOKEN_EXPIRED");

        let forbidden = CourierError::Auth(AuthError::Forbidden {
            message: "no".to_string(),
        });
        assert_eq!(forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(forbidden.error_code(), "FORBIDDEN");
    }

    #[test]
    fn test_not_found_returns_404() {
        let err = CourierError::not_found("order", Uuid::new_v4());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(matches!(err, CourierError::Entity(EntityError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_transition_returns_409() {
        let err = CourierError::Order(OrderError::InvalidTransition {
            order_id: Uuid::new_v4(),
            from: OrderStatus::Delivered,
            to: OrderStatus::Cancelled,
        });
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_validation_returns_400() {
        let err = CourierError::field("reason", "too short");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(matches!(
            err,
            CourierError::Validation(ValidationError::FieldError { ref field, .. }) if field == "reason"
        ));
    }

    #[test]
    fn test_config_error_returns_500() {
        let err: CourierError = ConfigError::InvalidValue {
            field: "auth.jwt_secret".to_string(),
            value: String::new(),
            message: "required".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

// =============================================================================
// Response bodies
// =============================================================================

mod response_tests {
    use super::*;

    #[test]
    fn test_error_response_shape() {
        let order_id = Uuid::new_v4();
        let err = CourierError::Order(OrderError::InvalidTransition {
            order_id,
            from: OrderStatus::Pending,
            to: OrderStatus::Picked,
        });

        let body = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(body["code"], "INVALID_TRANSITION");
        assert!(body["message"].as_str().unwrap().contains("PENDING"));
        assert_eq!(body["details"]["order_id"], order_id.to_string());
        assert_eq!(body["details"]["from"], "PENDING");
        assert_eq!(body["details"]["to"], "PICKED");
    }

    #[test]
    fn test_details_omitted_when_absent() {
        let body = serde_json::to_value(
            CourierError::Auth(AuthError::Unauthenticated).to_response(),
        )
        .unwrap();
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_into_response_status() {
        let response = CourierError::not_found("notification", Uuid::new_v4()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// =============================================================================
// Over HTTP
// =============================================================================

async fn error_body(response: reqwest::Response) -> (u16, Value) {
    let status = response.status().as_u16();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_missing_token_is_401() {
    let server = start_server().await;
    let (status, body) =
        error_body(server.client.get(server.url("/notifications")).send().await.unwrap()).await;

    assert_eq!(status, 401);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn test_garbage_token_is_401() {
    let server = start_server().await;
    let (status, body) = error_body(
        server
            .client
            .get(server.url("/notifications"))
            .header("authorization", "Bearer garbage")
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 401);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_wrong_operator_key_is_403() {
    let server = start_server().await;
    let (status, body) = error_body(
        server
            .client
            .post(server.url("/notifications"))
            .header("x-operator-key", "guess")
            .json(&json!({ "recipient_id": "cust-1", "title": "t", "message": "m" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_actor_cannot_send_direct_notification() {
    let server = start_server().await;
    let (status, body) = error_body(
        server
            .client
            .post(server.url("/notifications"))
            .header("authorization", bearer("cust-1", Role::Customer))
            .json(&json!({ "recipient_id": "cust-2", "title": "t", "message": "m" }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_other_restaurant_cannot_accept() {
    let server = start_server().await;
    let id = place_order(&server).await;

    let (status, body) = error_body(
        server
            .client
            .post(server.url(&format!("/orders/{}/accept", id)))
            .header("authorization", bearer("rest-2", Role::Restaurant))
            .json(&json!({}))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 403);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_unknown_order_is_404() {
    let server = start_server().await;
    let (status, body) = error_body(
        server
            .client
            .get(server.url(&format!("/orders/{}", Uuid::new_v4())))
            .header("authorization", bearer("cust-1", Role::Customer))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 404);
    assert_eq!(body["code"], "NOT_FOUND");
    assert_eq!(body["details"]["entity_type"], "order");
}

#[tokio::test]
async fn test_foreign_order_is_hidden() {
    let server = start_server().await;
    let id = place_order(&server).await;

    let (status, _) = error_body(
        server
            .client
            .get(server.url(&format!("/orders/{}", id)))
            .header("authorization", bearer("cust-2", Role::Customer))
            .send()
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn test_pick_before_assign_is_409() {
    let server = start_server().await;
    let id = place_order(&server).await;

    let (status, body) = error_body(
        server
            .client
            .post(server.url(&format!("/orders/{}/pick", id)))
            .header("x-operator-key", OPERATOR_KEY)
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 409);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert_eq!(body["details"]["from"], "PENDING");
}

#[tokio::test]
async fn test_short_cancel_reason_is_400() {
    let server = start_server().await;
    let id = place_order(&server).await;

    let (status, body) = error_body(
        server
            .client
            .post(server.url(&format!("/orders/{}/cancel", id)))
            .header("authorization", bearer("cust-1", Role::Customer))
            .json(&json!({ "reason": " no " }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_zero_quantity_is_400() {
    let server = start_server().await;
    let (status, body) = error_body(
        server
            .client
            .post(server.url("/orders"))
            .header("authorization", bearer("cust-1", Role::Customer))
            .json(&json!({
                "restaurant_id": "rest-1",
                "items": [{ "food_id": "burger", "variation_id": "regular", "quantity": 0 }],
                "delivery_address": "1 Main Street",
            }))
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_restaurant_is_404() {
    let server = start_server().await;
    let mut body = order_body();
    body["restaurant_id"] = json!("nowhere");

    let (status, body) = error_body(
        server
            .client
            .post(server.url("/orders"))
            .header("authorization", bearer("cust-1", Role::Customer))
            .json(&body)
            .send()
            .await
            .unwrap(),
    )
    .await;

    assert_eq!(status, 404);
    assert_eq!(body["details"]["entity_type"], "restaurant");
}
