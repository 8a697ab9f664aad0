//! REST API exposure
//!
//! The HTTP surface the CRUD layer and clients call: order mutation
//! triggers, chat, notification history and device tokens. Every handler
//! authenticates through the extractors in [`auth`] and delegates to the
//! services on the [`ServerHost`].

pub mod auth;

use super::super::host::ServerHost;
use crate::core::error::CourierError;
use crate::orders::NewOrder;
use crate::service::{DeviceTokenInput, DirectNotification};
use anyhow::Result;
use auth::{AuthCaller, Authenticated};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use uuid::Uuid;

pub struct RestExposure;

impl RestExposure {
    /// Build the REST router from a host
    pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Result<Router> {
        let api = Router::new()
            .route("/stats", get(stats))
            .route("/notifications", get(list_notifications).post(send_notification))
            .route("/notifications/{id}/read", post(mark_notification_read))
            .route(
                "/device-tokens",
                get(list_device_tokens).post(register_device_token),
            )
            .route("/device-tokens/{id}", delete(remove_device_token))
            .route("/orders", post(create_order))
            .route("/orders/{id}", get(get_order))
            .route("/orders/{id}/accept", post(accept_order))
            .route("/orders/{id}/assign", post(assign_order))
            .route("/orders/{id}/pick", post(pick_order))
            .route("/orders/{id}/deliver", post(deliver_order))
            .route("/orders/{id}/cancel", post(cancel_order))
            .route(
                "/orders/{id}/messages",
                get(list_messages).post(send_message),
            )
            .with_state(host);

        let mut app = Self::health_routes().merge(api);
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app)
    }

    fn health_routes() -> Router {
        Router::new()
            .route("/health", get(Self::health_check))
            .route("/healthz", get(Self::health_check))
    }

    async fn health_check() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "service": "courier"
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    limit: Option<usize>,
    zone_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AcceptBody {
    preparation_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AssignBody {
    rider_id: String,
}

#[derive(Debug, Deserialize)]
struct CancelBody {
    reason: String,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    message: String,
}

async fn stats(State(host): State<Arc<ServerHost>>) -> impl IntoResponse {
    Json(host.registry.stats())
}

async fn list_notifications(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, CourierError> {
    let notifications = host
        .notifications
        .list(&identity, query.zone_id.as_deref(), query.limit)
        .await?;
    Ok(Json(notifications))
}

async fn send_notification(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Json(input): Json<DirectNotification>,
) -> Result<impl IntoResponse, CourierError> {
    let report = host.notifications.send_direct(&caller, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "notification_id": report.notification_id,
            "delivered": report.delivered,
            "pushed": report.pushed,
        })),
    ))
}

async fn mark_notification_read(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.notifications.mark_read(&identity, &id).await?))
}

async fn register_device_token(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
    Json(input): Json<DeviceTokenInput>,
) -> Result<impl IntoResponse, CourierError> {
    let token = host
        .notifications
        .register_device_token(&identity, input)
        .await?;
    Ok((StatusCode::CREATED, Json(token)))
}

async fn list_device_tokens(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.notifications.list_device_tokens(&identity).await?))
}

async fn remove_device_token(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    host.notifications
        .remove_device_token(&identity, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Json(input): Json<NewOrder>,
) -> Result<impl IntoResponse, CourierError> {
    let order = host.orders.create(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.get(&caller, &id).await?))
}

async fn accept_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
    body: Option<Json<AcceptBody>>,
) -> Result<impl IntoResponse, CourierError> {
    let preparation_minutes = body.and_then(|Json(b)| b.preparation_minutes);
    let order = host
        .orders
        .accept(&caller, &id, preparation_minutes)
        .await?;
    Ok(Json(order))
}

async fn assign_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
    Json(body): Json<AssignBody>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.assign(&caller, &id, &body.rider_id).await?))
}

async fn pick_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.pick(&caller, &id).await?))
}

async fn deliver_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.deliver(&caller, &id).await?))
}

async fn cancel_order(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelBody>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.cancel(&caller, &id, &body.reason).await?))
}

async fn send_message(
    State(host): State<Arc<ServerHost>>,
    Authenticated(identity): Authenticated,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Result<impl IntoResponse, CourierError> {
    let message = host.orders.send_chat(&identity, &id, &body.message).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

async fn list_messages(
    State(host): State<Arc<ServerHost>>,
    AuthCaller(caller): AuthCaller,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, CourierError> {
    Ok(Json(host.orders.list_chat(&caller, &id).await?))
}
