//! Shared harness for the integration tests: a seeded catalog, token
//! helpers and a server bound to an ephemeral port.

#![allow(dead_code)]

use courier::config::CourierConfig;
use courier::core::auth::{JwtVerifier, Role};
use courier::orders::{Food, Restaurant, Rider, Variation};
use courier::server::{ServerBuilder, ServerHost};
use courier::storage::InMemoryCatalogStore;
use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub const SECRET: &str = "integration-secret";
pub const OPERATOR_KEY: &str = "integration-operator";

pub type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
pub type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub host: Arc<ServerHost>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }
}

pub fn test_config() -> CourierConfig {
    let mut config = CourierConfig::default_config();
    config.auth.jwt_secret = SECRET.to_string();
    config.auth.operator_key = Some(OPERATOR_KEY.to_string());
    config
}

pub fn restaurant() -> Restaurant {
    Restaurant {
        id: "rest-1".to_string(),
        name: "Burger Barn".to_string(),
        zone_id: "zone-a".to_string(),
        active: true,
        available: true,
        minimum_order: Decimal::new(1000, 2),
        preparation_minutes: 20,
        menu: vec![Food {
            id: "burger".to_string(),
            title: "Burger".to_string(),
            out_of_stock: false,
            variations: vec![Variation {
                id: "regular".to_string(),
                title: "Regular".to_string(),
                price: Decimal::new(1250, 2),
                discounted: None,
                out_of_stock: false,
            }],
        }],
    }
}

pub fn rider(id: &str, available: bool) -> Rider {
    Rider {
        id: id.to_string(),
        name: format!("Rider {}", id),
        zone_id: "zone-a".to_string(),
        available,
    }
}

pub fn seeded_catalog() -> InMemoryCatalogStore {
    let catalog = InMemoryCatalogStore::new();
    catalog.put_restaurant(restaurant()).unwrap();
    catalog.put_rider(rider("rider-1", true)).unwrap();
    catalog.put_rider(rider("rider-off", false)).unwrap();
    catalog
}

pub async fn start_server() -> TestServer {
    start_server_with(test_config()).await
}

pub async fn start_server_with(config: CourierConfig) -> TestServer {
    let (host, app) = ServerBuilder::new()
        .with_config(config)
        .with_catalog_store(seeded_catalog())
        .build_with_host()
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        host,
        client: reqwest::Client::new(),
    }
}

pub fn token(actor_id: &str, role: Role) -> String {
    JwtVerifier::new(SECRET.as_bytes())
        .issue(actor_id, role, chrono::Duration::hours(1))
        .unwrap()
}

pub fn bearer(actor_id: &str, role: Role) -> String {
    format!("Bearer {}", token(actor_id, role))
}

pub fn order_body() -> Value {
    json!({
        "restaurant_id": "rest-1",
        "items": [{ "food_id": "burger", "variation_id": "regular", "quantity": 2 }],
        "delivery_address": "1 Main Street",
    })
}

/// Place an order as `cust-1` and return its id
pub async fn place_order(server: &TestServer) -> String {
    let response = server
        .client
        .post(server.url("/orders"))
        .header("authorization", bearer("cust-1", Role::Customer))
        .json(&order_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let order: Value = response.json().await.unwrap();
    order["id"].as_str().unwrap().to_string()
}

/// Connect and consume the `connection` ack
pub async fn ws_connect(server: &TestServer, query: &str) -> (Value, WsWrite, WsRead) {
    let (stream, _) = connect_async(server.ws_url(query))
        .await
        .expect("Failed to connect");
    let (write, mut read) = stream.split();
    let ack = ws_recv(&mut read).await;
    assert_eq!(ack["type"], "connection");
    (ack, write, read)
}

pub async fn ws_connect_as(server: &TestServer, actor_id: &str, role: Role) -> (Value, WsWrite, WsRead) {
    ws_connect(server, &format!("?token={}", token(actor_id, role))).await
}

/// Next text frame as JSON, skipping transport pings
pub async fn ws_recv(read: &mut WsRead) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timeout waiting for WS message")
            .expect("Stream ended")
            .expect("WS error");

        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected text message, got {:?}", other),
        }
    }
}

/// Next notification frame's `data`
pub async fn ws_recv_notification(read: &mut WsRead) -> Value {
    let msg = ws_recv(read).await;
    assert_eq!(msg["type"], "notification", "unexpected frame {}", msg);
    msg["data"].clone()
}

/// Wait for the close frame and return its code
pub async fn ws_recv_close(read: &mut WsRead) -> u16 {
    loop {
        let msg = timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Timeout waiting for close")
            .expect("Stream ended")
            .expect("WS error");

        match msg {
            Message::Close(Some(frame)) => return u16::from(frame.code),
            Message::Close(None) => panic!("Close frame without a code"),
            _ => continue,
        }
    }
}

/// Assert nothing arrives for a short while
pub async fn ws_assert_silent(read: &mut WsRead) {
    let next = timeout(Duration::from_millis(200), read.next()).await;
    assert!(next.is_err(), "expected no frame, got {:?}", next);
}
