//! Expo push service client

use super::{PushMessage, PushProvider};
use crate::storage::DeviceToken;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;

pub const DEFAULT_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

#[derive(Debug, Serialize)]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a serde_json::Value,
    sound: &'static str,
}

pub struct ExpoPushProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl ExpoPushProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl Default for ExpoPushProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

#[async_trait]
impl PushProvider for ExpoPushProvider {
    fn name(&self) -> &'static str {
        "expo"
    }

    async fn send(&self, tokens: &[DeviceToken], message: &PushMessage) -> Result<usize> {
        if tokens.is_empty() {
            return Ok(0);
        }

        let batch: Vec<_> = tokens
            .iter()
            .map(|t| ExpoMessage {
                to: &t.token,
                title: &message.title,
                body: &message.body,
                data: &message.data,
                sound: "default",
            })
            .collect();

        let response = self.client.post(&self.endpoint).json(&batch).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Expo push failed with status {}", status));
        }

        Ok(tokens.len())
    }
}
