//! Telegram Bot API transport over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ChatId, IncomingMessage, IncomingUpdate, Transport, TransportError};
use crate::config::TelegramConfig;
use crate::error::Result;

/// Envelope every Bot API method answers with.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct User {
    username: Option<String>,
    first_name: String,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

impl Update {
    fn into_incoming(self) -> IncomingUpdate {
        let message = self.message.and_then(|m| {
            m.text.map(|text| IncomingMessage {
                chat: ChatId(m.chat.id),
                text,
            })
        });
        IncomingUpdate {
            update_id: self.update_id,
            message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Bot API client bound to one bot token.
#[derive(Clone)]
pub struct TelegramTransport {
    client: reqwest::Client,
    base: String,
}

impl TelegramTransport {
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base: format!(
                "{}/bot{}",
                config.api_base.trim_end_matches('/'),
                config.bot_token
            ),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base, method)
    }

    async fn decode<T: DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> std::result::Result<T, TransportError> {
        let status = response.status().as_u16();
        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            TransportError::Network(format!("{} returned an unreadable body: {}", method, e))
        })?;
        into_result(method, status, envelope)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> std::result::Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&payload)
            .send()
            .await?;
        Self::decode(method, response).await
    }
}

fn into_result<T>(
    method: &str,
    status: u16,
    envelope: ApiResponse<T>,
) -> std::result::Result<T, TransportError> {
    if envelope.ok
        && let Some(result) = envelope.result
    {
        return Ok(result);
    }

    let code = envelope.error_code.unwrap_or(i64::from(status));
    if let Some(retry_after) = envelope.parameters.and_then(|p| p.retry_after) {
        return Err(TransportError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    Err(TransportError::Api {
        code,
        description: envelope
            .description
            .unwrap_or_else(|| format!("{} failed without description", method)),
    })
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn verify(&self) -> std::result::Result<String, TransportError> {
        let me: User = self.call("getMe", serde_json::json!({})).await?;
        Ok(me.username.unwrap_or(me.first_name))
    }

    async fn send_text(&self, chat: ChatId, text: &str) -> std::result::Result<(), TransportError> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({ "chat_id": chat.0, "text": text }),
            )
            .await?;
        Ok(())
    }

    async fn send_document(
        &self,
        chat: ChatId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> std::result::Result<(), TransportError> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new()
            .text("chat_id", chat.0.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        let _: serde_json::Value = Self::decode("sendDocument", response).await?;
        Ok(())
    }

    async fn poll_updates(
        &self,
        offset: Option<i64>,
        timeout: Duration,
    ) -> std::result::Result<Vec<IncomingUpdate>, TransportError> {
        let mut payload = serde_json::json!({
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            payload["offset"] = serde_json::json!(offset);
        }

        let updates: Vec<Update> = self.call("getUpdates", payload).await?;
        Ok(updates.into_iter().map(Update::into_incoming).collect())
    }
}
