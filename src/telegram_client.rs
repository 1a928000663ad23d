use crate::domain::UserId;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to reach the chat API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("message rejected. Status: {status}. Error: {description}")]
    Rejected {
        status: StatusCode,
        description: String,
    },
}

/// Delivers text messages to a user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError>;
}

#[derive(Clone)]
pub struct TelegramClient {
    http_client: Client,
    base_url: String,
    bot_token: Secret<String>,
}

impl TelegramClient {
    pub fn new(
        base_url: String,
        bot_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            base_url,
            bot_token,
        })
    }

    pub async fn send_message(&self, chat_id: UserId, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );
        let request_body = SendMessageRequest {
            chat_id: chat_id.as_i64(),
            text,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let description = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::Rejected {
                status,
                description,
            });
        }

        let body: SendMessageResponse = response.json().await?;
        if !body.ok {
            return Err(NotifyError::Rejected {
                status,
                description: body.description.unwrap_or_default(),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for TelegramClient {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), NotifyError> {
        self.send_message(user_id, text).await
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}
