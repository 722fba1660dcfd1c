pub mod error;

pub use error::{Result, TelegramError};

use serde::{Deserialize, Serialize};

const BASE_URL: &str = "https://api.telegram.org";

/// Bot API hard cap on message length.
pub const MESSAGE_CAP: usize = 4096;

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramClient {
    client: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a plain-text message to the configured chat. The caller is
    /// responsible for keeping `text` within [`MESSAGE_CAP`].
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", BASE_URL, self.bot_token);
        let resp = self
            .client
            .post(&url)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body: ApiResponse = resp.json().await?;
        if !body.ok {
            return Err(TelegramError::Api {
                status: status.as_u16(),
                message: body.description.unwrap_or_default(),
            });
        }

        tracing::debug!(chars = text.len(), "Sent notification message");
        Ok(())
    }
}
