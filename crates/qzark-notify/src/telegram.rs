//! Telegram Bot API notification channel.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;

use crate::{HTTP_TIMEOUT, NotifyChannel};

/// Sends failure alerts through the Bot API `sendMessage` endpoint.
pub struct TelegramChannel {
    client: Client,
    base_url: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(bot_token: &str, chat_id: &str) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: format!("https://api.telegram.org/bot{bot_token}"),
            chat_id: chat_id.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl NotifyChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .get(format!("{}/sendMessage", self.base_url))
            .query(&[("chat_id", self.chat_id.as_str()), ("text", message)])
            .send()
            .await
            .context("sendMessage request failed")?;

        if !resp.status().is_success() {
            bail!("sendMessage returned HTTP {}", resp.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_endpoint_is_an_error() {
        // Port 9 on localhost is not listening; the request must fail fast
        // and come back as an error rather than a panic.
        let channel =
            TelegramChannel::new("123:abc", "42").with_base_url("http://127.0.0.1:9/bot123");
        let err = channel.send("hello").await.unwrap_err();
        assert!(err.to_string().contains("sendMessage request failed"));
    }
}
