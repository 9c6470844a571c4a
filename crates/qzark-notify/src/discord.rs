//! Discord webhook notification channel.

use anyhow::{Context, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::{HTTP_TIMEOUT, NotifyChannel};

/// Posts failure alerts to a configured Discord webhook.
pub struct DiscordChannel {
    client: Client,
    webhook_url: String,
}

impl DiscordChannel {
    pub fn new(webhook_url: &str) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            webhook_url: webhook_url.to_string(),
        }
    }
}

#[async_trait]
impl NotifyChannel for DiscordChannel {
    fn name(&self) -> &str {
        "discord"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": message }))
            .send()
            .await
            .context("webhook request failed")?;

        if !resp.status().is_success() {
            bail!("webhook returned HTTP {}", resp.status());
        }
        Ok(())
    }
}
