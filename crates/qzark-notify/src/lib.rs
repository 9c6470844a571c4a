//! qzark-notify: failure-alert fanout across independent channels.
//!
//! One failure message is attempted on every enabled channel. Each channel's
//! outcome is contained and logged; a broken channel never prevents the
//! remaining channels and never surfaces an error to the scheduler.

pub mod discord;
pub mod email;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use qzark_config::Settings;

/// Per-call timeout for the HTTP notification channels.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One independently configured failure-alert delivery mechanism.
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Channel name used in logs and reports (e.g. "telegram").
    fn name(&self) -> &str;

    /// Deliver one message. Errors are contained by the fanout.
    async fn send(&self, message: &str) -> anyhow::Result<()>;
}

/// Delivery result for a single channel.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub result: Result<(), String>,
}

/// Aggregate outcome of one fanout call.
#[derive(Debug, Clone, Default)]
pub struct FanoutReport {
    pub outcomes: Vec<DeliveryOutcome>,
}

impl FanoutReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }

    pub fn outcome_for(&self, channel: &str) -> Option<&DeliveryOutcome> {
        self.outcomes.iter().find(|o| o.channel == channel)
    }
}

/// Fans a failure message out to every enabled channel.
pub struct Notifier {
    channels: Vec<Box<dyn NotifyChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Box<dyn NotifyChannel>>) -> Self {
        Self { channels }
    }

    /// Build the channel set from settings. A channel is enabled iff all of
    /// its required fields are present.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut channels: Vec<Box<dyn NotifyChannel>> = Vec::new();

        if let (Some(token), Some(chat_id)) =
            (&settings.telegram_bot_token, &settings.telegram_chat_id)
        {
            channels.push(Box::new(telegram::TelegramChannel::new(token, chat_id)));
        }
        if let Some(url) = &settings.discord_webhook_url {
            channels.push(Box::new(discord::DiscordChannel::new(url)));
        }
        if let (Some(server), Some(from), Some(to)) = (
            &settings.smtp_server,
            &settings.smtp_from_email,
            &settings.smtp_to_email,
        ) {
            channels.push(Box::new(email::EmailChannel::new(
                server,
                settings.smtp_port,
                settings.smtp_username.clone(),
                settings.smtp_password.clone(),
                from,
                to,
            )));
        }

        Self { channels }
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Deliver a failure alert for the named task on every channel.
    ///
    /// Always returns; per-channel failures are logged and collected into
    /// the report, never propagated.
    pub async fn notify(&self, task_name: &str, error_message: &str) -> FanoutReport {
        let message = format!("Task '{task_name}' failed.\nError: {error_message}");
        error!("Notifying about failure: {message}");

        let mut report = FanoutReport::default();
        for channel in &self.channels {
            let result = match channel.send(&message).await {
                Ok(()) => {
                    info!("{} notification sent", channel.name());
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to send {} notification: {e:#}", channel.name());
                    Err(format!("{e:#}"))
                }
            };
            report.outcomes.push(DeliveryOutcome {
                channel: channel.name().to_string(),
                result,
            });
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingChannel {
        name: &'static str,
        messages: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn send(&self, message: &str) -> anyhow::Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct FailingChannel;

    #[async_trait]
    impl NotifyChannel for FailingChannel {
        fn name(&self) -> &str {
            "failing"
        }

        async fn send(&self, _message: &str) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test]
    async fn test_message_format() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(vec![Box::new(RecordingChannel {
            name: "recording",
            messages: messages.clone(),
        })]);

        notifier.notify("backup", "disk full").await;

        let sent = messages.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], "Task 'backup' failed.\nError: disk full");
    }

    #[tokio::test]
    async fn test_failing_channel_does_not_block_siblings() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let notifier = Notifier::new(vec![
            Box::new(FailingChannel),
            Box::new(RecordingChannel {
                name: "recording",
                messages: messages.clone(),
            }),
        ]);

        let report = notifier.notify("b-task", "boom").await;

        assert_eq!(messages.lock().unwrap().len(), 1, "sibling still attempted");
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.delivered(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.outcome_for("failing").unwrap().result.is_err());
        assert!(report.outcome_for("recording").unwrap().result.is_ok());
    }

    #[tokio::test]
    async fn test_no_channels_is_a_noop() {
        let notifier = Notifier::new(Vec::new());
        let report = notifier.notify("t", "e").await;
        assert_eq!(report.attempted(), 0);
    }

    #[test]
    fn test_from_settings_enablement() {
        let notifier = Notifier::from_settings(&Settings::default());
        assert_eq!(notifier.channel_count(), 0);

        let mut settings = Settings::default();
        settings.telegram_bot_token = Some("123:abc".into());
        let notifier = Notifier::from_settings(&settings);
        assert_eq!(notifier.channel_count(), 0, "chat id missing");

        settings.telegram_chat_id = Some("42".into());
        settings.discord_webhook_url = Some("https://discord.com/api/webhooks/1/x".into());
        let notifier = Notifier::from_settings(&settings);
        assert_eq!(notifier.channel_count(), 2);
    }
}
