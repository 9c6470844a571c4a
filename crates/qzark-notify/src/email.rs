//! SMTP email notification channel.

use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::NotifyChannel;

/// Subject line for every failure email.
pub const EMAIL_SUBJECT: &str = "Qzark Task Failure Notification";

/// Port used when the settings omit one.
const DEFAULT_SMTP_PORT: u16 = 25;

/// Sends failure alerts as plain-text email over SMTP with STARTTLS.
/// Credentials are optional; when present the connection authenticates
/// before sending.
pub struct EmailChannel {
    server: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
    to: String,
}

impl EmailChannel {
    pub fn new(
        server: &str,
        port: Option<u16>,
        username: Option<String>,
        password: Option<String>,
        from: &str,
        to: &str,
    ) -> Self {
        Self {
            server: server.to_string(),
            port: port.unwrap_or(DEFAULT_SMTP_PORT),
            username,
            password,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    fn transport(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.server)
            .context("invalid SMTP server")?
            .port(self.port);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl NotifyChannel for EmailChannel {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, message: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("invalid from address")?)
            .to(self.to.parse().context("invalid to address")?)
            .subject(EMAIL_SUBJECT)
            .header(ContentType::TEXT_PLAIN)
            .body(message.to_string())
            .context("failed to build email")?;

        self.transport()?
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        Ok(())
    }
}
