use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::AlertChannel;

use crate::{ChannelError, DeliveryChannel, NotifierError};

const SUBJECT: &str = "Alert Notification";

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Plain-text plus HTML alternative body for an alert message.
pub fn alert_body(message: &str) -> MultiPart {
    MultiPart::alternative_plain_html(
        message.to_string(),
        format!("<p><strong>{}</strong></p>", escape_html(message)),
    )
}

pub fn parse_mailbox(address: &str) -> Result<Mailbox, ChannelError> {
    address.parse().map_err(|e: lettre::address::AddressError| ChannelError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// SMTP sender using STARTTLS and the configured credentials.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    pub fn from_config(config: &AppConfig) -> Result<Self, NotifierError> {
        let from = parse_mailbox(&config.email_from)
            .map_err(|e| NotifierError::TransportSetup(e.to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifierError::TransportSetup(format!("Failed to create SMTP transport: {}", e)))?
            .port(config.smtp_port);

        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    pub fn build_message(&self, target: &str, message: &str) -> Result<Message, ChannelError> {
        Message::builder()
            .from(self.from.clone())
            .to(parse_mailbox(target)?)
            .subject(SUBJECT)
            .multipart(alert_body(message))
            .map_err(|e| ChannelError::Email(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn channel(&self) -> AlertChannel {
        AlertChannel::Email
    }

    async fn deliver(&self, target: &str, message: &str) -> Result<(), ChannelError> {
        let email = self.build_message(target, message)?;

        self.transport
            .send(email)
            .await
            .map_err(|e| ChannelError::Email(format!("Failed to send email: {}", e)))?;

        debug!("Email sent to {}", target);
        Ok(())
    }
}
