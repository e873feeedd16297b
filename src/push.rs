//! Push notification delivery
//!
//! Notifications are best-effort: a missing token or a gateway failure is
//! logged and reported as an outcome, never as an error to the sender.

use crate::{
    directory::{PushTokenStore, UserDirectory},
    protocol::{MessageRecord, PushNotification},
    storage::Settings,
    Error, Result,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// HTTP client for the push gateway
#[derive(Debug, Clone)]
pub struct PushGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl PushGateway {
    /// Create a gateway client for `endpoint`
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    /// POST one notification; non-2xx responses are errors
    pub async fn send(&self, notification: &PushNotification) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(notification)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Push(format!(
                "Gateway rejected notification with status {}: {}",
                status, body
            )));
        }

        debug!("Push gateway accepted notification for {}", notification.to);
        Ok(())
    }
}

/// Result of a best-effort notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// Gateway accepted the notification
    Sent,
    /// Notifications are switched off
    Disabled,
    /// Receiver has no registered token
    NoToken,
    /// Lookup or delivery failed
    Failed(String),
}

/// Sends "new message" notifications to the receiver of a record
#[derive(Clone)]
pub struct Notifier {
    gateway: PushGateway,
    tokens: Arc<dyn PushTokenStore>,
    directory: Arc<dyn UserDirectory>,
    enabled: bool,
}

impl Notifier {
    /// Create a notifier
    pub fn new(gateway: PushGateway, tokens: Arc<dyn PushTokenStore>, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            gateway,
            tokens,
            directory,
            enabled: true,
        }
    }

    /// Create a notifier configured from settings
    pub fn from_settings(
        settings: &Settings,
        tokens: Arc<dyn PushTokenStore>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let mut notifier = Self::new(PushGateway::new(&settings.push_endpoint), tokens, directory);
        notifier.enabled = settings.enable_notifications;
        notifier
    }

    /// Notify `record.receiver` about a message; never fails
    pub async fn notify(&self, record: &MessageRecord) -> PushOutcome {
        if !self.enabled {
            return PushOutcome::Disabled;
        }

        match self.try_notify(record).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to notify {}: {}", record.receiver, e);
                PushOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_notify(&self, record: &MessageRecord) -> Result<PushOutcome> {
        let token = match self.tokens.push_token(&record.receiver).await? {
            Some(token) if !token.is_empty() => token,
            _ => {
                warn!("Missing push token for receiver {}", record.receiver);
                return Ok(PushOutcome::NoToken);
            }
        };

        let sender_name = self.directory.display_name(&record.sender).await?;
        let notification = PushNotification::new_message(&token, &sender_name, record)?;
        self.gateway.send(&notification).await?;

        info!("Notification sent to {}", record.receiver);
        Ok(PushOutcome::Sent)
    }
}
