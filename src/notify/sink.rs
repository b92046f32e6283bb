use crate::config::NotificationConfig;
use crate::error::{NotificationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Confirmation that a message left this process
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub id: Uuid,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
    /// Name of the backend that delivered it
    pub backend: &'static str,
}

impl DeliveryReceipt {
    pub fn new(recipient: &str, backend: &'static str) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            sent_at: Utc::now(),
            backend,
        }
    }
}

/// Delivers short text messages to a recipient
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, recipient: &str, message: &str)
        -> std::result::Result<DeliveryReceipt, NotificationError>;

    fn name(&self) -> &'static str;
}

/// Writes notifications to the log only
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
    ) -> std::result::Result<DeliveryReceipt, NotificationError> {
        if recipient.is_empty() {
            info!("Notification: {}", message);
        } else {
            info!("Notification for {}: {}", recipient, message);
        }
        Ok(DeliveryReceipt::new(recipient, self.name()))
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Webhook delivery when enabled and compiled in, log-only otherwise
pub fn notifier_from_config(config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    if !config.enabled {
        info!("Notifications disabled; messages go to the log");
        return Ok(Arc::new(LogNotifier));
    }
    webhook_notifier(config)
}

#[cfg(feature = "webhook")]
fn webhook_notifier(config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    let url = config.webhook_url.as_deref().unwrap_or_default();
    let notifier = super::webhook::WebhookNotifier::new(
        url,
        std::time::Duration::from_secs(config.timeout_seconds.max(1)),
    )?;
    info!("Notifications delivered to webhook {}", url);
    Ok(Arc::new(notifier))
}

#[cfg(not(feature = "webhook"))]
fn webhook_notifier(_config: &NotificationConfig) -> Result<Arc<dyn NotificationSink>> {
    tracing::warn!(
        "Webhook support not compiled in (feature webhook); notifications go to the log"
    );
    Ok(Arc::new(LogNotifier))
}
