use super::sink::{DeliveryReceipt, NotificationSink};
use crate::error::{MotioncamError, NotificationError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    recipient: &'a str,
    message: &'a str,
}

/// POSTs `{ "recipient": ..., "message": ... }` to a messaging relay
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, MotioncamError> {
        if url.trim().is_empty() {
            return Err(MotioncamError::component(
                "notification",
                "webhook url must not be empty",
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MotioncamError::component("notification", e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn send(
        &self,
        recipient: &str,
        message: &str,
    ) -> Result<DeliveryReceipt, NotificationError> {
        debug!("Posting notification to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { recipient, message })
            .send()
            .await
            .map_err(|e| NotificationError::Delivery {
                details: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Webhook rejected notification with {}", status);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(DeliveryReceipt::new(recipient, self.name()))
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}
