mod sink;
#[cfg(feature = "webhook")]
mod webhook;

pub use sink::{notifier_from_config, DeliveryReceipt, LogNotifier, NotificationSink};
#[cfg(feature = "webhook")]
pub use webhook::WebhookNotifier;
