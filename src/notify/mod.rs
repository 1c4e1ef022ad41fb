/// Notifications about DID lifecycle events
///
/// The policy functions decide who hears about what; `Notifier`
/// implementations decide how. Delivery runs detached from the operation
/// that triggered it and its failures never reach the caller.
pub mod policy;
pub mod push;
pub mod socket;

use crate::{error::RegistryResult, metrics};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use policy::{on_approved, on_created, on_rejected, Delivery};
pub use push::PushNotifier;
pub use socket::{SocketHub, SocketMessage};

/// Kinds of lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    DidCreated,
    DidApproved,
    DidRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::DidCreated => "did_created",
            NotificationKind::DidApproved => "did_approved",
            NotificationKind::DidRejected => "did_rejected",
        }
    }
}

/// Message delivered to a recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub did: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Id of the record the notification is about
    pub notification_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Delivery channel for notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs and metrics
    fn channel(&self) -> &'static str;

    async fn notify(&self, recipient: &str, notification: &Notification) -> RegistryResult<()>;
}

/// Delivers to every channel in turn. All channels are attempted; the
/// first failure is reported afterwards.
pub struct FanoutNotifier {
    channels: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new(channels: Vec<Arc<dyn Notifier>>) -> Self {
        Self { channels }
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    fn channel(&self) -> &'static str {
        "fanout"
    }

    async fn notify(&self, recipient: &str, notification: &Notification) -> RegistryResult<()> {
        let mut first_error = None;

        for channel in &self.channels {
            match channel.notify(recipient, notification).await {
                Ok(()) => metrics::record_notification(channel.channel(), true),
                Err(e) => {
                    metrics::record_notification(channel.channel(), false);
                    warn!(
                        "{} notification to {} via {} failed: {}",
                        notification.kind.as_str(),
                        recipient,
                        channel.channel(),
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Send `deliveries` on a background task. Failures are logged and counted,
/// never retried.
pub fn dispatch_detached(notifier: Arc<dyn Notifier>, deliveries: Vec<Delivery>) -> JoinHandle<()> {
    tokio::spawn(async move {
        for delivery in deliveries {
            match notifier.notify(&delivery.recipient, &delivery.notification).await {
                Ok(()) => debug!(
                    "Sent {} for {} to {}",
                    delivery.notification.kind.as_str(),
                    delivery.notification.did,
                    delivery.recipient
                ),
                Err(e) => {
                    metrics::record_error("notification", "notify");
                    warn!(
                        "Failed to send {} for {} to {}: {}",
                        delivery.notification.kind.as_str(),
                        delivery.notification.did,
                        delivery.recipient,
                        e
                    );
                }
            }
        }
    })
}


#[cfg(test)]
mod tests {
    use super::testing::{FailingNotifier, RecordingNotifier};
    use super::*;

    fn notification() -> Notification {
        Notification {
            title: "DID approved".to_string(),
            body: "Your DID did:web:example.com:alice has been approved".to_string(),
            kind: NotificationKind::DidApproved,
            did: "did:web:example.com:alice".to_string(),
            sender_id: None,
            notification_id: "rec-1".to_string(),
            reason: None,
        }
    }

    #[test]
    fn test_notification_wire_format() {
        let json = serde_json::to_value(notification()).unwrap();
        assert_eq!(json["type"], "did_approved");
        assert_eq!(json["notification_id"], "rec-1");
        assert!(json.get("reason").is_none());
        assert!(json.get("sender_id").is_none());
    }

    #[tokio::test]
    async fn test_fanout_attempts_every_channel() {
        let recorder = Arc::new(RecordingNotifier::default());
        let fanout = FanoutNotifier::new(vec![
            Arc::new(FailingNotifier),
            recorder.clone() as Arc<dyn Notifier>,
        ]);

        let result = fanout.notify("device-1", &notification()).await;
        assert!(result.is_err());
        assert_eq!(recorder.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_swallows_failures() {
        let delivery = Delivery {
            recipient: "device-1".to_string(),
            notification: notification(),
        };
        let handle = dispatch_detached(Arc::new(FailingNotifier), vec![delivery.clone()]);
        handle.await.unwrap();

        let recorder = Arc::new(RecordingNotifier::default());
        dispatch_detached(recorder.clone(), vec![delivery.clone(), delivery])
            .await
            .unwrap();
        assert_eq!(recorder.sent.lock().await.len(), 2);
    }
}
