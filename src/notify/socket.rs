/// In-process real-time channel
///
/// Connected clients subscribe with their recipient id and only see
/// messages addressed to them.
use super::{Notification, Notifier};
use crate::error::RegistryResult;
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Message on the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketMessage {
    pub recipient: String,
    pub notification: Notification,
}

/// Broadcast hub for live subscribers
#[derive(Clone)]
pub struct SocketHub {
    sender: broadcast::Sender<SocketMessage>,
}

impl SocketHub {
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Subscribe to messages for `recipient`
    pub fn subscribe(&self, recipient: impl Into<String>) -> SocketSubscription {
        SocketSubscription {
            recipient: recipient.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl Notifier for SocketHub {
    fn channel(&self) -> &'static str {
        "socket"
    }

    async fn notify(&self, recipient: &str, notification: &Notification) -> RegistryResult<()> {
        let message = SocketMessage {
            recipient: recipient.to_string(),
            notification: notification.clone(),
        };

        // No subscribers is not a failure; the recipient is simply offline
        if self.sender.send(message).is_err() {
            debug!("No live subscribers for {}", recipient);
        }
        Ok(())
    }
}

/// A recipient's view of the hub
pub struct SocketSubscription {
    recipient: String,
    receiver: broadcast::Receiver<SocketMessage>,
}

impl SocketSubscription {
    /// Next notification addressed to this subscriber, or `None` once the
    /// hub is gone
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.receiver.recv().await {
                Ok(message) if message.recipient == self.recipient => {
                    return Some(message.notification)
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber {} lagged, skipped {} messages", self.recipient, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
