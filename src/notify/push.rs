/// Push gateway channel
///
/// Posts each notification as JSON to a configured gateway, which is
/// responsible for mapping recipients to devices.
use super::{Notification, Notifier};
use crate::error::{RegistryError, RegistryResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct PushRequest<'a> {
    recipient: &'a str,
    notification: &'a Notification,
}

/// HTTP push notifier
pub struct PushNotifier {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl PushNotifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> RegistryResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RegistryError::Config(format!("Failed to build push client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Notifier for PushNotifier {
    fn channel(&self) -> &'static str {
        "push"
    }

    async fn notify(&self, recipient: &str, notification: &Notification) -> RegistryResult<()> {
        let mut request = self.client.post(&self.url).json(&PushRequest {
            recipient,
            notification,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RegistryError::Notification(format!("Push request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Notification(format!(
                "Push gateway returned {}",
                status
            )));
        }

        debug!("Push gateway accepted {} for {}", notification.kind.as_str(), recipient);
        Ok(())
    }
}
