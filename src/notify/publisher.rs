//! HTTP client for the MQTT sender

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};

use super::TelemetryEvent;
use crate::config::TelemetryConfig;
use crate::{Error, Result};

/// Publishes [`TelemetryEvent`]s to the sender's `/publish` endpoint
#[derive(Debug, Clone)]
pub struct TelemetryPublisher {
    client: Client,
    publish_url: String,
}

impl TelemetryPublisher {
    /// Create a publisher for the sender at `sender_host` (`host:port`)
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(sender_host: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            publish_url: format!("http://{sender_host}/publish"),
        })
    }

    /// Create a publisher from config, or `None` when no sender is configured
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn from_config(config: &TelemetryConfig) -> Result<Option<Self>> {
        config
            .sender_host
            .as_deref()
            .map(|host| Self::new(host, config.timeout))
            .transpose()
    }

    /// Full URL events are posted to
    #[must_use]
    pub fn publish_url(&self) -> &str {
        &self.publish_url
    }

    /// Publish one event; the sender acknowledges with `204 No Content`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Notification`] if the sender is unreachable, times out,
    /// or answers with any other status
    pub async fn publish(&self, event: &TelemetryEvent) -> Result<()> {
        let body = serde_json::to_vec(event)?;

        let response = self
            .client
            .post(&self.publish_url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                Error::Notification(format!("cannot reach {}: {e}", self.publish_url))
            })?;

        let status = response.status();
        if status != StatusCode::NO_CONTENT {
            return Err(Error::Notification(format!(
                "unexpected publish status: {status}"
            )));
        }

        tracing::debug!(
            topic = %event.topic,
            payload = %event.payload,
            "published telemetry"
        );
        Ok(())
    }
}
