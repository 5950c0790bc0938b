//! Publishes order events to NATS when a server is configured.

use std::fmt;

use crate::domain::events::OrderEvent;

#[derive(Clone, Default)]
pub struct EventPublisher {
    nats: Option<async_nats::Client>,
}

impl fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPublisher").field("enabled", &self.nats.is_some()).finish()
    }
}

impl EventPublisher {
    pub fn disabled() -> Self { Self::default() }

    /// Connects to `url`; an unreachable server leaves publishing disabled.
    pub async fn connect(url: Option<&str>) -> Self {
        let Some(url) = url else { return Self::disabled() };
        match async_nats::connect(url).await {
            Ok(client) => {
                tracing::info!(%url, "publishing order events to NATS");
                Self { nats: Some(client) }
            }
            Err(error) => {
                tracing::warn!(%url, %error, "NATS unavailable, order events will not be published");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool { self.nats.is_some() }

    /// Fire-and-forget: a failed publish is logged and never fails the request.
    pub async fn publish(&self, event: &OrderEvent) {
        let Some(client) = &self.nats else { return };
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%error, "could not serialize order event");
                return;
            }
        };
        if let Err(error) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), %error, "failed to publish order event");
        }
    }
}
