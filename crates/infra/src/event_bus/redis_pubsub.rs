//! Redis pub/sub transport for task-completion announcements.
//!
//! Only the payload goes on the wire, as JSON, on the channel named by the
//! envelope's topic. Pub/sub is not durable: subscribers that are offline miss
//! messages, which matches the at-most-once contract of the publisher.

use std::sync::mpsc;
use std::thread;

use chrono::Utc;
use redis::Commands;
use tracing::{debug, warn};

use marketing_events::{BusError, EventBus, EventEnvelope, Subscription, TaskCompletedMessage};

type CompletionEnvelope = EventEnvelope<TaskCompletedMessage>;

#[derive(Debug, Clone)]
pub struct RedisPubSubEventBus {
    client: redis::Client,
    /// Channel watched by `subscribe`.
    channel: String,
}

impl RedisPubSubEventBus {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| BusError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }
}

impl EventBus<CompletionEnvelope> for RedisPubSubEventBus {
    fn publish(&self, message: CompletionEnvelope) -> Result<(), BusError> {
        let payload = serde_json::to_string(message.payload())
            .map_err(|e| BusError::Encode(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| BusError::Transport(e.to_string()))?;

        let receivers: i64 = conn
            .publish(message.topic(), payload)
            .map_err(|e| BusError::Transport(e.to_string()))?;
        debug!(topic = message.topic(), receivers, "completion published to redis");
        Ok(())
    }

    fn subscribe(&self) -> Subscription<CompletionEnvelope> {
        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let channel = self.channel.clone();

        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "redis subscriber could not connect");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(e) = pubsub.subscribe(&channel) {
                warn!(channel = %channel, error = %e, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(_) => return,
                };
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                let message: TaskCompletedMessage = match serde_json::from_str(&payload) {
                    Ok(m) => m,
                    Err(e) => {
                        debug!(error = %e, "skipping undecodable completion message");
                        continue;
                    }
                };

                let envelope = EventEnvelope::new(
                    message.tenant_id.clone(),
                    channel.clone(),
                    Utc::now(),
                    message,
                );
                if tx.send(envelope).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}
