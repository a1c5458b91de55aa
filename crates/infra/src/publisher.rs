//! Best-effort announcement of completed tasks.
//!
//! Publishing never fails the caller: a missing broker is a silent no-op and
//! transport errors or timeouts are logged and dropped. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use marketing_core::Clock;
use marketing_events::{BusError, EventBus, EventEnvelope, TaskCompletedMessage, TaskEvent};

pub type CompletionBus = dyn EventBus<EventEnvelope<TaskCompletedMessage>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("publish task aborted: {0}")]
    Join(String),
}

/// What happened to one announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    /// No broker configured.
    Disabled,
    Failed(PublishError),
}

#[derive(Clone)]
pub struct CompletionPublisher {
    bus: Option<Arc<CompletionBus>>,
    topic: String,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl CompletionPublisher {
    pub fn new(
        bus: Arc<CompletionBus>,
        topic: impl Into<String>,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bus: Some(bus),
            topic: topic.into(),
            timeout,
            clock,
        }
    }

    pub fn disabled(clock: Arc<dyn Clock>) -> Self {
        Self {
            bus: None,
            topic: String::new(),
            timeout: Duration::ZERO,
            clock,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.bus.is_some()
    }

    pub async fn publish(&self, event: &TaskEvent) -> PublishOutcome {
        let Some(bus) = self.bus.clone() else {
            debug!(event_type = %event.event_type, "no broker configured; completion not published");
            return PublishOutcome::Disabled;
        };

        let envelope = EventEnvelope::new(
            event.tenant_id.clone(),
            self.topic.clone(),
            self.clock.now(),
            TaskCompletedMessage::from(event),
        );

        match self.send(bus, envelope).await {
            Ok(()) => {
                debug!(
                    topic = %self.topic,
                    event_type = %event.event_type,
                    user_id = %event.user_id,
                    "task completion published"
                );
                PublishOutcome::Published
            }
            Err(e) => {
                warn!(
                    topic = %self.topic,
                    event_type = %event.event_type,
                    user_id = %event.user_id,
                    error = %e,
                    "failed to publish task completion"
                );
                PublishOutcome::Failed(e)
            }
        }
    }

    /// `EventBus::publish` may block on network I/O, so it runs on the
    /// blocking pool. On timeout the blocking call is abandoned, not cancelled.
    async fn send(
        &self,
        bus: Arc<CompletionBus>,
        envelope: EventEnvelope<TaskCompletedMessage>,
    ) -> Result<(), PublishError> {
        let task = tokio::task::spawn_blocking(move || bus.publish(envelope));
        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(PublishError::Timeout(self.timeout)),
            Ok(Err(join)) => Err(PublishError::Join(join.to_string())),
            Ok(Ok(result)) => result.map_err(PublishError::from),
        }
    }
}

impl core::fmt::Debug for CompletionPublisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompletionPublisher")
            .field("enabled", &self.is_enabled())
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .finish()
    }
}
