use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use marketing_core::TenantId;

/// Routing envelope for an outbound message.
///
/// Notes:
/// - `topic` names the broker topic/channel the payload goes to.
/// - `tenant_id` is kept beside the payload so adapters can partition by tenant.
/// - transports put only `payload` on the wire; the envelope is local metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    message_id: Uuid,
    tenant_id: TenantId,
    topic: String,
    published_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        tenant_id: TenantId,
        topic: impl Into<String>,
        published_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7(),
            tenant_id,
            topic: topic.into(),
            published_at,
            payload,
        }
    }

    pub fn message_id(&self) -> Uuid {
        self.message_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.published_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
