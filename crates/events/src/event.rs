use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use marketing_core::{AppId, CampaignId, TenantId, UserId};

/// A business event.
///
/// Events are facts: immutable once built, tenant-scoped, and time-stamped with
/// business time.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Event name (e.g. "ORDER_PAID").
    fn event_type(&self) -> &str;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Inbound domain event that may complete one or more tasks.
///
/// Transient: the engine never persists it, only derives completion logs and
/// grants from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_type: String,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    #[serde(default)]
    pub event_data: Map<String, JsonValue>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskEvent {
    pub fn new(
        event_type: impl Into<String>,
        user_id: UserId,
        tenant_id: TenantId,
        app_id: AppId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            user_id,
            tenant_id,
            app_id,
            campaign_id: None,
            campaign_name: None,
            event_data: Map::new(),
            timestamp,
        }
    }

    pub fn with_campaign(mut self, campaign_id: CampaignId, campaign_name: Option<String>) -> Self {
        self.campaign_id = Some(campaign_id);
        self.campaign_name = campaign_name;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.event_data.insert(key.into(), value.into());
        self
    }
}

impl Event for TaskEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Completion announcement published to the message broker.
///
/// Mirrors the inbound event; `timestamp` is rendered as RFC 3339 so consumers
/// in other stacks can parse it without a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletedMessage {
    pub event_type: String,
    pub user_id: UserId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_name: Option<String>,
    pub event_data: Map<String, JsonValue>,
    pub timestamp: String,
}

impl From<&TaskEvent> for TaskCompletedMessage {
    fn from(event: &TaskEvent) -> Self {
        Self {
            event_type: event.event_type.clone(),
            user_id: event.user_id,
            tenant_id: event.tenant_id.clone(),
            app_id: event.app_id.clone(),
            campaign_id: event.campaign_id.clone(),
            campaign_name: event.campaign_name.clone(),
            event_data: event.event_data.clone(),
            timestamp: event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
