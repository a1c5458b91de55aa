use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use marketing_core::{AppId, CampaignId, Entity, RewardId, TaskId, TenantId};

use crate::config::{ConfigError, json_kind, numeric_value, parse_object};

/// Lifecycle of a task definition. Only `Active` tasks are listed for events.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    #[default]
    Active,
    Paused,
    Ended,
}

/// A task definition, read-only to the issuance engine.
///
/// `trigger_config` and `condition_config` are the raw JSON blobs as stored by
/// the catalog; use [`Task::trigger`] / [`Task::condition`] to read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    #[serde(default)]
    pub campaign_id: Option<CampaignId>,
    pub name: String,
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub trigger_config: Option<String>,
    #[serde(default)]
    pub condition_config: Option<String>,
    #[serde(default)]
    pub reward_id: Option<RewardId>,
    /// Completions allowed per user; `0` means unlimited.
    #[serde(default)]
    pub max_count: u32,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        tenant_id: TenantId,
        app_id: AppId,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            app_id,
            campaign_id: None,
            name: name.into(),
            task_type: String::new(),
            trigger_config: None,
            condition_config: None,
            reward_id: None,
            max_count: 0,
            status: TaskStatus::Active,
            start_time: None,
            end_time: None,
        }
    }

    /// `ACTIVE` and `start_time <= now <= end_time` (open bounds when unset).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        if self.status != TaskStatus::Active {
            return false;
        }
        if self.start_time.is_some_and(|start| now < start) {
            return false;
        }
        if self.end_time.is_some_and(|end| now > end) {
            return false;
        }
        true
    }

    /// True when `completed` completions already exhaust the per-user cap.
    pub fn cap_reached(&self, completed: u64) -> bool {
        self.max_count > 0 && completed >= u64::from(self.max_count)
    }

    pub fn trigger(&self) -> Result<Option<TriggerConfig>, ConfigError> {
        match self.trigger_config.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => TriggerConfig::parse(raw).map(Some),
        }
    }

    pub fn condition(&self) -> Result<Option<ConditionConfig>, ConfigError> {
        match self.condition_config.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => ConditionConfig::parse(raw).map(Some),
        }
    }
}

impl Entity for Task {
    type Id = TaskId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// `{ "event": "ORDER_PAID" }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub event: Option<String>,
}

impl TriggerConfig {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let object = parse_object(raw)?;
        match object.get("event") {
            None | Some(JsonValue::Null) => Ok(Self { event: None }),
            Some(JsonValue::String(s)) => Ok(Self {
                event: Some(s.clone()),
            }),
            Some(other) => Err(ConfigError::Invalid(format!(
                "trigger `event` must be a string, got {}",
                json_kind(other)
            ))),
        }
    }

    /// A trigger without an `event` never matches.
    pub fn matches(&self, event_type: &str) -> bool {
        self.event.as_deref() == Some(event_type)
    }
}

/// Comparison applied as `event_data[type] <op> value`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "<")]
    Lt,
}

impl ComparisonOperator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            ">=" => Some(Self::Gte),
            ">" => Some(Self::Gt),
            "==" => Some(Self::Eq),
            "<=" => Some(Self::Lte),
            "<" => Some(Self::Lt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gte => ">=",
            Self::Gt => ">",
            Self::Eq => "==",
            Self::Lte => "<=",
            Self::Lt => "<",
        }
    }

    pub fn compare(&self, left: f64, right: f64) -> bool {
        match self {
            Self::Gte => left >= right,
            Self::Gt => left > right,
            Self::Eq => left == right,
            Self::Lte => left <= right,
            Self::Lt => left < right,
        }
    }
}

impl core::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{ "type": "order_amount", "operator": ">=", "value": 100 }`
///
/// `operator` is `None` when the stored operator is not one of the five
/// supported comparisons; such a condition never completes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionConfig {
    pub kind: String,
    pub operator: Option<ComparisonOperator>,
    pub raw_operator: String,
    pub target: f64,
}

impl ConditionConfig {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let object = parse_object(raw)?;

        let kind = match object.get("type") {
            None | Some(JsonValue::Null) => String::new(),
            Some(JsonValue::String(s)) => s.clone(),
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "condition `type` must be a string, got {}",
                    json_kind(other)
                )));
            }
        };
        let raw_operator = object
            .get("operator")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        let target = object.get("value").and_then(numeric_value).unwrap_or(0.0);

        Ok(Self {
            kind,
            operator: ComparisonOperator::parse(&raw_operator),
            raw_operator,
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task() -> Task {
        Task::new(
            TaskId::new("task-1"),
            TenantId::new("t1"),
            AppId::new("shop"),
            "First order",
        )
    }

    #[test]
    fn active_window_is_inclusive_and_respects_status() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 0, 0, 0).unwrap();
        let mut t = task();
        assert!(t.is_active_at(now));

        t.start_time = Some(now);
        t.end_time = Some(now);
        assert!(t.is_active_at(now));
        assert!(!t.is_active_at(now + Duration::seconds(1)));
        assert!(!t.is_active_at(now - Duration::seconds(1)));

        t.start_time = None;
        t.end_time = None;
        t.status = TaskStatus::Paused;
        assert!(!t.is_active_at(now));
    }

    #[test]
    fn zero_max_count_is_unlimited() {
        let mut t = task();
        assert!(!t.cap_reached(1_000));
        t.max_count = 2;
        assert!(!t.cap_reached(1));
        assert!(t.cap_reached(2));
        assert!(t.cap_reached(3));
    }

    #[test]
    fn trigger_without_event_never_matches() {
        let cfg = TriggerConfig::parse("{}").unwrap();
        assert!(!cfg.matches("ORDER_PAID"));

        let cfg = TriggerConfig::parse(r#"{"event":"ORDER_PAID"}"#).unwrap();
        assert!(cfg.matches("ORDER_PAID"));
        assert!(!cfg.matches("USER_SIGN_IN"));

        assert!(TriggerConfig::parse(r#"{"event":7}"#).is_err());
    }

    #[test]
    fn condition_accepts_string_targets_and_flags_unknown_operators() {
        let cfg =
            ConditionConfig::parse(r#"{"type":"order_amount","operator":">=","value":"100"}"#)
                .unwrap();
        assert_eq!(cfg.kind, "order_amount");
        assert_eq!(cfg.operator, Some(ComparisonOperator::Gte));
        assert_eq!(cfg.target, 100.0);

        let cfg = ConditionConfig::parse(r#"{"type":"x","operator":"!=","value":1}"#).unwrap();
        assert_eq!(cfg.operator, None);
        assert_eq!(cfg.raw_operator, "!=");
    }

    #[test]
    fn blank_configs_on_task_read_as_absent() {
        let mut t = task();
        t.trigger_config = Some("   ".to_string());
        assert_eq!(t.trigger().unwrap(), None);
        assert_eq!(t.condition().unwrap(), None);

        t.condition_config = Some("{oops".to_string());
        assert!(matches!(t.condition(), Err(ConfigError::Malformed(_))));
    }

    #[test]
    fn operators_compare_as_written() {
        assert!(ComparisonOperator::Gte.compare(100.0, 100.0));
        assert!(!ComparisonOperator::Gt.compare(100.0, 100.0));
        assert!(ComparisonOperator::Eq.compare(3.0, 3.0));
        assert!(ComparisonOperator::Lte.compare(2.0, 3.0));
        assert!(!ComparisonOperator::Lt.compare(3.0, 3.0));
    }

    #[test]
    fn task_deserializes_from_catalog_json_with_defaults() {
        let t: Task = serde_json::from_value(serde_json::json!({
            "id": "task-9",
            "tenant_id": "t1",
            "app_id": "shop",
            "name": "Sign in",
            "trigger_config": "{\"event\":\"USER_SIGN_IN\"}"
        }))
        .unwrap();
        assert_eq!(t.status, TaskStatus::Active);
        assert_eq!(t.max_count, 0);
        assert!(t.trigger().unwrap().unwrap().matches("USER_SIGN_IN"));
    }
}
