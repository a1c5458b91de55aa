//! Typed views over the JSON configuration blobs stored on tasks and rewards.
//!
//! Configs are kept as raw strings on the catalog records and parsed here, once,
//! at the point of use. A malformed blob is a [`ConfigError`]; callers log it
//! and treat the config as absent.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

/// Configuration could not be understood.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Not valid JSON.
    #[error("malformed config json: {0}")]
    Malformed(String),

    /// Valid JSON with the wrong shape.
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub(crate) fn parse_object(raw: &str) -> Result<Map<String, JsonValue>, ConfigError> {
    let value: JsonValue =
        serde_json::from_str(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
    match value {
        JsonValue::Object(map) => Ok(map),
        other => Err(ConfigError::Invalid(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Coerce a JSON scalar into `f64` (numbers and numeric strings).
pub fn numeric_value(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// A `{ "type": "...", ...params }` fragment selecting one strategy.
///
/// Shared by generator and distributor configs; `kind` is `None` when the
/// fragment carries no `type` tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyConfig {
    pub kind: Option<String>,
    pub params: Map<String, JsonValue>,
}

impl StrategyConfig {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        Ok(Self::from_object(parse_object(raw)?))
    }

    /// Parse an optional blob; blank strings count as absent.
    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ConfigError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Self::parse(raw).map(Some),
        }
    }

    pub fn from_object(mut params: Map<String, JsonValue>) -> Self {
        let kind = match params.remove("type") {
            Some(JsonValue::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        };
        Self { kind, params }
    }

    pub fn str_param<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.params
            .get(key)
            .and_then(JsonValue::as_str)
            .unwrap_or(default)
    }

    pub fn f64_param(&self, key: &str, default: f64) -> f64 {
        self.params
            .get(key)
            .and_then(JsonValue::as_f64)
            .unwrap_or(default)
    }
}

/// Absolute availability window for a reward.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRule {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Issuance ceilings counted over `DISTRIBUTED` grants.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LimitRule {
    pub user_limit: Option<u64>,
    pub total_limit: Option<u64>,
}

/// Ceiling on outstanding (`PENDING`) holds for the reward's inventory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InventoryRule {
    pub max_inventory: Option<u64>,
}

/// One entry of a validator chain, keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatorRule {
    Time(TimeRule),
    User(Map<String, JsonValue>),
    Limit(LimitRule),
    Inventory(InventoryRule),
    /// A tag with no built-in meaning; resolved against custom registrations.
    Other {
        kind: String,
        params: Map<String, JsonValue>,
    },
}

impl ValidatorRule {
    pub fn kind(&self) -> &str {
        match self {
            ValidatorRule::Time(_) => "TIME",
            ValidatorRule::User(_) => "USER",
            ValidatorRule::Limit(_) => "LIMIT",
            ValidatorRule::Inventory(_) => "INVENTORY",
            ValidatorRule::Other { kind, .. } => kind,
        }
    }

    fn from_strategy(config: StrategyConfig) -> Option<Self> {
        let kind = config.kind?;
        let params = config.params;
        let rule = match kind.as_str() {
            "TIME" => ValidatorRule::Time(TimeRule {
                start_time: time_param(&params, "start_time"),
                end_time: time_param(&params, "end_time"),
            }),
            "USER" => ValidatorRule::User(params),
            "LIMIT" => ValidatorRule::Limit(LimitRule {
                user_limit: positive_count(&params, "user_limit"),
                total_limit: positive_count(&params, "total_limit"),
            }),
            "INVENTORY" => ValidatorRule::Inventory(InventoryRule {
                max_inventory: positive_count(&params, "max_inventory"),
            }),
            _ => ValidatorRule::Other { kind, params },
        };
        Some(rule)
    }
}

fn time_param(params: &Map<String, JsonValue>, key: &str) -> Option<DateTime<Utc>> {
    let raw = params.get(key)?.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }
    match DateTime::parse_from_rfc3339(raw) {
        Ok(t) => Some(t.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(key, value = raw, error = %e, "ignoring unparsable validator time bound");
            None
        }
    }
}

fn positive_count(params: &Map<String, JsonValue>, key: &str) -> Option<u64> {
    let n = params.get(key).and_then(numeric_value)?;
    (n > 0.0).then(|| n as u64)
}

/// Ordered validator chain parsed from `reward.validator_config`.
///
/// Accepts either a single `{ "type": "TIME", ... }` object or
/// `{ "validators": [ {...}, {...} ] }`. Array entries that are not objects or
/// carry no `type` are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatorConfig {
    rules: Vec<ValidatorRule>,
}

impl ValidatorConfig {
    pub fn new(rules: Vec<ValidatorRule>) -> Self {
        Self { rules }
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut object = parse_object(raw)?;

        let rules = match object.remove("validators") {
            Some(JsonValue::Array(entries)) => entries
                .into_iter()
                .filter_map(|entry| match entry {
                    JsonValue::Object(map) => {
                        ValidatorRule::from_strategy(StrategyConfig::from_object(map))
                    }
                    _ => None,
                })
                .collect(),
            Some(other) => {
                return Err(ConfigError::Invalid(format!(
                    "`validators` must be an array, got {}",
                    json_kind(&other)
                )));
            }
            None => ValidatorRule::from_strategy(StrategyConfig::from_object(object))
                .into_iter()
                .collect(),
        };

        Ok(Self { rules })
    }

    pub fn parse_optional(raw: Option<&str>) -> Result<Option<Self>, ConfigError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Self::parse(raw).map(Some),
        }
    }

    pub fn rules(&self) -> &[ValidatorRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// True when the chain names an `INVENTORY` rule (issuance must hold stock).
    pub fn requires_inventory(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, ValidatorRule::Inventory(_)))
    }
}
