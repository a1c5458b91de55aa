use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use marketing_core::{AppId, Entity, RewardId, TenantId};

use crate::config::{ConfigError, StrategyConfig, ValidatorConfig};

/// Well-known `reward_type` tags.
pub mod reward_type {
    pub const COUPON: &str = "COUPON";
    pub const POINTS: &str = "POINTS";
    pub const REDEEM_CODE: &str = "REDEEM_CODE";
    pub const SUBSCRIPTION: &str = "SUBSCRIPTION";
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardStatus {
    #[default]
    Active,
    Paused,
    Ended,
}

/// Reward template.
///
/// Grants copy `content_config` (through a generator) and `version` at issuance
/// time; later edits to the template never reach existing grants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub id: RewardId,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub reward_type: String,
    pub name: String,
    #[serde(default)]
    pub content_config: JsonValue,
    #[serde(default)]
    pub generator_config: Option<String>,
    #[serde(default)]
    pub distributor_config: Option<String>,
    #[serde(default)]
    pub validator_config: Option<String>,
    #[serde(default = "first_version")]
    pub version: u32,
    /// Days a grant stays usable after issuance; `0` means no expiry.
    #[serde(default)]
    pub valid_days: u32,
    #[serde(default)]
    pub status: RewardStatus,
    #[serde(default)]
    pub description: String,
}

fn first_version() -> u32 {
    1
}

impl Reward {
    pub fn new(
        id: RewardId,
        tenant_id: TenantId,
        app_id: AppId,
        reward_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            app_id,
            reward_type: reward_type.into(),
            name: name.into(),
            content_config: JsonValue::Object(Default::default()),
            generator_config: None,
            distributor_config: None,
            validator_config: None,
            version: first_version(),
            valid_days: 0,
            status: RewardStatus::Active,
            description: String::new(),
        }
    }

    /// Expiry for a grant issued at `issued_at`, if the template sets `valid_days`.
    pub fn expire_time(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (self.valid_days > 0).then(|| issued_at + Duration::days(i64::from(self.valid_days)))
    }

    pub fn validators(&self) -> Result<Option<ValidatorConfig>, ConfigError> {
        ValidatorConfig::parse_optional(self.validator_config.as_deref())
    }

    pub fn generator(&self) -> Result<Option<StrategyConfig>, ConfigError> {
        StrategyConfig::parse_optional(self.generator_config.as_deref())
    }

    pub fn distributor(&self) -> Result<Option<StrategyConfig>, ConfigError> {
        StrategyConfig::parse_optional(self.distributor_config.as_deref())
    }

    /// Record an edit of the template.
    pub fn bump_version(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}

impl Entity for Reward {
    type Id = RewardId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
