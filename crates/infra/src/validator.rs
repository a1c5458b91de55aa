//! Validator chain: eligibility checks run before anything is reserved or issued.
//!
//! Built-in rules (`TIME`, `USER`, `LIMIT`, `INVENTORY`) are a closed set and
//! dispatched by match. Other tags resolve against validators registered at
//! runtime; a tag nobody registered is logged and treated as a pass.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::warn;

use marketing_core::{AppId, Clock, TenantId, UserId};
use marketing_rewards::{
    Campaign, GrantStatus, InventoryRule, LimitRule, Reward, TimeRule, ValidatorConfig,
    ValidatorRule,
};

use crate::repository::{GrantRepository, RepositoryError, ReservationRepository};

/// A business-rule rejection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("reward not yet available")]
    NotYetAvailable,

    #[error("reward expired")]
    Expired,

    #[error("user limit exceeded ({limit})")]
    UserLimitExceeded { limit: u64 },

    #[error("total limit exceeded ({limit})")]
    TotalLimitExceeded { limit: u64 },

    #[error("inventory exhausted ({max_inventory})")]
    InventoryExhausted { max_inventory: u64 },

    /// Rejection raised by a registered custom validator.
    #[error("{validator}: {reason}")]
    Rejected { validator: String, reason: String },
}

/// Why a chain did not pass: a rejection, or a check that could not run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("validation failed: {0}")]
    Rejected(#[from] ValidationFailure),

    #[error("{validator} validator could not run: {source}")]
    Infrastructure {
        validator: String,
        #[source]
        source: RepositoryError,
    },
}

impl ValidationError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, ValidationError::Rejected(_))
    }

    fn infrastructure(validator: &str, source: RepositoryError) -> Self {
        Self::Infrastructure {
            validator: validator.to_string(),
            source,
        }
    }
}

/// What a validator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    pub reward: &'a Reward,
    pub campaign: Option<&'a Campaign>,
    pub tenant_id: &'a TenantId,
    pub app_id: &'a AppId,
    pub user_id: UserId,
}

/// Pluggable validator for tags outside the built-in set.
#[async_trait::async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        request: &ValidationRequest<'_>,
        params: &Map<String, JsonValue>,
    ) -> Result<(), ValidationError>;
}

pub struct ValidatorChain {
    grants: Arc<dyn GrantRepository>,
    reservations: Arc<dyn ReservationRepository>,
    clock: Arc<dyn Clock>,
    custom: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorChain {
    pub fn new(
        grants: Arc<dyn GrantRepository>,
        reservations: Arc<dyn ReservationRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            grants,
            reservations,
            clock,
            custom: HashMap::new(),
        }
    }

    /// Register a validator for a non-built-in tag. Built-in tags cannot be overridden.
    pub fn register(&mut self, kind: impl Into<String>, validator: Arc<dyn Validator>) {
        self.custom.insert(kind.into(), validator);
    }

    /// Run every rule in order, stopping at the first failure.
    pub async fn validate(
        &self,
        request: &ValidationRequest<'_>,
        config: &ValidatorConfig,
    ) -> Result<(), ValidationError> {
        for rule in config.rules() {
            self.check(request, rule).await?;
        }
        Ok(())
    }

    async fn check(
        &self,
        request: &ValidationRequest<'_>,
        rule: &ValidatorRule,
    ) -> Result<(), ValidationError> {
        match rule {
            ValidatorRule::Time(rule) => self.check_time(rule),
            // Audience eligibility is decided upstream.
            ValidatorRule::User(_) => Ok(()),
            ValidatorRule::Limit(rule) => self.check_limit(request, rule).await,
            ValidatorRule::Inventory(rule) => self.check_inventory(request, rule).await,
            ValidatorRule::Other { kind, params } => match self.custom.get(kind) {
                Some(validator) => validator.validate(request, params).await,
                None => {
                    warn!(
                        validator = %kind,
                        reward_id = %request.reward.id,
                        "unknown validator type; skipping"
                    );
                    Ok(())
                }
            },
        }
    }

    fn check_time(&self, rule: &TimeRule) -> Result<(), ValidationError> {
        let now = self.clock.now();
        if rule.start_time.is_some_and(|start| now < start) {
            return Err(ValidationFailure::NotYetAvailable.into());
        }
        if rule.end_time.is_some_and(|end| now > end) {
            return Err(ValidationFailure::Expired.into());
        }
        Ok(())
    }

    async fn check_limit(
        &self,
        request: &ValidationRequest<'_>,
        rule: &LimitRule,
    ) -> Result<(), ValidationError> {
        let reward_id = &request.reward.id;

        if let Some(limit) = rule.user_limit {
            let issued = self
                .grants
                .count_by_status(reward_id, Some(request.user_id), GrantStatus::Distributed)
                .await
                .map_err(|e| ValidationError::infrastructure("LIMIT", e))?;
            if issued >= limit {
                return Err(ValidationFailure::UserLimitExceeded { limit }.into());
            }
        }

        if let Some(limit) = rule.total_limit {
            let issued = self
                .grants
                .count_by_status(reward_id, None, GrantStatus::Distributed)
                .await
                .map_err(|e| ValidationError::infrastructure("LIMIT", e))?;
            if issued >= limit {
                return Err(ValidationFailure::TotalLimitExceeded { limit }.into());
            }
        }

        Ok(())
    }

    async fn check_inventory(
        &self,
        request: &ValidationRequest<'_>,
        rule: &InventoryRule,
    ) -> Result<(), ValidationError> {
        let Some(max_inventory) = rule.max_inventory else {
            return Ok(());
        };
        let pending = self
            .reservations
            .count_pending_by_resource(request.reward.id.as_str())
            .await
            .map_err(|e| ValidationError::infrastructure("INVENTORY", e))?;
        if pending >= max_inventory {
            return Err(ValidationFailure::InventoryExhausted { max_inventory }.into());
        }
        Ok(())
    }
}
