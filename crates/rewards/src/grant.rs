//! The reward grant ledger entry and its state machine.
//!
//! ```text
//! GENERATED --distribute ok--> DISTRIBUTED --use--> USED
//!     |  ^
//!     +--+ distribute failed (error_message set, retriable)
//! ```
//!
//! `PENDING` and `RESERVED` exist for ledger compatibility; the engine creates
//! grants directly in `GENERATED`. `EXPIRED` is reachable from any unused state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use marketing_core::{
    AppId, CampaignId, DomainError, DomainResult, Entity, GrantId, ReservationId, RewardId, TaskId,
    TenantId, UserId,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GrantStatus {
    Pending,
    Generated,
    Reserved,
    Distributed,
    Used,
    Expired,
}

impl GrantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantStatus::Pending => "PENDING",
            GrantStatus::Generated => "GENERATED",
            GrantStatus::Reserved => "RESERVED",
            GrantStatus::Distributed => "DISTRIBUTED",
            GrantStatus::Used => "USED",
            GrantStatus::Expired => "EXPIRED",
        }
    }
}

impl core::fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything captured at issuance time.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGrant {
    pub reward_id: RewardId,
    pub reward_name: String,
    pub reward_type: String,
    pub reward_version: u32,
    pub content_snapshot: String,
    pub generator_config: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub campaign_name: Option<String>,
    pub task_id: TaskId,
    pub task_name: String,
    pub tenant_id: TenantId,
    pub app_id: AppId,
    pub user_id: UserId,
    /// Inventory hold taken for this grant, if the reward is capped.
    pub reservation_id: Option<ReservationId>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub expire_time: Option<DateTime<Utc>>,
}

/// One reward issued to one user for one task completion.
///
/// `reward_version` and `content_snapshot` are fixed at construction and have
/// no setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardGrant {
    grant_id: GrantId,
    reward_id: RewardId,
    reward_name: String,
    reward_type: String,
    reward_version: u32,
    content_snapshot: String,
    generator_config: Option<String>,
    campaign_id: Option<CampaignId>,
    campaign_name: Option<String>,
    task_id: TaskId,
    task_name: String,
    tenant_id: TenantId,
    app_id: AppId,
    user_id: UserId,
    status: GrantStatus,
    #[serde(default)]
    reservation_id: Option<ReservationId>,
    reserved_at: Option<DateTime<Utc>>,
    distributed_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
    expire_time: Option<DateTime<Utc>>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RewardGrant {
    /// A freshly generated grant, not yet handed to a distributor.
    pub fn generated(grant_id: GrantId, new: NewGrant, now: DateTime<Utc>) -> Self {
        Self {
            grant_id,
            reward_id: new.reward_id,
            reward_name: new.reward_name,
            reward_type: new.reward_type,
            reward_version: new.reward_version,
            content_snapshot: new.content_snapshot,
            generator_config: new.generator_config,
            campaign_id: new.campaign_id,
            campaign_name: new.campaign_name,
            task_id: new.task_id,
            task_name: new.task_name,
            tenant_id: new.tenant_id,
            app_id: new.app_id,
            user_id: new.user_id,
            status: GrantStatus::Generated,
            reservation_id: new.reservation_id,
            reserved_at: new.reserved_at,
            distributed_at: None,
            used_at: None,
            expire_time: new.expire_time,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn grant_id(&self) -> GrantId {
        self.grant_id
    }

    pub fn reward_id(&self) -> &RewardId {
        &self.reward_id
    }

    pub fn reward_name(&self) -> &str {
        &self.reward_name
    }

    pub fn reward_type(&self) -> &str {
        &self.reward_type
    }

    pub fn reward_version(&self) -> u32 {
        self.reward_version
    }

    pub fn content_snapshot(&self) -> &str {
        &self.content_snapshot
    }

    pub fn generator_config(&self) -> Option<&str> {
        self.generator_config.as_deref()
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.campaign_id.as_ref()
    }

    pub fn campaign_name(&self) -> Option<&str> {
        self.campaign_name.as_deref()
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn app_id(&self) -> &AppId {
        &self.app_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn status(&self) -> GrantStatus {
        self.status
    }

    pub fn reservation_id(&self) -> Option<ReservationId> {
        self.reservation_id
    }

    pub fn reserved_at(&self) -> Option<DateTime<Utc>> {
        self.reserved_at
    }

    pub fn distributed_at(&self) -> Option<DateTime<Utc>> {
        self.distributed_at
    }

    pub fn used_at(&self) -> Option<DateTime<Utc>> {
        self.used_at
    }

    pub fn expire_time(&self) -> Option<DateTime<Utc>> {
        self.expire_time
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// A generated grant whose last delivery attempt failed.
    pub fn is_retriable(&self) -> bool {
        self.status == GrantStatus::Generated && self.error_message.is_some()
    }

    /// Distribution failed: keep `GENERATED`, remember why.
    pub fn record_distribution_failure(
        &mut self,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != GrantStatus::Generated {
            return Err(DomainError::invalid_transition(format!(
                "cannot record a distribution failure on a {} grant",
                self.status
            )));
        }
        self.error_message = Some(message.into());
        self.updated_at = now;
        Ok(())
    }

    /// `GENERATED -> DISTRIBUTED`.
    ///
    /// Returns `Ok(false)` when the grant is already distributed, so retries are
    /// safe and the transition happens exactly once.
    pub fn mark_distributed(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.status {
            GrantStatus::Generated => {
                self.status = GrantStatus::Distributed;
                self.distributed_at = Some(now);
                self.error_message = None;
                self.updated_at = now;
                Ok(true)
            }
            GrantStatus::Distributed => Ok(false),
            other => Err(DomainError::invalid_transition(format!(
                "cannot distribute a {other} grant"
            ))),
        }
    }

    /// `DISTRIBUTED -> USED`.
    pub fn mark_used(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != GrantStatus::Distributed {
            return Err(DomainError::invalid_transition(format!(
                "cannot use a {} grant",
                self.status
            )));
        }
        if let Some(expired_at) = self.expire_time.filter(|t| now > *t) {
            return Err(DomainError::Expired(expired_at));
        }
        self.status = GrantStatus::Used;
        self.used_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Retire an unused grant. Already expired grants are left as they are.
    pub fn expire(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.status {
            GrantStatus::Expired => Ok(()),
            GrantStatus::Used => Err(DomainError::invalid_transition(
                "cannot expire a used grant",
            )),
            _ => {
                self.status = GrantStatus::Expired;
                self.updated_at = now;
                Ok(())
            }
        }
    }
}

impl Entity for RewardGrant {
    type Id = GrantId;

    fn id(&self) -> &Self::Id {
        &self.grant_id
    }
}
