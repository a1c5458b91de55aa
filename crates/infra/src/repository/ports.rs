use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use marketing_core::{
    AppId, CampaignId, CompletionId, GrantId, ReservationId, RewardId, TaskId, TenantId, UserId,
};
use marketing_rewards::{
    Campaign, GrantStatus, InventoryReservation, ReservationStatus, Reward, RewardGrant, Task,
    TaskCompletionLog,
};

/// Store-level failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Task catalog (read path used by the engine, write path used for seeding).
#[async_trait::async_trait]
pub trait TaskRepository: Send + Sync {
    /// Tasks for `(tenant, app)` that are `ACTIVE` and inside their window at `now`,
    /// in catalog order.
    async fn list_active(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Task>>;

    async fn get(&self, task_id: &TaskId) -> RepositoryResult<Option<Task>>;

    async fn upsert(&self, task: Task) -> RepositoryResult<()>;
}

/// Reward templates.
#[async_trait::async_trait]
pub trait RewardRepository: Send + Sync {
    async fn get(&self, reward_id: &RewardId) -> RepositoryResult<Option<Reward>>;

    /// Insert or replace a template. Replacing an existing template stores it
    /// with `version = previous + 1`; the stored value is returned.
    async fn upsert(&self, reward: Reward) -> RepositoryResult<Reward>;
}

#[async_trait::async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn get(&self, campaign_id: &CampaignId) -> RepositoryResult<Option<Campaign>>;

    async fn upsert(&self, campaign: Campaign) -> RepositoryResult<()>;
}

/// Append-only completion audit trail (plus the `grant_id` back-fill).
#[async_trait::async_trait]
pub trait CompletionLogRepository: Send + Sync {
    /// Insert a new row; an existing `completion_id` is a conflict.
    async fn save(&self, log: &TaskCompletionLog) -> RepositoryResult<()>;

    /// Replace an existing row.
    async fn update(&self, log: &TaskCompletionLog) -> RepositoryResult<()>;

    async fn get(&self, completion_id: CompletionId)
    -> RepositoryResult<Option<TaskCompletionLog>>;

    /// Completions of `task` by `user`; the per-user cap counter.
    async fn count_by_task_and_user(&self, task_id: &TaskId, user_id: UserId)
    -> RepositoryResult<u64>;

    async fn count_by_task(
        &self,
        task_id: &TaskId,
        campaign_id: Option<&CampaignId>,
    ) -> RepositoryResult<u64>;

    async fn count_unique_users_by_task(
        &self,
        task_id: &TaskId,
        campaign_id: Option<&CampaignId>,
    ) -> RepositoryResult<u64>;

    /// A user's completions within a tenant, oldest first.
    async fn list_by_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<TaskCompletionLog>>;
}

/// The issuance ledger.
#[async_trait::async_trait]
pub trait GrantRepository: Send + Sync {
    async fn create(&self, grant: &RewardGrant) -> RepositoryResult<()>;

    async fn update(&self, grant: &RewardGrant) -> RepositoryResult<()>;

    async fn get(&self, grant_id: GrantId) -> RepositoryResult<Option<RewardGrant>>;

    /// Grants of `reward` in `status`, optionally narrowed to one user.
    async fn count_by_status(
        &self,
        reward_id: &RewardId,
        user_id: Option<UserId>,
        status: GrantStatus,
    ) -> RepositoryResult<u64>;

    async fn list_by_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<RewardGrant>>;
}

/// Filter for [`ReservationRepository::list`]; `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationFilter {
    pub resource_id: Option<String>,
    pub campaign_id: Option<CampaignId>,
    pub user_id: Option<UserId>,
    pub status: Option<ReservationStatus>,
}

impl ReservationFilter {
    pub fn matches(&self, reservation: &InventoryReservation) -> bool {
        self.resource_id
            .as_deref()
            .is_none_or(|r| reservation.resource_id() == r)
            && self
                .campaign_id
                .as_ref()
                .is_none_or(|c| reservation.campaign_id() == Some(c))
            && self.user_id.is_none_or(|u| reservation.user_id() == u)
            && self.status.is_none_or(|s| reservation.status() == s)
    }
}

#[async_trait::async_trait]
pub trait ReservationRepository: Send + Sync {
    async fn save(&self, reservation: &InventoryReservation) -> RepositoryResult<()>;

    async fn update(&self, reservation: &InventoryReservation) -> RepositoryResult<()>;

    async fn get(
        &self,
        reservation_id: ReservationId,
    ) -> RepositoryResult<Option<InventoryReservation>>;

    /// Number of `PENDING` holds against `resource_id`.
    async fn count_pending_by_resource(&self, resource_id: &str) -> RepositoryResult<u64>;

    /// Move every `PENDING` hold whose `expire_at` is before `now` to `EXPIRED`.
    /// Returns how many rows changed.
    async fn expire_stale(&self, now: DateTime<Utc>) -> RepositoryResult<u64>;

    /// Matching holds, oldest first.
    async fn list(&self, filter: &ReservationFilter) -> RepositoryResult<Vec<InventoryReservation>>;
}
