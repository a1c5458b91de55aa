//! In-memory repositories for tests/dev.
//!
//! Each store is a `RwLock` around plain collections. Insertion order is kept
//! where callers depend on it (task listing, completion and hold listings).

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use marketing_core::{
    AppId, CampaignId, CompletionId, GrantId, ReservationId, RewardId, TaskId, TenantId, UserId,
};
use marketing_rewards::{
    Campaign, GrantStatus, InventoryReservation, Reward, RewardGrant, Task, TaskCompletionLog,
};

use super::ports::{
    CampaignRepository, CompletionLogRepository, GrantRepository, RepositoryError,
    RepositoryResult, ReservationFilter, ReservationRepository, RewardRepository,
    TaskRepository,
};

fn poisoned<T>(_: PoisonError<T>) -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<Vec<Task>>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn list_active(
        &self,
        tenant_id: &TenantId,
        app_id: &AppId,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Task>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        Ok(tasks
            .iter()
            .filter(|t| &t.tenant_id == tenant_id && &t.app_id == app_id && t.is_active_at(now))
            .cloned()
            .collect())
    }

    async fn get(&self, task_id: &TaskId) -> RepositoryResult<Option<Task>> {
        let tasks = self.tasks.read().map_err(poisoned)?;
        Ok(tasks.iter().find(|t| &t.id == task_id).cloned())
    }

    async fn upsert(&self, task: Task) -> RepositoryResult<()> {
        let mut tasks = self.tasks.write().map_err(poisoned)?;
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => tasks.push(task),
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRewardRepository {
    rewards: RwLock<HashMap<RewardId, Reward>>,
}

impl InMemoryRewardRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RewardRepository for InMemoryRewardRepository {
    async fn get(&self, reward_id: &RewardId) -> RepositoryResult<Option<Reward>> {
        let rewards = self.rewards.read().map_err(poisoned)?;
        Ok(rewards.get(reward_id).cloned())
    }

    async fn upsert(&self, mut reward: Reward) -> RepositoryResult<Reward> {
        let mut rewards = self.rewards.write().map_err(poisoned)?;
        if let Some(previous) = rewards.get(&reward.id) {
            reward.version = previous.version;
            reward.bump_version();
        }
        rewards.insert(reward.id.clone(), reward.clone());
        Ok(reward)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCampaignRepository {
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
}

impl InMemoryCampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl CampaignRepository for InMemoryCampaignRepository {
    async fn get(&self, campaign_id: &CampaignId) -> RepositoryResult<Option<Campaign>> {
        let campaigns = self.campaigns.read().map_err(poisoned)?;
        Ok(campaigns.get(campaign_id).cloned())
    }

    async fn upsert(&self, campaign: Campaign) -> RepositoryResult<()> {
        let mut campaigns = self.campaigns.write().map_err(poisoned)?;
        campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCompletionLogRepository {
    logs: RwLock<Vec<TaskCompletionLog>>,
}

impl InMemoryCompletionLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored row, oldest first.
    pub fn snapshot(&self) -> Vec<TaskCompletionLog> {
        self.logs.read().map(|l| l.clone()).unwrap_or_default()
    }
}

fn same_campaign(log: &TaskCompletionLog, campaign_id: Option<&CampaignId>) -> bool {
    campaign_id.is_none_or(|c| log.campaign_id() == Some(c))
}

#[async_trait::async_trait]
impl CompletionLogRepository for InMemoryCompletionLogRepository {
    async fn save(&self, log: &TaskCompletionLog) -> RepositoryResult<()> {
        let mut logs = self.logs.write().map_err(poisoned)?;
        if logs.iter().any(|l| l.completion_id() == log.completion_id()) {
            return Err(RepositoryError::Conflict(format!(
                "completion {} already recorded",
                log.completion_id()
            )));
        }
        logs.push(log.clone());
        Ok(())
    }

    async fn update(&self, log: &TaskCompletionLog) -> RepositoryResult<()> {
        let mut logs = self.logs.write().map_err(poisoned)?;
        let slot = logs
            .iter_mut()
            .find(|l| l.completion_id() == log.completion_id())
            .ok_or_else(|| RepositoryError::not_found("completion", log.completion_id()))?;
        *slot = log.clone();
        Ok(())
    }

    async fn get(
        &self,
        completion_id: CompletionId,
    ) -> RepositoryResult<Option<TaskCompletionLog>> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs
            .iter()
            .find(|l| l.completion_id() == completion_id)
            .cloned())
    }

    async fn count_by_task_and_user(
        &self,
        task_id: &TaskId,
        user_id: UserId,
    ) -> RepositoryResult<u64> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs
            .iter()
            .filter(|l| l.task_id() == task_id && l.user_id() == user_id)
            .count() as u64)
    }

    async fn count_by_task(
        &self,
        task_id: &TaskId,
        campaign_id: Option<&CampaignId>,
    ) -> RepositoryResult<u64> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs
            .iter()
            .filter(|l| l.task_id() == task_id && same_campaign(l, campaign_id))
            .count() as u64)
    }

    async fn count_unique_users_by_task(
        &self,
        task_id: &TaskId,
        campaign_id: Option<&CampaignId>,
    ) -> RepositoryResult<u64> {
        let logs = self.logs.read().map_err(poisoned)?;
        let users: HashSet<UserId> = logs
            .iter()
            .filter(|l| l.task_id() == task_id && same_campaign(l, campaign_id))
            .map(TaskCompletionLog::user_id)
            .collect();
        Ok(users.len() as u64)
    }

    async fn list_by_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<TaskCompletionLog>> {
        let logs = self.logs.read().map_err(poisoned)?;
        Ok(logs
            .iter()
            .filter(|l| l.tenant_id() == tenant_id && l.user_id() == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryGrantRepository {
    grants: RwLock<HashMap<GrantId, RewardGrant>>,
}

impl InMemoryGrantRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored grant, oldest first.
    pub fn snapshot(&self) -> Vec<RewardGrant> {
        let mut grants: Vec<RewardGrant> = self
            .grants
            .read()
            .map(|g| g.values().cloned().collect())
            .unwrap_or_default();
        grants.sort_by_key(|g| (g.created_at(), g.grant_id()));
        grants
    }
}

#[async_trait::async_trait]
impl GrantRepository for InMemoryGrantRepository {
    async fn create(&self, grant: &RewardGrant) -> RepositoryResult<()> {
        let mut grants = self.grants.write().map_err(poisoned)?;
        if grants.contains_key(&grant.grant_id()) {
            return Err(RepositoryError::Conflict(format!(
                "grant {} already exists",
                grant.grant_id()
            )));
        }
        grants.insert(grant.grant_id(), grant.clone());
        Ok(())
    }

    async fn update(&self, grant: &RewardGrant) -> RepositoryResult<()> {
        let mut grants = self.grants.write().map_err(poisoned)?;
        let slot = grants
            .get_mut(&grant.grant_id())
            .ok_or_else(|| RepositoryError::not_found("grant", grant.grant_id()))?;
        *slot = grant.clone();
        Ok(())
    }

    async fn get(&self, grant_id: GrantId) -> RepositoryResult<Option<RewardGrant>> {
        let grants = self.grants.read().map_err(poisoned)?;
        Ok(grants.get(&grant_id).cloned())
    }

    async fn count_by_status(
        &self,
        reward_id: &RewardId,
        user_id: Option<UserId>,
        status: GrantStatus,
    ) -> RepositoryResult<u64> {
        let grants = self.grants.read().map_err(poisoned)?;
        Ok(grants
            .values()
            .filter(|g| {
                g.reward_id() == reward_id
                    && g.status() == status
                    && user_id.is_none_or(|u| g.user_id() == u)
            })
            .count() as u64)
    }

    async fn list_by_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<RewardGrant>> {
        let grants = self.grants.read().map_err(poisoned)?;
        let mut result: Vec<RewardGrant> = grants
            .values()
            .filter(|g| g.tenant_id() == tenant_id && g.user_id() == user_id)
            .cloned()
            .collect();
        result.sort_by_key(|g| (g.created_at(), g.grant_id()));
        Ok(result)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryReservationRepository {
    reservations: RwLock<Vec<InventoryReservation>>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn save(&self, reservation: &InventoryReservation) -> RepositoryResult<()> {
        let mut reservations = self.reservations.write().map_err(poisoned)?;
        if reservations
            .iter()
            .any(|r| r.reservation_id() == reservation.reservation_id())
        {
            return Err(RepositoryError::Conflict(format!(
                "reservation {} already exists",
                reservation.reservation_id()
            )));
        }
        reservations.push(reservation.clone());
        Ok(())
    }

    async fn update(&self, reservation: &InventoryReservation) -> RepositoryResult<()> {
        let mut reservations = self.reservations.write().map_err(poisoned)?;
        let slot = reservations
            .iter_mut()
            .find(|r| r.reservation_id() == reservation.reservation_id())
            .ok_or_else(|| {
                RepositoryError::not_found("reservation", reservation.reservation_id())
            })?;
        *slot = reservation.clone();
        Ok(())
    }

    async fn get(
        &self,
        reservation_id: ReservationId,
    ) -> RepositoryResult<Option<InventoryReservation>> {
        let reservations = self.reservations.read().map_err(poisoned)?;
        Ok(reservations
            .iter()
            .find(|r| r.reservation_id() == reservation_id)
            .cloned())
    }

    async fn count_pending_by_resource(&self, resource_id: &str) -> RepositoryResult<u64> {
        let reservations = self.reservations.read().map_err(poisoned)?;
        Ok(reservations
            .iter()
            .filter(|r| r.resource_id() == resource_id && r.counts_against_capacity())
            .count() as u64)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> RepositoryResult<u64> {
        let mut reservations = self.reservations.write().map_err(poisoned)?;
        let mut expired = 0;
        for reservation in reservations.iter_mut() {
            if reservation.expire(now) {
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn list(
        &self,
        filter: &ReservationFilter,
    ) -> RepositoryResult<Vec<InventoryReservation>> {
        let reservations = self.reservations.read().map_err(poisoned)?;
        Ok(reservations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }
}
