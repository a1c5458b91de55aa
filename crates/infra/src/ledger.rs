//! Reads over the issuance ledger, plus redemption of distributed grants.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};

use marketing_core::{CampaignId, Clock, DomainError, GrantId, TaskId, TenantId, UserId};
use marketing_rewards::{InventoryReservation, RewardGrant, TaskCompletionLog};

use crate::repository::{RepositoryError, RepositoryResult, ReservationFilter};
use crate::reservation::InventoryReservationManager;
use crate::trigger::Repositories;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("grant {0} not found")]
    NotFound(GrantId),

    /// The grant lapsed before it was used; it is now `EXPIRED`.
    #[error("grant {grant_id} expired at {expired_at}")]
    Expired {
        grant_id: GrantId,
        expired_at: DateTime<Utc>,
    },

    #[error("grant {grant_id} cannot be used: {source}")]
    Rejected {
        grant_id: GrantId,
        #[source]
        source: DomainError,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Completion counters for one task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStats {
    pub task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<CampaignId>,
    pub completions: u64,
    pub unique_users: u64,
}

pub struct RewardLedger {
    repos: Repositories,
    inventory: Arc<InventoryReservationManager>,
    clock: Arc<dyn Clock>,
}

impl RewardLedger {
    pub fn new(
        repos: Repositories,
        inventory: Arc<InventoryReservationManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repos,
            inventory,
            clock,
        }
    }

    /// `DISTRIBUTED -> USED`. A grant past its `expire_time` is retired to
    /// `EXPIRED` instead and reported as [`LedgerError::Expired`].
    #[instrument(skip_all, fields(grant_id = %grant_id), err)]
    pub async fn redeem(&self, grant_id: GrantId) -> Result<RewardGrant, LedgerError> {
        let mut grant = self
            .repos
            .grants
            .get(grant_id)
            .await?
            .ok_or(LedgerError::NotFound(grant_id))?;

        let now = self.clock.now();
        match grant.mark_used(now) {
            Ok(()) => {
                self.repos.grants.update(&grant).await?;
                info!(user_id = %grant.user_id(), reward_id = %grant.reward_id(), "grant used");
                Ok(grant)
            }
            Err(DomainError::Expired(expired_at)) => {
                grant
                    .expire(now)
                    .map_err(|source| LedgerError::Rejected { grant_id, source })?;
                self.repos.grants.update(&grant).await?;
                info!(user_id = %grant.user_id(), %expired_at, "grant expired before use");
                Err(LedgerError::Expired {
                    grant_id,
                    expired_at,
                })
            }
            Err(source) => Err(LedgerError::Rejected { grant_id, source }),
        }
    }

    /// A user's grants within a tenant, oldest first.
    pub async fn grants_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<RewardGrant>> {
        self.repos.grants.list_by_user(tenant_id, user_id).await
    }

    /// A user's completions within a tenant, oldest first.
    pub async fn completions_for_user(
        &self,
        tenant_id: &TenantId,
        user_id: UserId,
    ) -> RepositoryResult<Vec<TaskCompletionLog>> {
        self.repos.completions.list_by_user(tenant_id, user_id).await
    }

    pub async fn task_stats(
        &self,
        task_id: &TaskId,
        campaign_id: Option<&CampaignId>,
    ) -> RepositoryResult<TaskStats> {
        let completions = self.repos.completions.count_by_task(task_id, campaign_id).await?;
        let unique_users = self
            .repos
            .completions
            .count_unique_users_by_task(task_id, campaign_id)
            .await?;
        Ok(TaskStats {
            task_id: task_id.clone(),
            campaign_id: campaign_id.cloned(),
            completions,
            unique_users,
        })
    }

    pub async fn reservations(
        &self,
        filter: &ReservationFilter,
    ) -> RepositoryResult<Vec<InventoryReservation>> {
        self.inventory.list(filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use marketing_core::{AppId, FixedClock, IdSource, RewardId, SequentialIds};
    use marketing_events::TaskEvent;
    use marketing_rewards::{GrantStatus, NewGrant, ReservationStatus, Task};

    struct Fixture {
        clock: Arc<FixedClock>,
        ids: SequentialIds,
        repos: Repositories,
        ledger: RewardLedger,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap(),
        ));
        let ids = SequentialIds::new(clock.clone());
        let repos = Repositories::in_memory();
        let inventory = Arc::new(InventoryReservationManager::new(
            repos.reservations.clone(),
            clock.clone(),
            Arc::new(SequentialIds::new(clock.clone())),
            Duration::minutes(30),
        ));
        let ledger = RewardLedger::new(repos.clone(), inventory, clock.clone());
        Fixture {
            clock,
            ids,
            repos,
            ledger,
        }
    }

    impl Fixture {
        async fn distributed_grant(&self, user: i64, valid_for: Option<Duration>) -> RewardGrant {
            let now = self.clock.now();
            let mut grant = RewardGrant::generated(
                self.ids.grant_id(),
                NewGrant {
                    reward_id: RewardId::new("r-1"),
                    reward_name: "10 off".to_string(),
                    reward_type: "COUPON".to_string(),
                    reward_version: 1,
                    content_snapshot: "{}".to_string(),
                    generator_config: None,
                    campaign_id: None,
                    campaign_name: None,
                    task_id: TaskId::new("task-1"),
                    task_name: "First order".to_string(),
                    tenant_id: TenantId::new("t1"),
                    app_id: AppId::new("shop"),
                    user_id: UserId::new(user),
                    reservation_id: None,
                    reserved_at: None,
                    expire_time: valid_for.map(|d| now + d),
                },
                now,
            );
            grant.mark_distributed(now).unwrap();
            self.repos.grants.create(&grant).await.unwrap();
            grant
        }

        async fn complete(&self, task: &str, user: i64, campaign: Option<&str>) {
            let mut task = Task::new(
                TaskId::new(task),
                TenantId::new("t1"),
                AppId::new("shop"),
                "task",
            );
            task.campaign_id = campaign.map(CampaignId::new);
            let event = TaskEvent::new(
                "ORDER_PAID",
                UserId::new(user),
                TenantId::new("t1"),
                AppId::new("shop"),
                self.clock.now(),
            );
            let log = TaskCompletionLog::record(
                self.ids.completion_id(),
                &task,
                &event,
                None,
                self.clock.now(),
            );
            self.repos.completions.save(&log).await.unwrap();
        }
    }

    #[tokio::test]
    async fn redeem_marks_a_distributed_grant_used_once() {
        let f = fixture();
        let grant = f.distributed_grant(42, Some(Duration::days(7))).await;

        f.clock.advance(Duration::hours(1));
        let used = f.ledger.redeem(grant.grant_id()).await.unwrap();
        assert_eq!(used.status(), GrantStatus::Used);
        assert_eq!(used.used_at(), Some(f.clock.now()));

        let stored = f.repos.grants.get(grant.grant_id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), GrantStatus::Used);

        assert!(matches!(
            f.ledger.redeem(grant.grant_id()).await,
            Err(LedgerError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn redeeming_past_expiry_retires_the_grant() {
        let f = fixture();
        let grant = f.distributed_grant(42, Some(Duration::days(1))).await;
        let expired_at = f.clock.now() + Duration::days(1);

        f.clock.advance(Duration::days(2));
        assert_eq!(
            f.ledger.redeem(grant.grant_id()).await.unwrap_err(),
            LedgerError::Expired {
                grant_id: grant.grant_id(),
                expired_at,
            }
        );
        let stored = f.repos.grants.get(grant.grant_id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), GrantStatus::Expired);
    }

    #[tokio::test]
    async fn redeem_of_unknown_grant_is_not_found() {
        let f = fixture();
        let missing = f.ids.grant_id();
        assert_eq!(
            f.ledger.redeem(missing).await.unwrap_err(),
            LedgerError::NotFound(missing)
        );
    }

    #[tokio::test]
    async fn user_history_is_scoped_to_tenant_and_user() {
        let f = fixture();
        let first = f.distributed_grant(42, None).await;
        f.clock.advance(Duration::minutes(1));
        let second = f.distributed_grant(42, None).await;
        f.distributed_grant(7, None).await;
        f.complete("task-1", 42, None).await;
        f.complete("task-1", 7, None).await;

        let grants = f
            .ledger
            .grants_for_user(&TenantId::new("t1"), UserId::new(42))
            .await
            .unwrap();
        let ids: Vec<_> = grants.iter().map(RewardGrant::grant_id).collect();
        assert_eq!(ids, vec![first.grant_id(), second.grant_id()]);

        let completions = f
            .ledger
            .completions_for_user(&TenantId::new("t1"), UserId::new(42))
            .await
            .unwrap();
        assert_eq!(completions.len(), 1);

        assert!(f
            .ledger
            .grants_for_user(&TenantId::new("t2"), UserId::new(42))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn task_stats_count_completions_and_distinct_users() {
        let f = fixture();
        f.complete("task-1", 1, Some("spring")).await;
        f.complete("task-1", 1, Some("spring")).await;
        f.complete("task-1", 2, None).await;
        f.complete("task-2", 3, None).await;

        let all = f.ledger.task_stats(&TaskId::new("task-1"), None).await.unwrap();
        assert_eq!((all.completions, all.unique_users), (3, 2));

        let spring = CampaignId::new("spring");
        let scoped = f
            .ledger
            .task_stats(&TaskId::new("task-1"), Some(&spring))
            .await
            .unwrap();
        assert_eq!((scoped.completions, scoped.unique_users), (2, 1));
        assert_eq!(scoped.campaign_id, Some(spring));
    }

    #[tokio::test]
    async fn reservations_are_listed_through_the_filter() {
        let f = fixture();
        let inventory = InventoryReservationManager::new(
            f.repos.reservations.clone(),
            f.clock.clone(),
            Arc::new(SequentialIds::new(f.clock.clone())),
            Duration::minutes(30),
        );
        let held = inventory.reserve("r-1", None, UserId::new(1), 1).await.unwrap();
        let other = inventory.reserve("r-2", None, UserId::new(1), 1).await.unwrap();
        inventory.confirm(other.reservation_id()).await.unwrap();

        let pending = f
            .ledger
            .reservations(&ReservationFilter {
                user_id: Some(UserId::new(1)),
                status: Some(ReservationStatus::Pending),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reservation_id(), held.reservation_id());
    }
}
