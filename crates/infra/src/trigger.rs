//! `TaskTriggerService`: turns one inbound event into completion logs and grants.
//!
//! Per task: evaluate, check the per-user cap, record the completion, issue the
//! attached reward, announce the completion. Every per-task failure is captured
//! in the returned [`TriggerReport`] and logged; only a failure to list the
//! active tasks aborts the whole call.
//!
//! Issuance runs validate, reserve, generate, persist, distribute, finalize.
//! The only compensation is cancelling the hold when the grant cannot be
//! persisted. A failed delivery leaves the hold `PENDING` and the grant
//! `GENERATED` with its error recorded, ready for [`TaskTriggerService::retry_distribution`].
//!
//! Concurrent calls for the same (task, user) are not serialized: two events at
//! the cap boundary can both pass the cap check.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use marketing_core::{
    CampaignId, Clock, CompletionId, GrantId, IdSource, RandomIds, ReservationId, TaskId,
};
use marketing_events::TaskEvent;
use marketing_rewards::{
    Campaign, ConfigError, Evaluation, GrantStatus, NewGrant, Reward,
    RewardGrant, StrategyConfig, Task, TaskCompletionLog, ValidatorConfig, evaluate,
};

use crate::config::EngineConfig;
use crate::distributor::{DistributionError, DistributorRegistry};
use crate::generator::{GenerationError, GeneratorRegistry};
use crate::notification::NotificationService;
use crate::publisher::{CompletionBus, CompletionPublisher, PublishOutcome};
use crate::repository::{
    CampaignRepository, CompletionLogRepository, GrantRepository, InMemoryCampaignRepository,
    InMemoryCompletionLogRepository, InMemoryGrantRepository, InMemoryReservationRepository,
    InMemoryRewardRepository, InMemoryTaskRepository, RepositoryError, ReservationRepository, RewardRepository, TaskRepository,
};
use crate::reservation::InventoryReservationManager;
use crate::validator::{ValidationError, ValidationRequest, ValidatorChain};

/// Quantity held per issued grant.
const HOLD_QUANTITY: u32 = 1;

/// The stores the engine reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub tasks: Arc<dyn TaskRepository>,
    pub rewards: Arc<dyn RewardRepository>,
    pub campaigns: Arc<dyn CampaignRepository>,
    pub completions: Arc<dyn CompletionLogRepository>,
    pub grants: Arc<dyn GrantRepository>,
    pub reservations: Arc<dyn ReservationRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        Self {
            tasks: Arc::new(InMemoryTaskRepository::new()),
            rewards: Arc::new(InMemoryRewardRepository::new()),
            campaigns: Arc::new(InMemoryCampaignRepository::new()),
            completions: Arc::new(InMemoryCompletionLogRepository::new()),
            grants: Arc::new(InMemoryGrantRepository::new()),
            reservations: Arc::new(InMemoryReservationRepository::new()),
        }
    }
}

/// The only error `trigger_event` returns.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("failed to list active tasks: {0}")]
    ListTasks(#[source] RepositoryError),
}

/// A completion could not be recorded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    #[error("failed to count completions: {0}")]
    Count(#[source] RepositoryError),

    #[error("failed to record completion: {0}")]
    Record(#[source] RepositoryError),
}

/// Why issuing a reward for one (task, user) stopped, by stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IssuanceError {
    #[error("failed to load reward: {0}")]
    RewardLookup(#[source] RepositoryError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to reserve inventory: {0}")]
    Reservation(#[source] RepositoryError),

    #[error("failed to generate reward content: {0}")]
    Generation(#[from] GenerationError),

    /// `compensated` is true when the hold taken for this grant was cancelled.
    #[error("failed to persist grant: {source}")]
    GrantPersistence {
        #[source]
        source: RepositoryError,
        compensated: bool,
    },

    #[error("failed to distribute grant {grant_id}: {source}")]
    Distribution {
        grant_id: GrantId,
        #[source]
        source: DistributionError,
    },

    #[error("failed to finalize grant {grant_id}: {source}")]
    Finalize {
        grant_id: GrantId,
        #[source]
        source: RepositoryError,
    },
}

impl IssuanceError {
    /// Grant left behind by a failure after persistence, if any.
    pub fn grant_id(&self) -> Option<GrantId> {
        match self {
            IssuanceError::Distribution { grant_id, .. } | IssuanceError::Finalize { grant_id, .. } => {
                Some(*grant_id)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    TriggerMismatch,
    ConditionNotMet,
    MaxCountReached { completed: u64, max_count: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// The task carries no reward.
    NoReward,
    /// The task points at a reward that does not exist.
    RewardNotFound,
    Issued {
        grant_id: GrantId,
        reservation_id: Option<ReservationId>,
    },
    Failed(IssuanceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Skipped(SkipReason),
    Completed {
        completion_id: CompletionId,
        issuance: IssuanceOutcome,
        publish: PublishOutcome,
    },
    Failed(CompletionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub outcome: TaskOutcome,
}

/// Per-task results of one `trigger_event` call, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerReport {
    pub tasks: Vec<TaskReport>,
}

impl TriggerReport {
    pub fn completed(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| matches!(t.outcome, TaskOutcome::Completed { .. }))
            .count()
    }

    pub fn issued_grants(&self) -> Vec<GrantId> {
        self.tasks
            .iter()
            .filter_map(|t| match &t.outcome {
                TaskOutcome::Completed {
                    issuance: IssuanceOutcome::Issued { grant_id, .. },
                    ..
                } => Some(*grant_id),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, task_id: &TaskId) -> Option<&TaskOutcome> {
        self.tasks
            .iter()
            .find(|t| &t.task_id == task_id)
            .map(|t| &t.outcome)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("grant {0} not found")]
    NotFound(GrantId),

    #[error("grant {grant_id} is {status} and cannot be redistributed")]
    NotRetriable { grant_id: GrantId, status: GrantStatus },

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("redistribution of grant {grant_id} failed: {source}")]
    Distribution {
        grant_id: GrantId,
        #[source]
        source: DistributionError,
    },
}

pub struct TaskTriggerService {
    repos: Repositories,
    validators: ValidatorChain,
    generators: GeneratorRegistry,
    distributors: DistributorRegistry,
    inventory: Arc<InventoryReservationManager>,
    publisher: CompletionPublisher,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl TaskTriggerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repos: Repositories,
        validators: ValidatorChain,
        generators: GeneratorRegistry,
        distributors: DistributorRegistry,
        inventory: Arc<InventoryReservationManager>,
        publisher: CompletionPublisher,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
    ) -> Self {
        Self {
            repos,
            validators,
            generators,
            distributors,
            inventory,
            publisher,
            clock,
            ids,
        }
    }

    /// Built-in validators, generators and distributors over `repos`.
    pub fn with_defaults(
        repos: Repositories,
        config: &EngineConfig,
        notifications: NotificationService,
        bus: Option<Arc<CompletionBus>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let ids: Arc<dyn IdSource> = Arc::new(RandomIds);
        let validators =
            ValidatorChain::new(repos.grants.clone(), repos.reservations.clone(), clock.clone());
        let inventory = Arc::new(InventoryReservationManager::new(
            repos.reservations.clone(),
            clock.clone(),
            ids.clone(),
            config.reservation_ttl_chrono(),
        ));
        let publisher = match bus {
            Some(bus) => CompletionPublisher::new(
                bus,
                config.publish_topic.clone(),
                config.publish_timeout,
                clock.clone(),
            ),
            None => CompletionPublisher::disabled(clock.clone()),
        };
        Self::new(
            repos,
            validators,
            GeneratorRegistry::from_entropy(),
            DistributorRegistry::new(notifications, config.webhook_timeout),
            inventory,
            publisher,
            clock,
            ids,
        )
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn inventory(&self) -> &Arc<InventoryReservationManager> {
        &self.inventory
    }

    #[instrument(
        skip_all,
        fields(
            tenant_id = %event.tenant_id,
            app_id = %event.app_id,
            user_id = %event.user_id,
            event_type = %event.event_type
        ),
        err
    )]
    pub async fn trigger_event(&self, event: &TaskEvent) -> Result<TriggerReport, TriggerError> {
        let tasks = self
            .repos
            .tasks
            .list_active(&event.tenant_id, &event.app_id, self.clock.now())
            .await
            .map_err(TriggerError::ListTasks)?;

        let mut report = TriggerReport::default();
        for task in &tasks {
            let outcome = self.process_task(task, event).await;
            report.tasks.push(TaskReport {
                task_id: task.id.clone(),
                outcome,
            });
        }

        debug!(
            active_tasks = tasks.len(),
            completed = report.completed(),
            "event processed"
        );
        Ok(report)
    }

    async fn process_task(&self, task: &Task, event: &TaskEvent) -> TaskOutcome {
        let progress = match evaluate(task, event) {
            Evaluation::TriggerMismatch => return TaskOutcome::Skipped(SkipReason::TriggerMismatch),
            Evaluation::Incomplete { .. } => return TaskOutcome::Skipped(SkipReason::ConditionNotMet),
            Evaluation::Completed { progress } => progress,
        };

        let completed = match self
            .repos
            .completions
            .count_by_task_and_user(&task.id, event.user_id)
            .await
        {
            Ok(n) => n,
            Err(e) => {
                error!(task_id = %task.id, user_id = %event.user_id, error = %e, "failed to count task completions");
                return TaskOutcome::Failed(CompletionError::Count(e));
            }
        };
        if task.cap_reached(completed) {
            info!(task_id = %task.id, user_id = %event.user_id, max_count = task.max_count, "task max count reached");
            return TaskOutcome::Skipped(SkipReason::MaxCountReached {
                completed,
                max_count: task.max_count,
            });
        }

        let mut log = TaskCompletionLog::record(
            self.ids.completion_id(),
            task,
            event,
            Some(&progress),
            self.clock.now(),
        );
        if let Err(e) = self.repos.completions.save(&log).await {
            error!(task_id = %task.id, user_id = %event.user_id, error = %e, "failed to record task completion");
            return TaskOutcome::Failed(CompletionError::Record(e));
        }
        info!(
            task_id = %task.id,
            user_id = %event.user_id,
            completion_id = %log.completion_id(),
            "task completed"
        );

        let issuance = match &task.reward_id {
            None => IssuanceOutcome::NoReward,
            Some(_) => match self.issue_reward(task, event, &mut log).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(
                        task_id = %task.id,
                        user_id = %event.user_id,
                        error = %e,
                        "failed to issue reward"
                    );
                    IssuanceOutcome::Failed(e)
                }
            },
        };

        let publish = self.publisher.publish(event).await;

        TaskOutcome::Completed {
            completion_id: log.completion_id(),
            issuance,
            publish,
        }
    }

    async fn issue_reward(
        &self,
        task: &Task,
        event: &TaskEvent,
        log: &mut TaskCompletionLog,
    ) -> Result<IssuanceOutcome, IssuanceError> {
        let Some(reward_id) = &task.reward_id else {
            return Ok(IssuanceOutcome::NoReward);
        };
        let Some(reward) = self
            .repos
            .rewards
            .get(reward_id)
            .await
            .map_err(IssuanceError::RewardLookup)?
        else {
            warn!(task_id = %task.id, reward_id = %reward_id, "task reward not found; nothing issued");
            return Ok(IssuanceOutcome::RewardNotFound);
        };

        let campaign = self.load_campaign(log.campaign_id()).await;

        let validators = match reward.validators() {
            Ok(config) => config.unwrap_or_default(),
            Err(e) => {
                warn!(reward_id = %reward.id, error = %e, "invalid validator config; skipping validation");
                ValidatorConfig::default()
            }
        };
        let request = ValidationRequest {
            reward: &reward,
            campaign: campaign.as_ref(),
            tenant_id: &event.tenant_id,
            app_id: &event.app_id,
            user_id: event.user_id,
        };
        self.validators.validate(&request, &validators).await?;

        let hold = if validators.requires_inventory() {
            let hold = self
                .inventory
                .reserve(
                    reward.id.as_str(),
                    log.campaign_id().cloned(),
                    event.user_id,
                    HOLD_QUANTITY,
                )
                .await
                .map_err(IssuanceError::Reservation)?;
            Some(hold)
        } else {
            None
        };

        // An unconfirmed hold is left to the sweeper.
        let generator_config = strategy_config(&reward, "generator", reward.generator());
        let content = self
            .generators
            .generate(&reward, event.user_id, generator_config.as_ref())?;

        let now = self.clock.now();
        let mut grant = RewardGrant::generated(
            self.ids.grant_id(),
            NewGrant {
                reward_id: reward.id.clone(),
                reward_name: reward.name.clone(),
                reward_type: reward.reward_type.clone(),
                reward_version: reward.version,
                content_snapshot: content,
                generator_config: reward.generator_config.clone(),
                campaign_id: log.campaign_id().cloned(),
                campaign_name: log
                    .campaign_name()
                    .map(str::to_string)
                    .or_else(|| campaign.as_ref().map(|c| c.name.clone())),
                task_id: task.id.clone(),
                task_name: task.name.clone(),
                tenant_id: event.tenant_id.clone(),
                app_id: event.app_id.clone(),
                user_id: event.user_id,
                reservation_id: hold.as_ref().map(|h| h.reservation_id()),
                reserved_at: hold.as_ref().map(|h| h.created_at()),
                expire_time: reward.expire_time(now),
            },
            now,
        );

        if let Err(source) = self.repos.grants.create(&grant).await {
            let compensated = match &hold {
                Some(hold) => self.compensate(hold.reservation_id()).await,
                None => false,
            };
            return Err(IssuanceError::GrantPersistence {
                source,
                compensated,
            });
        }
        let grant_id = grant.grant_id();

        match log.attach_grant(grant_id) {
            Ok(()) => {
                if let Err(e) = self.repos.completions.update(log).await {
                    warn!(completion_id = %log.completion_id(), grant_id = %grant_id, error = %e, "failed to back-fill grant on completion log");
                }
            }
            Err(e) => {
                warn!(completion_id = %log.completion_id(), grant_id = %grant_id, error = %e, "completion log already linked");
            }
        }

        let distributor_config = strategy_config(&reward, "distributor", reward.distributor());
        if let Err(source) = self
            .distributors
            .distribute(&grant, distributor_config.as_ref())
            .await
        {
            self.record_failure(&mut grant, &source).await;
            return Err(IssuanceError::Distribution { grant_id, source });
        }

        self.finalize(&mut grant).await?;
        if let Some(hold) = &hold {
            if let Err(e) = self.inventory.confirm(hold.reservation_id()).await {
                warn!(reservation_id = %hold.reservation_id(), error = %e, "failed to confirm inventory hold");
            }
        }

        info!(grant_id = %grant_id, reward_id = %reward.id, user_id = %event.user_id, "reward distributed");
        Ok(IssuanceOutcome::Issued {
            grant_id,
            reservation_id: hold.map(|h| h.reservation_id()),
        })
    }

    /// Re-run delivery for a grant whose last attempt failed.
    ///
    /// A grant that is already `DISTRIBUTED` is returned unchanged. Only a
    /// `GENERATED` grant with a recorded failure is redelivered; on success the
    /// hold taken at issuance, if any, is confirmed.
    #[instrument(skip_all, fields(grant_id = %grant_id), err)]
    pub async fn retry_distribution(&self, grant_id: GrantId) -> Result<RewardGrant, RetryError> {
        let mut grant = self
            .repos
            .grants
            .get(grant_id)
            .await?
            .ok_or(RetryError::NotFound(grant_id))?;

        match grant.status() {
            GrantStatus::Distributed => {
                debug!("grant already distributed");
                return Ok(grant);
            }
            _ if grant.is_retriable() => {}
            status => return Err(RetryError::NotRetriable { grant_id, status }),
        }

        let distributor_config = match self.repos.rewards.get(grant.reward_id()).await? {
            Some(reward) => strategy_config(&reward, "distributor", reward.distributor()),
            None => None,
        };

        if let Err(source) = self
            .distributors
            .distribute(&grant, distributor_config.as_ref())
            .await
        {
            self.record_failure(&mut grant, &source).await;
            return Err(RetryError::Distribution { grant_id, source });
        }

        self.finalize(&mut grant).await.map_err(|e| match e {
            IssuanceError::Finalize { source, .. } => RetryError::Repository(source),
            other => RetryError::Repository(RepositoryError::Storage(other.to_string())),
        })?;
        self.confirm_grant_hold(&grant).await;

        info!(reward_id = %grant.reward_id(), user_id = %grant.user_id(), "grant redistributed");
        Ok(grant)
    }

    async fn load_campaign(&self, campaign_id: Option<&CampaignId>) -> Option<Campaign> {
        let campaign_id = campaign_id?;
        match self.repos.campaigns.get(campaign_id).await {
            Ok(campaign) => campaign,
            Err(e) => {
                warn!(campaign_id = %campaign_id, error = %e, "failed to load campaign; validating without it");
                None
            }
        }
    }

    async fn compensate(&self, reservation_id: ReservationId) -> bool {
        match self.inventory.cancel(reservation_id).await {
            Ok(_) => {
                info!(reservation_id = %reservation_id, "inventory hold cancelled after grant persistence failed");
                true
            }
            Err(e) => {
                error!(reservation_id = %reservation_id, error = %e, "failed to cancel inventory hold");
                false
            }
        }
    }

    async fn record_failure(&self, grant: &mut RewardGrant, cause: &DistributionError) {
        error!(grant_id = %grant.grant_id(), user_id = %grant.user_id(), error = %cause, "reward distribution failed");
        if let Err(e) = grant.record_distribution_failure(cause.to_string(), self.clock.now()) {
            warn!(grant_id = %grant.grant_id(), error = %e, "cannot record distribution failure");
            return;
        }
        if let Err(e) = self.repos.grants.update(grant).await {
            error!(grant_id = %grant.grant_id(), error = %e, "failed to persist distribution failure");
        }
    }

    async fn finalize(&self, grant: &mut RewardGrant) -> Result<(), IssuanceError> {
        let grant_id = grant.grant_id();
        let changed = grant
            .mark_distributed(self.clock.now())
            .map_err(|e| IssuanceError::Finalize {
                grant_id,
                source: RepositoryError::Conflict(e.to_string()),
            })?;
        if changed {
            self.repos
                .grants
                .update(grant)
                .await
                .map_err(|source| IssuanceError::Finalize { grant_id, source })?;
        }
        Ok(())
    }

    async fn confirm_grant_hold(&self, grant: &RewardGrant) {
        let Some(reservation_id) = grant.reservation_id() else {
            return;
        };
        if let Err(e) = self.inventory.confirm(reservation_id).await {
            warn!(grant_id = %grant.grant_id(), reservation_id = %reservation_id, error = %e, "failed to confirm inventory hold");
        }
    }
}

/// A malformed strategy config is treated as absent.
fn strategy_config(
    reward: &Reward,
    strategy: &'static str,
    parsed: Result<Option<StrategyConfig>, ConfigError>,
) -> Option<StrategyConfig> {
    parsed.unwrap_or_else(|e| {
        warn!(reward_id = %reward.id, strategy, error = %e, "invalid strategy config; using defaults");
        None
    })
}
