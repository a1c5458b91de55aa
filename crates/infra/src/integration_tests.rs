//! Integration tests for the issuance pipeline.
//!
//! Event → TaskTriggerService → completion log → validators → hold → generator
//! → grant → distributor → broker, all over the in-memory stores.
//!
//! Verifies:
//! - caps, trigger matching and unknown validators behave per task
//! - a failed grant write releases its inventory hold
//! - a failed delivery is retriable exactly once
//! - issued content is pinned against later template edits

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;

    use marketing_core::{
        AppId, Clock, FixedClock, GrantId, IdSource, RewardId, SequentialIds, TaskId, TenantId,
        UserId,
    };
    use marketing_events::{
        EventBus, EventEnvelope, InMemoryEventBus, TaskCompletedMessage, TaskEvent,
    };
    use marketing_rewards::{
        GrantStatus, NewGrant, ReservationStatus, Reward, RewardGrant, Task, reward_type,
    };

    use crate::distributor::{DistributionError, DistributionRequest, Distributor, DistributorRegistry};
    use crate::generator::GeneratorRegistry;
    use crate::notification::NotificationService;
    use crate::publisher::{CompletionPublisher, PublishOutcome};
    use crate::repository::{
        GrantRepository, InMemoryCampaignRepository, InMemoryCompletionLogRepository,
        InMemoryGrantRepository, InMemoryReservationRepository, InMemoryRewardRepository,
        InMemoryTaskRepository, RepositoryError, RepositoryResult, ReservationFilter,
        ReservationRepository, RewardRepository, TaskRepository,
    };
    use crate::reservation::InventoryReservationManager;
    use crate::trigger::{
        IssuanceError, IssuanceOutcome, Repositories, RetryError, SkipReason, TaskOutcome,
        TaskTriggerService, TriggerError,
    };
    use crate::validator::{ValidationError, ValidationFailure, ValidatorChain};

    type CompletionEnvelope = EventEnvelope<TaskCompletedMessage>;

    /// Grant store that can be told to reject writes.
    #[derive(Default)]
    struct FlakyGrantRepository {
        inner: InMemoryGrantRepository,
        fail_create: AtomicBool,
    }

    #[async_trait::async_trait]
    impl GrantRepository for FlakyGrantRepository {
        async fn create(&self, grant: &RewardGrant) -> RepositoryResult<()> {
            if self.fail_create.load(Ordering::SeqCst) {
                return Err(RepositoryError::Storage("disk full".to_string()));
            }
            self.inner.create(grant).await
        }

        async fn update(&self, grant: &RewardGrant) -> RepositoryResult<()> {
            self.inner.update(grant).await
        }

        async fn get(&self, grant_id: GrantId) -> RepositoryResult<Option<RewardGrant>> {
            self.inner.get(grant_id).await
        }

        async fn count_by_status(
            &self,
            reward_id: &RewardId,
            user_id: Option<UserId>,
            status: GrantStatus,
        ) -> RepositoryResult<u64> {
            self.inner.count_by_status(reward_id, user_id, status).await
        }

        async fn list_by_user(
            &self,
            tenant_id: &TenantId,
            user_id: UserId,
        ) -> RepositoryResult<Vec<RewardGrant>> {
            self.inner.list_by_user(tenant_id, user_id).await
        }
    }

    /// Fails the first `failures` deliveries, then succeeds.
    #[derive(Default)]
    struct FlakyDistributor {
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Distributor for FlakyDistributor {
        async fn distribute(&self, _: &DistributionRequest<'_>) -> Result<(), DistributionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(DistributionError::WebhookStatus { status: 502 });
            }
            Ok(())
        }
    }

    struct Harness {
        clock: Arc<FixedClock>,
        tasks: Arc<InMemoryTaskRepository>,
        rewards: Arc<InMemoryRewardRepository>,
        completions: Arc<InMemoryCompletionLogRepository>,
        grants: Arc<FlakyGrantRepository>,
        reservations: Arc<InMemoryReservationRepository>,
        bus: Arc<InMemoryEventBus<CompletionEnvelope>>,
        flaky: Arc<FlakyDistributor>,
        service: TaskTriggerService,
    }

    impl Harness {
        fn new() -> Self {
            let clock = Arc::new(FixedClock::new(
                Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            ));
            let tasks = Arc::new(InMemoryTaskRepository::new());
            let rewards = Arc::new(InMemoryRewardRepository::new());
            let completions = Arc::new(InMemoryCompletionLogRepository::new());
            let grants = Arc::new(FlakyGrantRepository::default());
            let reservations = Arc::new(InMemoryReservationRepository::new());
            let bus = Arc::new(InMemoryEventBus::<CompletionEnvelope>::new());
            let flaky = Arc::new(FlakyDistributor::default());
            let ids: Arc<dyn IdSource> = Arc::new(SequentialIds::new(clock.clone()));

            let repos = Repositories {
                tasks: tasks.clone(),
                rewards: rewards.clone(),
                campaigns: Arc::new(InMemoryCampaignRepository::new()),
                completions: completions.clone(),
                grants: grants.clone(),
                reservations: reservations.clone(),
            };

            let validators =
                ValidatorChain::new(repos.grants.clone(), repos.reservations.clone(), clock.clone());
            let mut distributors =
                DistributorRegistry::new(NotificationService::disabled(), Duration::from_secs(1));
            distributors.register("FLAKY", flaky.clone());
            let inventory = Arc::new(InventoryReservationManager::new(
                repos.reservations.clone(),
                clock.clone(),
                ids.clone(),
                chrono::Duration::minutes(30),
            ));
            let publisher = CompletionPublisher::new(
                bus.clone(),
                "marketing.task.completed",
                Duration::from_secs(1),
                clock.clone(),
            );

            let service = TaskTriggerService::new(
                repos,
                validators,
                GeneratorRegistry::new(StdRng::seed_from_u64(11)),
                distributors,
                inventory,
                publisher,
                clock.clone(),
                ids,
            );

            Self {
                clock,
                tasks,
                rewards,
                completions,
                grants,
                reservations,
                bus,
                flaky,
                service,
            }
        }

        async fn add_task(&self, task: Task) {
            self.tasks.upsert(task).await.unwrap();
        }

        async fn add_reward(&self, reward: Reward) -> Reward {
            self.rewards.upsert(reward).await.unwrap()
        }

        fn order_paid(&self, user: i64, amount: i64) -> TaskEvent {
            TaskEvent::new(
                "ORDER_PAID",
                UserId::new(user),
                TenantId::new("t1"),
                AppId::new("shop"),
                self.clock.now(),
            )
            .with_data("order_amount", amount)
        }

        fn grants(&self) -> Vec<RewardGrant> {
            self.grants.inner.snapshot()
        }

        async fn reservations(&self) -> Vec<marketing_rewards::InventoryReservation> {
            self.reservations
                .list(&ReservationFilter::default())
                .await
                .unwrap()
        }
    }

    fn order_task(id: &str, max_count: u32, reward_id: Option<&str>) -> Task {
        let mut task = Task::new(
            TaskId::new(id),
            TenantId::new("t1"),
            AppId::new("shop"),
            "Spend 100",
        );
        task.trigger_config = Some(r#"{"event":"ORDER_PAID"}"#.to_string());
        task.condition_config =
            Some(r#"{"type":"order_amount","operator":">=","value":100}"#.to_string());
        task.reward_id = reward_id.map(RewardId::new);
        task.max_count = max_count;
        task
    }

    fn coupon(id: &str) -> Reward {
        let mut reward = Reward::new(
            RewardId::new(id),
            TenantId::new("t1"),
            AppId::new("shop"),
            reward_type::COUPON,
            "10 off",
        );
        reward.content_config = json!({"discount": 10});
        reward
    }

    fn issued(outcome: Option<&TaskOutcome>) -> GrantId {
        match outcome {
            Some(TaskOutcome::Completed {
                issuance: IssuanceOutcome::Issued { grant_id, .. },
                ..
            }) => *grant_id,
            other => panic!("expected an issued grant, got {other:?}"),
        }
    }

    fn issuance_error(outcome: Option<&TaskOutcome>) -> IssuanceError {
        match outcome {
            Some(TaskOutcome::Completed {
                issuance: IssuanceOutcome::Failed(e),
                ..
            }) => e.clone(),
            other => panic!("expected a failed issuance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn order_paid_issues_one_distributed_coupon_and_publishes() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-coupon"))).await;
        h.add_reward(coupon("r-coupon")).await;

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let grant_id = issued(report.outcome(&TaskId::new("task-order")));
        assert!(matches!(
            report.outcome(&TaskId::new("task-order")),
            Some(TaskOutcome::Completed {
                publish: PublishOutcome::Published,
                ..
            })
        ));

        let logs = h.completions.snapshot();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].grant_id(), Some(grant_id));
        assert_eq!(logs[0].progress_data()["value"], json!(150.0));
        assert_eq!(logs[0].progress_data()["target"], json!(100.0));

        let grants = h.grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].status(), GrantStatus::Distributed);
        assert_eq!(grants[0].distributed_at(), Some(h.clock.now()));
        assert_eq!(grants[0].user_id(), UserId::new(42));
        assert_eq!(h.bus.published_count(), 1);

        // Same user, same event: the cap of one is already used up.
        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        assert_eq!(
            report.outcome(&TaskId::new("task-order")),
            Some(&TaskOutcome::Skipped(SkipReason::MaxCountReached {
                completed: 1,
                max_count: 1
            }))
        );
        assert_eq!(h.completions.snapshot().len(), 1);
        assert_eq!(h.grants().len(), 1);
        assert_eq!(h.bus.published_count(), 1);
    }

    #[tokio::test]
    async fn published_message_mirrors_the_event() {
        let h = Harness::new();
        let sub = h.bus.subscribe();
        h.add_task(order_task("task-order", 0, None)).await;

        h.service.trigger_event(&h.order_paid(7, 300)).await.unwrap();

        let envelope = sub.try_recv().unwrap();
        assert_eq!(envelope.topic(), "marketing.task.completed");
        let payload = envelope.payload();
        assert_eq!(payload.event_type, "ORDER_PAID");
        assert_eq!(payload.user_id, UserId::new(7));
        assert_eq!(payload.event_data["order_amount"], json!(300));
        assert_eq!(payload.timestamp, "2026-03-01T12:00:00Z");
    }

    #[tokio::test]
    async fn other_event_types_do_not_complete_the_task() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-coupon"))).await;
        h.add_reward(coupon("r-coupon")).await;

        let mut event = h.order_paid(42, 150);
        event.event_type = "USER_SIGN_IN".to_string();
        let report = h.service.trigger_event(&event).await.unwrap();

        assert_eq!(
            report.outcome(&TaskId::new("task-order")),
            Some(&TaskOutcome::Skipped(SkipReason::TriggerMismatch))
        );
        assert!(h.completions.snapshot().is_empty());
        assert!(h.grants().is_empty());
        assert_eq!(h.bus.published_count(), 0);
    }

    #[tokio::test]
    async fn condition_below_target_is_skipped() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 0, None)).await;

        let report = h.service.trigger_event(&h.order_paid(42, 99)).await.unwrap();
        assert_eq!(
            report.outcome(&TaskId::new("task-order")),
            Some(&TaskOutcome::Skipped(SkipReason::ConditionNotMet))
        );
        assert!(h.completions.snapshot().is_empty());
    }

    #[tokio::test]
    async fn cap_of_n_allows_exactly_n_completions_per_user() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 3, Some("r-coupon"))).await;
        h.add_reward(coupon("r-coupon")).await;

        for _ in 0..4 {
            h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        }
        // Another user has a cap of their own.
        h.service.trigger_event(&h.order_paid(43, 150)).await.unwrap();

        let logs = h.completions.snapshot();
        assert_eq!(logs.iter().filter(|l| l.user_id() == UserId::new(42)).count(), 3);
        assert_eq!(logs.iter().filter(|l| l.user_id() == UserId::new(43)).count(), 1);
        assert_eq!(h.grants().len(), 4);
    }

    #[tokio::test]
    async fn unregistered_validator_type_does_not_block_issuance() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-coupon"))).await;
        let mut reward = coupon("r-coupon");
        reward.validator_config = Some(r#"{"validators":[{"type":"FOO"},{"type":"USER"}]}"#.to_string());
        h.add_reward(reward).await;

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        issued(report.outcome(&TaskId::new("task-order")));
    }

    #[tokio::test]
    async fn expired_reward_window_rejects_issuance_but_keeps_the_completion() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-coupon"))).await;
        let mut reward = coupon("r-coupon");
        reward.validator_config =
            Some(r#"{"type":"TIME","end_time":"2026-02-01T00:00:00Z"}"#.to_string());
        h.add_reward(reward).await;

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        assert_eq!(
            issuance_error(report.outcome(&TaskId::new("task-order"))),
            IssuanceError::Validation(ValidationError::Rejected(ValidationFailure::Expired))
        );
        assert_eq!(h.completions.snapshot().len(), 1);
        assert_eq!(h.completions.snapshot()[0].grant_id(), None);
        assert!(h.grants().is_empty());
        assert_eq!(h.bus.published_count(), 1);
    }

    #[tokio::test]
    async fn grant_write_failure_cancels_the_inventory_hold() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-limited"))).await;
        let mut reward = coupon("r-limited");
        reward.validator_config =
            Some(r#"{"type":"INVENTORY","max_inventory":5}"#.to_string());
        h.add_reward(reward).await;
        h.grants.fail_create.store(true, Ordering::SeqCst);

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        assert!(matches!(
            issuance_error(report.outcome(&TaskId::new("task-order"))),
            IssuanceError::GrantPersistence {
                compensated: true,
                ..
            }
        ));

        let holds = h.reservations().await;
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].status(), ReservationStatus::Cancelled);
        assert_eq!(h.reservations.count_pending_by_resource("r-limited").await.unwrap(), 0);
        assert!(h.grants().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_is_retriable_exactly_once() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-flaky"))).await;
        let mut reward = coupon("r-flaky");
        reward.distributor_config = Some(r#"{"type":"FLAKY"}"#.to_string());
        reward.validator_config =
            Some(r#"{"type":"INVENTORY","max_inventory":10}"#.to_string());
        h.add_reward(reward).await;
        h.flaky.failures.store(1, Ordering::SeqCst);

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let err = issuance_error(report.outcome(&TaskId::new("task-order")));
        let grant_id = err.grant_id().unwrap();

        let grant = h.grants.get(grant_id).await.unwrap().unwrap();
        assert_eq!(grant.status(), GrantStatus::Generated);
        assert!(grant.is_retriable());
        assert!(grant.error_message().unwrap().contains("502"));
        // The hold outlives the failed delivery.
        assert_eq!(h.reservations().await[0].status(), ReservationStatus::Pending);

        h.clock.advance(chrono::Duration::minutes(5));
        let retried = h.service.retry_distribution(grant_id).await.unwrap();
        assert_eq!(retried.status(), GrantStatus::Distributed);
        assert_eq!(retried.error_message(), None);
        assert_eq!(retried.distributed_at(), Some(h.clock.now()));
        assert_eq!(h.reservations().await[0].status(), ReservationStatus::Confirmed);

        h.clock.advance(chrono::Duration::minutes(5));
        let again = h.service.retry_distribution(grant_id).await.unwrap();
        assert_eq!(again.distributed_at(), retried.distributed_at());
        assert_eq!(h.flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn retry_refuses_grants_without_a_recorded_failure() {
        let h = Harness::new();
        let grant = RewardGrant::generated(
            GrantId::new(),
            NewGrant {
                reward_id: RewardId::new("r-coupon"),
                reward_name: "10 off".to_string(),
                reward_type: reward_type::COUPON.to_string(),
                reward_version: 1,
                content_snapshot: "{}".to_string(),
                generator_config: None,
                campaign_id: None,
                campaign_name: None,
                task_id: TaskId::new("task-order"),
                task_name: "Spend 100".to_string(),
                tenant_id: TenantId::new("t1"),
                app_id: AppId::new("shop"),
                user_id: UserId::new(42),
                reservation_id: None,
                reserved_at: None,
                expire_time: None,
            },
            h.clock.now(),
        );
        h.grants.create(&grant).await.unwrap();
        // Someone else's hold for the same user must stay untouched.
        let foreign = h
            .service
            .inventory()
            .reserve("r1", None, UserId::new(42), 1)
            .await
            .unwrap();

        assert_eq!(
            h.service.retry_distribution(grant.grant_id()).await.unwrap_err(),
            RetryError::NotRetriable {
                grant_id: grant.grant_id(),
                status: GrantStatus::Generated,
            }
        );
        assert_eq!(h.flaky.calls.load(Ordering::SeqCst), 0);
        let holds = h.reservations().await;
        assert_eq!(holds.len(), 1);
        assert_eq!(holds[0].reservation_id(), foreign.reservation_id());
        assert_eq!(holds[0].status(), ReservationStatus::Pending);
    }

    #[tokio::test]
    async fn retry_confirms_only_the_grants_own_hold() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-flaky"))).await;
        let mut reward = coupon("r-flaky");
        reward.distributor_config = Some(r#"{"type":"FLAKY"}"#.to_string());
        reward.validator_config =
            Some(r#"{"type":"INVENTORY","max_inventory":10}"#.to_string());
        h.add_reward(reward).await;
        h.flaky.failures.store(1, Ordering::SeqCst);

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let grant_id = issuance_error(report.outcome(&TaskId::new("task-order")))
            .grant_id()
            .unwrap();
        let own = h.grants.get(grant_id).await.unwrap().unwrap().reservation_id().unwrap();
        let foreign = h
            .service
            .inventory()
            .reserve("r-flaky", None, UserId::new(42), 1)
            .await
            .unwrap();

        h.service.retry_distribution(grant_id).await.unwrap();
        for hold in h.reservations().await {
            if hold.reservation_id() == own {
                assert_eq!(hold.status(), ReservationStatus::Confirmed);
            } else {
                assert_eq!(hold.reservation_id(), foreign.reservation_id());
                assert_eq!(hold.status(), ReservationStatus::Pending);
            }
        }
    }

    #[tokio::test]
    async fn retry_of_unknown_grant_is_not_found() {
        let h = Harness::new();
        let missing = GrantId::new();
        assert_eq!(
            h.service.retry_distribution(missing).await.unwrap_err(),
            RetryError::NotFound(missing)
        );
    }

    #[tokio::test]
    async fn pending_holds_exhaust_inventory() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 1, Some("r-scarce"))).await;
        let mut reward = coupon("r-scarce");
        reward.distributor_config = Some(r#"{"type":"FLAKY"}"#.to_string());
        reward.validator_config =
            Some(r#"{"validators":[{"type":"INVENTORY","max_inventory":2}]}"#.to_string());
        h.add_reward(reward).await;
        // Deliveries keep failing so holds stay PENDING.
        h.flaky.failures.store(usize::MAX, Ordering::SeqCst);

        for user in 1..=2 {
            let report = h.service.trigger_event(&h.order_paid(user, 150)).await.unwrap();
            assert!(matches!(
                issuance_error(report.outcome(&TaskId::new("task-order"))),
                IssuanceError::Distribution { .. }
            ));
        }

        let report = h.service.trigger_event(&h.order_paid(3, 150)).await.unwrap();
        assert_eq!(
            issuance_error(report.outcome(&TaskId::new("task-order"))),
            IssuanceError::Validation(ValidationError::Rejected(
                ValidationFailure::InventoryExhausted { max_inventory: 2 }
            ))
        );
        assert_eq!(h.reservations().await.len(), 2);

        // Once the holds lapse, capacity comes back.
        h.clock.advance(chrono::Duration::minutes(31));
        h.service.inventory().cancel_expired().await.unwrap();
        let report = h.service.trigger_event(&h.order_paid(4, 150)).await.unwrap();
        assert!(matches!(
            issuance_error(report.outcome(&TaskId::new("task-order"))),
            IssuanceError::Distribution { .. }
        ));
    }

    #[tokio::test]
    async fn template_edits_do_not_touch_issued_grants() {
        let h = Harness::new();
        h.add_task(order_task("task-order", 0, Some("r-template"))).await;
        let mut reward = coupon("r-template");
        reward.reward_type = reward_type::SUBSCRIPTION.to_string();
        reward.content_config = json!({"plan": "silver"});
        let reward = h.add_reward(reward).await;

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let grant_id = issued(report.outcome(&TaskId::new("task-order")));

        let mut edited = reward.clone();
        edited.content_config = json!({"plan": "gold"});
        let edited = h.add_reward(edited).await;
        assert_eq!(edited.version, 2);

        let grant = h.grants.get(grant_id).await.unwrap().unwrap();
        assert_eq!(grant.reward_version(), 1);
        assert_eq!(grant.content_snapshot(), r#"{"plan":"silver"}"#);

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let newer = h
            .grants
            .get(issued(report.outcome(&TaskId::new("task-order"))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(newer.reward_version(), 2);
        assert_eq!(newer.content_snapshot(), r#"{"plan":"gold"}"#);
    }

    #[tokio::test]
    async fn one_failing_task_does_not_block_the_next() {
        let h = Harness::new();
        h.add_task(order_task("task-a", 0, Some("r-missing"))).await;
        h.add_task(order_task("task-b", 0, Some("r-coupon"))).await;
        h.add_reward(coupon("r-coupon")).await;

        let report = h.service.trigger_event(&h.order_paid(42, 150)).await.unwrap();
        let order: Vec<_> = report.tasks.iter().map(|t| t.task_id.as_str().to_string()).collect();
        assert_eq!(order, vec!["task-a", "task-b"]);
        assert!(matches!(
            report.outcome(&TaskId::new("task-a")),
            Some(TaskOutcome::Completed {
                issuance: IssuanceOutcome::RewardNotFound,
                ..
            })
        ));
        issued(report.outcome(&TaskId::new("task-b")));
        assert_eq!(report.completed(), 2);
        assert_eq!(report.issued_grants().len(), 1);
    }

    struct BrokenTaskRepository;

    #[async_trait::async_trait]
    impl TaskRepository for BrokenTaskRepository {
        async fn list_active(
            &self,
            _: &TenantId,
            _: &AppId,
            _: chrono::DateTime<Utc>,
        ) -> RepositoryResult<Vec<Task>> {
            Err(RepositoryError::Storage("connection reset".to_string()))
        }

        async fn get(&self, _: &TaskId) -> RepositoryResult<Option<Task>> {
            Ok(None)
        }

        async fn upsert(&self, _: Task) -> RepositoryResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn task_listing_failure_is_the_only_fatal_error() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(Utc::now()));
        let mut repos = Repositories::in_memory();
        repos.tasks = Arc::new(BrokenTaskRepository);
        let service = TaskTriggerService::with_defaults(
            repos,
            &crate::config::EngineConfig::default(),
            NotificationService::disabled(),
            None,
            clock.clone(),
        );

        let event = TaskEvent::new(
            "ORDER_PAID",
            UserId::new(1),
            TenantId::new("t1"),
            AppId::new("shop"),
            clock.now(),
        );
        assert_eq!(
            service.trigger_event(&event).await.unwrap_err(),
            TriggerError::ListTasks(RepositoryError::Storage("connection reset".to_string()))
        );
    }
}
