//! Delivery channels for generated rewards.
//!
//! Resolution order: the distributor config's `type`, then the reward type if
//! a channel is registered under it, then `AUTO`. A failed delivery is always a
//! genuinely failed channel; a missing optional notification backend is not.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use marketing_core::{GrantId, RewardId, UserId};
use marketing_rewards::{RewardGrant, StrategyConfig};

use crate::notification::{NotificationError, NotificationService};

pub const AUTO: &str = "AUTO";
pub const WEBHOOK: &str = "WEBHOOK";
pub const EMAIL: &str = "EMAIL";
pub const SMS: &str = "SMS";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DistributionError {
    #[error("webhook_url is not configured")]
    WebhookUrlMissing,

    #[error("webhook responded with status {status}")]
    WebhookStatus { status: u16 },

    #[error("webhook request failed: {0}")]
    Http(String),

    #[error("webhook timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    /// Failure reported by a registered custom channel.
    #[error("{distributor} distributor failed: {reason}")]
    Failed { distributor: String, reason: String },
}

#[derive(Debug, Clone, Copy)]
pub struct DistributionRequest<'a> {
    pub grant: &'a RewardGrant,
    /// Parameters of the resolved channel; empty when the reward has no config.
    pub config: &'a StrategyConfig,
}

#[async_trait::async_trait]
pub trait Distributor: Send + Sync {
    async fn distribute(&self, request: &DistributionRequest<'_>) -> Result<(), DistributionError>;
}

/// Content already lives on the grant; nothing to send.
#[derive(Debug, Default)]
pub struct AutoDistributor;

#[async_trait::async_trait]
impl Distributor for AutoDistributor {
    async fn distribute(&self, request: &DistributionRequest<'_>) -> Result<(), DistributionError> {
        debug!(grant_id = %request.grant.grant_id(), "auto distribution");
        Ok(())
    }
}

/// Body POSTed to a reward webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub grant_id: GrantId,
    pub reward_id: &'a RewardId,
    pub reward_type: &'a str,
    pub user_id: UserId,
    pub content: &'a str,
}

/// POSTs the grant to `config.webhook_url`; any non-2xx answer is a failure.
#[derive(Debug, Clone)]
pub struct WebhookDistributor {
    client: reqwest::Client,
    timeout: Duration,
}

impl WebhookDistributor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl Distributor for WebhookDistributor {
    async fn distribute(&self, request: &DistributionRequest<'_>) -> Result<(), DistributionError> {
        let url = request.config.str_param("webhook_url", "").trim();
        if url.is_empty() {
            return Err(DistributionError::WebhookUrlMissing);
        }

        let grant = request.grant;
        let payload = WebhookPayload {
            grant_id: grant.grant_id(),
            reward_id: grant.reward_id(),
            reward_type: grant.reward_type(),
            user_id: grant.user_id(),
            content: grant.content_snapshot(),
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DistributionError::Timeout(self.timeout)
                } else {
                    DistributionError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DistributionError::WebhookStatus {
                status: status.as_u16(),
            });
        }
        debug!(grant_id = %grant.grant_id(), url, "webhook delivered");
        Ok(())
    }
}

fn notification_params(grant: &RewardGrant) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("grant_id".to_string(), grant.grant_id().to_string()),
        ("reward_id".to_string(), grant.reward_id().to_string()),
        ("reward_type".to_string(), grant.reward_type().to_string()),
        ("content".to_string(), grant.content_snapshot().to_string()),
    ])
}

#[derive(Debug, Clone)]
pub struct EmailDistributor {
    notifications: NotificationService,
}

impl EmailDistributor {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

#[async_trait::async_trait]
impl Distributor for EmailDistributor {
    async fn distribute(&self, request: &DistributionRequest<'_>) -> Result<(), DistributionError> {
        let template_id = request.config.str_param("template_id", "reward_email");
        let template_id = if template_id.is_empty() { "reward_email" } else { template_id };
        self.notifications
            .send_email(
                request.grant.user_id(),
                template_id,
                &notification_params(request.grant),
            )
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SmsDistributor {
    notifications: NotificationService,
}

impl SmsDistributor {
    pub fn new(notifications: NotificationService) -> Self {
        Self { notifications }
    }
}

#[async_trait::async_trait]
impl Distributor for SmsDistributor {
    async fn distribute(&self, request: &DistributionRequest<'_>) -> Result<(), DistributionError> {
        let template_id = request.config.str_param("template_id", "reward_sms");
        let template_id = if template_id.is_empty() { "reward_sms" } else { template_id };
        self.notifications
            .send_sms(
                request.grant.user_id(),
                template_id,
                &notification_params(request.grant),
            )
            .await?;
        Ok(())
    }
}

pub struct DistributorRegistry {
    distributors: HashMap<String, Arc<dyn Distributor>>,
    auto: Arc<dyn Distributor>,
}

impl DistributorRegistry {
    /// Registry with `AUTO`, `WEBHOOK`, `EMAIL` and `SMS`.
    pub fn new(notifications: NotificationService, webhook_timeout: Duration) -> Self {
        let auto: Arc<dyn Distributor> = Arc::new(AutoDistributor);
        let mut registry = Self {
            distributors: HashMap::new(),
            auto: auto.clone(),
        };
        registry.register(AUTO, auto);
        registry.register(WEBHOOK, Arc::new(WebhookDistributor::new(webhook_timeout)));
        registry.register(EMAIL, Arc::new(EmailDistributor::new(notifications.clone())));
        registry.register(SMS, Arc::new(SmsDistributor::new(notifications)));
        registry
    }

    pub fn register(&mut self, kind: impl Into<String>, distributor: Arc<dyn Distributor>) {
        self.distributors.insert(kind.into(), distributor);
    }

    pub fn resolve(
        &self,
        reward_type: &str,
        config: Option<&StrategyConfig>,
    ) -> (String, Arc<dyn Distributor>) {
        if let Some(kind) = config.and_then(|c| c.kind.as_deref()) {
            if let Some(distributor) = self.distributors.get(kind) {
                return (kind.to_string(), distributor.clone());
            }
            warn!(distributor = %kind, "unknown distributor type; using AUTO");
        }
        match self.distributors.get(reward_type) {
            Some(distributor) => (reward_type.to_string(), distributor.clone()),
            None => (AUTO.to_string(), self.auto.clone()),
        }
    }

    pub async fn distribute(
        &self,
        grant: &RewardGrant,
        config: Option<&StrategyConfig>,
    ) -> Result<(), DistributionError> {
        let (kind, distributor) = self.resolve(grant.reward_type(), config);
        let empty = StrategyConfig::default();
        let request = DistributionRequest {
            grant,
            config: config.unwrap_or(&empty),
        };
        debug!(grant_id = %grant.grant_id(), distributor = %kind, "distributing reward");
        distributor.distribute(&request).await
    }
}
