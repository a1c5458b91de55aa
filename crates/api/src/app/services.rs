use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use marketing_core::{Clock, SystemClock};
use marketing_infra::repository::{
    CampaignRepository, RepositoryError, RewardRepository, TaskRepository,
};
use marketing_infra::{
    CompletionBus, EngineConfig, NotificationService, Repositories, RewardLedger,
    TaskTriggerService,
};
use marketing_rewards::{Campaign, Reward, Task};

/// Tasks, rewards and campaigns to load into the in-memory stores at startup.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to read catalog {path}: {source}")]
    CatalogRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog {path}: {source}")]
    CatalogParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to seed catalog: {0}")]
    Seed(#[from] RepositoryError),

    #[error("failed to connect to broker: {0}")]
    Broker(String),
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ServiceError::CatalogRead {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ServiceError::CatalogParse {
            path: display,
            source,
        })
    }

    pub async fn seed(self, repos: &Repositories) -> Result<(), RepositoryError> {
        let (tasks, rewards, campaigns) = (self.tasks.len(), self.rewards.len(), self.campaigns.len());
        for campaign in self.campaigns {
            repos.campaigns.upsert(campaign).await?;
        }
        for reward in self.rewards {
            repos.rewards.upsert(reward).await?;
        }
        for task in self.tasks {
            repos.tasks.upsert(task).await?;
        }
        tracing::info!(tasks, rewards, campaigns, "catalog seeded");
        Ok(())
    }
}

/// Everything the handlers need.
pub struct AppServices {
    engine: TaskTriggerService,
    ledger: RewardLedger,
}

impl AppServices {
    pub fn new(engine: TaskTriggerService, clock: Arc<dyn Clock>) -> Self {
        let ledger = RewardLedger::new(
            engine.repositories().clone(),
            engine.inventory().clone(),
            clock,
        );
        Self { engine, ledger }
    }

    pub fn engine(&self) -> &TaskTriggerService {
        &self.engine
    }

    pub fn ledger(&self) -> &RewardLedger {
        &self.ledger
    }
}

/// In-memory stores seeded from `catalog`, with the built-in strategies.
pub async fn build_services(
    config: &EngineConfig,
    catalog: Catalog,
    notifications: NotificationService,
) -> Result<AppServices, ServiceError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repos = Repositories::in_memory();
    catalog.seed(&repos).await?;

    let bus = build_bus(config)?;
    let engine =
        TaskTriggerService::with_defaults(repos, config, notifications, bus, clock.clone());
    Ok(AppServices::new(engine, clock))
}

#[cfg(feature = "redis")]
fn build_bus(config: &EngineConfig) -> Result<Option<Arc<CompletionBus>>, ServiceError> {
    let Some(url) = config.redis_url.as_deref() else {
        tracing::info!("REDIS_URL not set; completion events will not be published");
        return Ok(None);
    };
    let bus = marketing_infra::event_bus::RedisPubSubEventBus::new(url, config.publish_topic.clone())
        .map_err(|e| ServiceError::Broker(e.to_string()))?;
    Ok(Some(Arc::new(bus)))
}

#[cfg(not(feature = "redis"))]
fn build_bus(config: &EngineConfig) -> Result<Option<Arc<CompletionBus>>, ServiceError> {
    if config.redis_url.is_some() {
        tracing::warn!("REDIS_URL set but redis feature not enabled; completion events will not be published");
    }
    Ok(None)
}
