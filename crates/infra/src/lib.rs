//! Infrastructure layer: stores, strategy registries, the issuance engine and
//! its outbound collaborators (webhooks, notifications, broker).

pub mod config;
pub mod distributor;
pub mod event_bus;
pub mod generator;
pub mod ledger;
pub mod notification;
pub mod publisher;
pub mod repository;
pub mod reservation;
pub mod trigger;
pub mod validator;

#[cfg(test)]
mod integration_tests;

pub use config::{EngineConfig, EngineConfigError};
pub use distributor::{DistributionError, DistributorRegistry};
pub use generator::{GenerationError, GeneratorRegistry};
pub use ledger::{LedgerError, RewardLedger, TaskStats};
pub use notification::{NotificationClient, NotificationError, NotificationService};
pub use publisher::{CompletionBus, CompletionPublisher, PublishError, PublishOutcome};
pub use reservation::{InventoryReservationManager, ReservationSweeper, SweeperHandle};
pub use trigger::{
    CompletionError, IssuanceError, IssuanceOutcome, Repositories, RetryError, SkipReason,
    TaskOutcome, TaskReport, TaskTriggerService, TriggerError, TriggerReport,
};
pub use validator::{ValidationError, ValidationFailure, ValidatorChain};
