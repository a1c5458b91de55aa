//! Reward issuance domain (pure, deterministic).
//!
//! Task definitions and their condition evaluation, reward templates, and the
//! two ledger state machines the issuance pipeline drives: [`RewardGrant`] and
//! [`InventoryReservation`]. No IO lives here; repositories and strategies are
//! in `marketing-infra`.

pub mod campaign;
pub mod completion;
pub mod condition;
pub mod config;
pub mod grant;
pub mod reservation;
pub mod reward;
pub mod task;

pub use campaign::Campaign;
pub use completion::TaskCompletionLog;
pub use condition::{Evaluation, ProgressSnapshot, evaluate};
pub use config::{
    ConfigError, InventoryRule, LimitRule, StrategyConfig, TimeRule, ValidatorConfig,
    ValidatorRule,
};
pub use grant::{GrantStatus, NewGrant, RewardGrant};
pub use reservation::{InventoryReservation, ReservationStatus};
pub use reward::{Reward, RewardStatus, reward_type};
pub use task::{ComparisonOperator, ConditionConfig, Task, TaskStatus, TriggerConfig};
