//! Storage ports consumed by the issuance engine.
//!
//! The catalog (tasks, rewards, campaigns) is read-only from the engine's
//! point of view; completion logs, grants and holds are the ledgers it writes.
//! Every call is an async I/O boundary.

pub mod in_memory;
pub mod ports;

pub use in_memory::{
    InMemoryCampaignRepository, InMemoryCompletionLogRepository, InMemoryGrantRepository,
    InMemoryReservationRepository, InMemoryRewardRepository, InMemoryTaskRepository,
};
pub use ports::{
    CampaignRepository, CompletionLogRepository, GrantRepository, RepositoryError,
    RepositoryResult, ReservationFilter, ReservationRepository, RewardRepository,
    TaskRepository,
};
