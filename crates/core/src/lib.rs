//! `marketing-core`: shared building blocks for the marketing backend.
//!
//! Identifiers and their injected source, the domain error model, the `Entity`
//! marker and the injected clock. No infrastructure concerns live here.

pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod id_source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AppId, CampaignId, CompletionId, GrantId, ReservationId, RewardId, TaskId, TenantId, UserId,
};
pub use id_source::{IdSource, RandomIds, SequentialIds};
