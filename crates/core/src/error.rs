//! Errors raised by the ledger records themselves.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// Deterministic failures of the grant, reservation and completion records.
/// Store and network failures are reported by the infra layer instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The record's state machine has no edge for the requested move.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("expired at {0}")]
    Expired(DateTime<Utc>),

    /// A different terminal outcome is already recorded.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}
