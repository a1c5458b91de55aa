//! Where ledger identifiers come from.
//!
//! Grants, completion logs and holds get their ids from an injected
//! [`IdSource`] rather than minting them inline, so a test run with a
//! [`FixedClock`](crate::FixedClock) produces the same ids every time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::clock::Clock;
use crate::id::{CompletionId, GrantId, ReservationId};

/// Source of fresh time-ordered UUIDs.
pub trait IdSource: Send + Sync + core::fmt::Debug {
    fn next_uuid(&self) -> Uuid;

    fn grant_id(&self) -> GrantId {
        GrantId::from_uuid(self.next_uuid())
    }

    fn completion_id(&self) -> CompletionId {
        CompletionId::from_uuid(self.next_uuid())
    }

    fn reservation_id(&self) -> ReservationId {
        ReservationId::from_uuid(self.next_uuid())
    }
}

/// Production ids: UUIDv7 from the system time and OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn next_uuid(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// UUIDv7 stamped from an injected clock, with a counter in the random bits.
#[derive(Debug)]
pub struct SequentialIds {
    clock: Arc<dyn Clock>,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            next: AtomicU64::new(1),
        }
    }
}

impl IdSource for SequentialIds {
    fn next_uuid(&self) -> Uuid {
        let millis = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        let mut counter = [0u8; 10];
        counter[2..].copy_from_slice(&n.to_be_bytes());
        uuid::Builder::from_unix_timestamp_millis(millis, &counter).into_uuid()
    }
}
