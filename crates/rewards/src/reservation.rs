use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use marketing_core::{CampaignId, DomainError, DomainResult, Entity, ReservationId, UserId};

/// `PENDING -> {CONFIRMED | CANCELLED | EXPIRED}`; the three outcomes are terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

impl core::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A short-lived hold against a finite resource (keyed by `resource_id`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryReservation {
    reservation_id: ReservationId,
    resource_id: String,
    campaign_id: Option<CampaignId>,
    user_id: UserId,
    quantity: u32,
    status: ReservationStatus,
    expire_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InventoryReservation {
    /// Open a `PENDING` hold that lapses `ttl` after `now`.
    pub fn hold(
        reservation_id: ReservationId,
        resource_id: impl Into<String>,
        campaign_id: Option<CampaignId>,
        user_id: UserId,
        quantity: u32,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            reservation_id,
            resource_id: resource_id.into(),
            campaign_id,
            user_id,
            quantity,
            status: ReservationStatus::Pending,
            expire_at: now + ttl,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn reservation_id(&self) -> ReservationId {
        self.reservation_id
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.campaign_id.as_ref()
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn expire_at(&self) -> DateTime<Utc> {
        self.expire_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Only `PENDING` holds count against a resource's capacity.
    pub fn counts_against_capacity(&self) -> bool {
        self.status == ReservationStatus::Pending
    }

    /// `PENDING` and past `expire_at`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expire_at < now
    }

    /// Returns whether the status changed.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.settle(ReservationStatus::Confirmed, now)
    }

    /// Returns whether the status changed.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<bool> {
        self.settle(ReservationStatus::Cancelled, now)
    }

    /// Lapse a stale hold. Returns `false` (and changes nothing) otherwise.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_stale(now) {
            return false;
        }
        self.status = ReservationStatus::Expired;
        self.updated_at = now;
        true
    }

    fn settle(&mut self, target: ReservationStatus, now: DateTime<Utc>) -> DomainResult<bool> {
        match self.status {
            ReservationStatus::Pending => {
                self.status = target;
                self.updated_at = now;
                Ok(true)
            }
            current if current == target => Ok(false),
            current => Err(DomainError::conflict(format!(
                "reservation {} is already {current}, cannot mark {target}",
                self.reservation_id
            ))),
        }
    }
}

impl Entity for InventoryReservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.reservation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    fn hold() -> InventoryReservation {
        InventoryReservation::hold(
            ReservationId::new(),
            "r-1",
            None,
            UserId::new(7),
            1,
            now(),
            Duration::minutes(30),
        )
    }

    #[test]
    fn hold_starts_pending_with_ttl() {
        let r = hold();
        assert_eq!(r.status(), ReservationStatus::Pending);
        assert_eq!(r.expire_at(), now() + Duration::minutes(30));
        assert!(r.counts_against_capacity());
    }

    #[test]
    fn confirm_is_idempotent() {
        let mut r = hold();
        assert!(r.confirm(now()).unwrap());
        assert!(!r.confirm(now()).unwrap());
        assert_eq!(r.status(), ReservationStatus::Confirmed);
        assert!(!r.counts_against_capacity());
    }

    #[test]
    fn conflicting_terminal_states_are_rejected() {
        let mut r = hold();
        r.cancel(now()).unwrap();
        assert!(matches!(r.confirm(now()), Err(DomainError::Conflict(_))));
        assert!(!r.cancel(now()).unwrap());
    }

    #[test]
    fn only_stale_pending_holds_expire() {
        let mut r = hold();
        assert!(!r.expire(now() + Duration::minutes(30)));
        assert!(r.expire(now() + Duration::minutes(31)));
        assert_eq!(r.status(), ReservationStatus::Expired);
        assert!(r.status().is_terminal());

        let mut confirmed = hold();
        confirmed.confirm(now()).unwrap();
        assert!(!confirmed.expire(now() + Duration::hours(2)));
        assert_eq!(confirmed.status(), ReservationStatus::Confirmed);
    }
}
