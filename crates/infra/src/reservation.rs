//! Inventory Reservation Manager and its expiry sweeper.
//!
//! A hold is a `PENDING` row that counts against its resource until it is
//! confirmed, cancelled, or lapses past `expire_at`. `reserve` performs no
//! capacity check; the `INVENTORY` validator compares the pending count with
//! its ceiling before the engine asks for a hold.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use marketing_core::{CampaignId, Clock, DomainError, IdSource, ReservationId, UserId};
use marketing_rewards::InventoryReservation;

use crate::repository::{
    RepositoryError, RepositoryResult, ReservationFilter, ReservationRepository,
};

pub struct InventoryReservationManager {
    repo: Arc<dyn ReservationRepository>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    ttl: chrono::Duration,
}

impl InventoryReservationManager {
    pub fn new(
        repo: Arc<dyn ReservationRepository>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdSource>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            repo,
            clock,
            ids,
            ttl,
        }
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }

    pub async fn reserve(
        &self,
        resource_id: &str,
        campaign_id: Option<CampaignId>,
        user_id: UserId,
        quantity: u32,
    ) -> RepositoryResult<InventoryReservation> {
        let hold = InventoryReservation::hold(
            self.ids.reservation_id(),
            resource_id,
            campaign_id,
            user_id,
            quantity,
            self.clock.now(),
            self.ttl,
        );
        self.repo.save(&hold).await?;
        debug!(
            reservation_id = %hold.reservation_id(),
            resource_id,
            user_id = %user_id,
            expire_at = %hold.expire_at(),
            "inventory hold placed"
        );
        Ok(hold)
    }

    /// `PENDING -> CONFIRMED`; repeating it is a no-op.
    pub async fn confirm(
        &self,
        reservation_id: ReservationId,
    ) -> RepositoryResult<InventoryReservation> {
        self.settle(reservation_id, |r, now| r.confirm(now)).await
    }

    /// `PENDING -> CANCELLED`; repeating it is a no-op.
    pub async fn cancel(
        &self,
        reservation_id: ReservationId,
    ) -> RepositoryResult<InventoryReservation> {
        self.settle(reservation_id, |r, now| r.cancel(now)).await
    }

    pub async fn count_pending(&self, resource_id: &str) -> RepositoryResult<u64> {
        self.repo.count_pending_by_resource(resource_id).await
    }

    /// Expire every stale `PENDING` hold, releasing it back to capacity.
    pub async fn cancel_expired(&self) -> RepositoryResult<u64> {
        self.repo.expire_stale(self.clock.now()).await
    }

    pub async fn list(
        &self,
        filter: &ReservationFilter,
    ) -> RepositoryResult<Vec<InventoryReservation>> {
        self.repo.list(filter).await
    }

    async fn settle<F>(
        &self,
        reservation_id: ReservationId,
        transition: F,
    ) -> RepositoryResult<InventoryReservation>
    where
        F: FnOnce(&mut InventoryReservation, chrono::DateTime<chrono::Utc>) -> Result<bool, DomainError>,
    {
        let mut reservation = self
            .repo
            .get(reservation_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("reservation", reservation_id))?;

        let changed = transition(&mut reservation, self.clock.now())
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        if changed {
            self.repo.update(&reservation).await?;
            debug!(
                reservation_id = %reservation_id,
                status = %reservation.status(),
                "inventory hold settled"
            );
        }
        Ok(reservation)
    }
}

/// Handle to a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop after the current sweep (if any) and wait for the task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.join.await;
    }
}

/// Periodically expires stale holds, off the issuance path.
pub struct ReservationSweeper {
    manager: Arc<InventoryReservationManager>,
    interval: Duration,
    name: String,
}

impl ReservationSweeper {
    pub fn new(manager: Arc<InventoryReservationManager>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            name: "reservation-sweeper".to_string(),
        }
    }

    /// Spawn on the current tokio runtime. The first sweep runs immediately.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }

    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        info!(sweeper = %self.name, interval_ms = self.interval.as_millis() as u64, "reservation sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    match self.manager.cancel_expired().await {
                        Ok(0) => {}
                        Ok(expired) => info!(sweeper = %self.name, expired, "expired stale inventory holds"),
                        Err(e) => error!(sweeper = %self.name, error = %e, "inventory sweep failed"),
                    }
                }
            }
        }

        info!(sweeper = %self.name, "reservation sweeper stopped");
    }
}
