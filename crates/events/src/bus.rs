//! Event publishing/subscription abstraction (mechanics only).
//!
//! The reward engine uses the bus for exactly one thing: announcing completed
//! tasks to systems it does not know about. Delivery is **at most once** from
//! the engine's point of view:
//!
//! - the engine hands a message to the bus once and never retries;
//! - a failed `publish` is logged by the caller and otherwise ignored;
//! - the bus is not a source of truth (completion logs and grants are).
//!
//! Implementations range from the in-memory fan-out used in tests to a broker
//! client (Redis pub/sub behind the `redis` feature of `marketing-infra`).

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use thiserror::Error;

/// Failure to hand a message to the transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// Internal lock poisoned or bus shut down.
    #[error("event bus unavailable: {0}")]
    Unavailable(String),

    /// Payload could not be encoded for the wire.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Broker/transport rejected or failed the send.
    #[error("transport error: {0}")]
    Transport(String),
}

/// A subscription to the bus.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics). Meant for a single consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic pub/sub seam.
///
/// `publish` is synchronous and may block on network I/O; async callers should
/// run it on a blocking thread and bound it with a timeout.
pub trait EventBus<M>: Send + Sync {
    fn publish(&self, message: M) -> Result<(), BusError>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
