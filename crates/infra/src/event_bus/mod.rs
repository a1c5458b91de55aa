//! Broker-backed event bus implementations.
//!
//! The bus seam itself lives in `marketing-events`; this module provides the
//! network transports behind feature flags.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::RedisPubSubEventBus;
