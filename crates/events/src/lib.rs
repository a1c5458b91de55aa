//! Business events consumed and announced by the reward engine.
//!
//! - [`TaskEvent`] is the inbound fact ("order paid", "user signed in").
//! - [`TaskCompletedMessage`] is the best-effort announcement sent to the broker.
//! - [`EventBus`] is the transport seam; [`InMemoryEventBus`] backs tests/dev.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{BusError, EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::{Event, TaskCompletedMessage, TaskEvent};
pub use in_memory_bus::InMemoryEventBus;
