//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::bus::{BusError, EventBus, Subscription};

/// In-memory pub/sub bus.
///
/// - No IO
/// - Fan-out to every live subscriber
/// - Keeps a count of accepted messages so tests can assert on publication
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<mpsc::Sender<M>>>,
    published: Mutex<u64>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages accepted by `publish` so far.
    pub fn published_count(&self) -> u64 {
        self.published.lock().map(|n| *n).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            published: Mutex::new(0),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    fn publish(&self, message: M) -> Result<(), BusError> {
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| BusError::Unavailable("subscriber lock poisoned".to_string()))?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());

        if let Ok(mut n) = self.published.lock() {
            *n += 1;
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
