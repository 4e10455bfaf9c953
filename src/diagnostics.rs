//! Wire-level diagnostics fan-out.
//!
//! The engine publishes every line it sends (`< …`) and receives (`> …`)
//! through a [`DiagnosticsSender`], with the `PASS oauth:` line redacted.
//! Hosts subscribe a handler at a minimum severity and get a
//! [`Subscription`] they can use to stop receiving messages.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Handler receiving `(sender_name, level, message)` for each diagnostic.
pub type DiagnosticHandler = Box<dyn Fn(&str, usize, &str) + Send + Sync>;

struct Subscriber {
    min_level: usize,
    handler: DiagnosticHandler,
}

struct Registry {
    next_id: u64,
    subscribers: HashMap<u64, Subscriber>,
}

/// Publishes diagnostic messages to any number of subscribers.
pub struct DiagnosticsSender {
    name: String,
    registry: Arc<Mutex<Registry>>,
}

impl DiagnosticsSender {
    /// Create a sender whose messages carry the given sender name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: Arc::new(Mutex::new(Registry {
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    /// Subscribe a handler to messages at or above `min_level`.
    ///
    /// The subscription stays active until [`Subscription::unsubscribe`] is
    /// called; dropping the returned handle does not cancel it.
    pub fn subscribe(&self, handler: DiagnosticHandler, min_level: usize) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.subscribers.insert(id, Subscriber { min_level, handler });
        Subscription {
            registry: Arc::clone(&self.registry),
            id,
        }
    }

    /// Publish one message to every subscriber interested in `level`.
    pub fn send(&self, level: usize, message: &str) {
        let registry = lock(&self.registry);
        for subscriber in registry.subscribers.values() {
            if level >= subscriber.min_level {
                (subscriber.handler)(&self.name, level, message);
            }
        }
    }
}

/// Handle for an active diagnostics subscription.
pub struct Subscription {
    registry: Arc<Mutex<Registry>>,
    id: u64,
}

impl Subscription {
    /// Stop delivering messages to this subscriber.
    pub fn unsubscribe(self) {
        lock(&self.registry).subscribers.remove(&self.id);
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
