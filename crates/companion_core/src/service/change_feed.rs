//! Collection change notifications with scoped subscriptions.
//!
//! # Invariants
//! - Dropping a `Subscription` unsubscribes its callback.
//! - Callbacks run outside the registry lock and may re-enter the feed.

use crate::model::entity::CollectionKey;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, Weak};

/// Published after every committed collection write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionChange {
    pub key: CollectionKey,
    /// Active entity count after the write.
    pub len: usize,
}

impl CollectionChange {
    pub fn has_content(&self) -> bool {
        self.len > 0
    }
}

type Callback = Arc<dyn Fn(&CollectionChange) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    callbacks: BTreeMap<u64, Callback>,
}

/// Fan-out point for `CollectionChange` events.
#[derive(Clone, Default)]
pub struct ChangeFeed {
    registry: Arc<Mutex<Registry>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` until the returned handle is dropped.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(
        &self,
        callback: impl Fn(&CollectionChange) + Send + Sync + 'static,
    ) -> Subscription {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.callbacks.insert(id, Arc::new(callback));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn publish(&self, change: CollectionChange) {
        let callbacks = lock(&self.registry)
            .callbacks
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for callback in callbacks {
            callback(&change);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).callbacks.len()
    }
}

/// Live registration on a `ChangeFeed`.
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).callbacks.remove(&self.id);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> std::sync::MutexGuard<'_, Registry> {
    // Callbacks never run under the lock; a poisoned registry is still consistent.
    registry
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
