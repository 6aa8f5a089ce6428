use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;

use crate::sink::{Deliver, DeliveryError};

/// Identifies one connection for the lifetime of the process.
pub type SubscriberId = u64;

/// Immutable view of the membership at one instant.
pub type Snapshot = Arc<HashMap<SubscriberId, Subscriber>>;

/// One connected listener and its outbound delivery capability.
#[derive(Clone)]
pub struct Subscriber {
    id: SubscriberId,
    sink: Arc<dyn Deliver>,
}

impl Subscriber {
    /// Pair `id` with the sink its connection drains.
    pub fn new(id: SubscriberId, sink: Arc<dyn Deliver>) -> Self {
        Self { id, sink }
    }

    /// Identifier assigned at registration.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Forward `payload` to the sink.
    ///
    /// # Errors
    /// Whatever the sink reports.
    pub fn deliver(&self, payload: &Arc<str>) -> Result<(), DeliveryError> {
        self.sink.deliver(payload)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Set of currently connected listeners.
///
/// Readers get a snapshot `Arc` that never changes under them; writers swap in
/// a new map (read-copy-update). Connection tasks insert and remove, the
/// broadcaster removes, all without a lock.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use bc_server::{SubscriberRegistry, Subscriber, ChannelSink};
///
/// let registry = SubscriberRegistry::new();
/// let (sink, _rx) = ChannelSink::bounded(4);
/// let id = registry.next_id();
/// registry.register(Subscriber::new(id, Arc::new(sink)));
/// assert_eq!(registry.snapshot().len(), 1);
/// assert!(registry.unregister(id));
/// assert!(registry.is_empty());
/// ```
pub struct SubscriberRegistry {
    members: ArcSwap<HashMap<SubscriberId, Subscriber>>,
    next_id: AtomicU64,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: ArcSwap::from_pointee(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh identifier.
    pub fn next_id(&self) -> SubscriberId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Add `sub`; replaces any member with the same id.
    pub fn register(&self, sub: Subscriber) {
        self.members.rcu(|current| {
            let mut next = (**current).clone();
            next.insert(sub.id, sub.clone());
            next
        });
    }

    /// Remove the member with `id`. Returns whether it was present.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let previous = self.members.rcu(|current| {
            let mut next = (**current).clone();
            next.remove(&id);
            next
        });
        previous.contains_key(&id)
    }

    /// Remove every id in `ids` in a single swap. Returns how many were present.
    pub fn unregister_all(&self, ids: &[SubscriberId]) -> usize {
        if ids.is_empty() {
            return 0;
        }
        let previous = self.members.rcu(|current| {
            let mut next = (**current).clone();
            for id in ids {
                next.remove(id);
            }
            next
        });
        ids.iter().filter(|id| previous.contains_key(id)).count()
    }

    /// Current membership. Later changes do not affect the returned map.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.members.load_full()
    }

    /// Number of connected listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.load().len()
    }

    /// `true` when nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.load().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ChannelSink;

    fn subscriber(registry: &SubscriberRegistry) -> (Subscriber, flume::Receiver<Arc<str>>) {
        let (sink, rx) = ChannelSink::bounded(4);
        (Subscriber::new(registry.next_id(), Arc::new(sink)), rx)
    }

    #[test]
    fn ids_are_unique() {
        let registry = SubscriberRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_changes() {
        let registry = SubscriberRegistry::new();
        let (a, _ra) = subscriber(&registry);
        let a_id = a.id();
        registry.register(a);

        let before = registry.snapshot();
        let (b, _rb) = subscriber(&registry);
        registry.register(b);
        registry.unregister(a_id);

        assert_eq!(before.len(), 1);
        assert!(before.contains_key(&a_id));
        assert_eq!(registry.len(), 1);
        assert!(!registry.snapshot().contains_key(&a_id));
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = SubscriberRegistry::new();
        let (a, _ra) = subscriber(&registry);
        let id = a.id();
        registry.register(a);
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.unregister_all(&[id, id + 100]), 0);
    }

    #[test]
    fn concurrent_registration_loses_nobody() {
        let registry = Arc::new(SubscriberRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    let mut keep = Vec::new();
                    for _ in 0..25 {
                        let (sub, rx) = subscriber(&registry);
                        registry.register(sub);
                        keep.push(rx);
                    }
                    keep
                })
            })
            .collect();
        let receivers: Vec<_> = handles.into_iter().filter_map(|h| h.join().ok()).collect();
        assert_eq!(receivers.len(), 8);
        assert_eq!(registry.len(), 200);
    }
}
