use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bc_core::traits::Publisher;
use bc_core::value::{NormalizedValue, ValueMessage};

use crate::registry::{SubscriberId, SubscriberRegistry};
use crate::sink::DeliveryError;

/// Outcome of one [`Broadcaster::publish`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that accepted the value.
    pub delivered: usize,
    /// Subscribers found closed and removed.
    pub pruned: usize,
    /// Subscribers still connected that skipped this value.
    pub lagging: usize,
}

/// Fans one value out to every registered subscriber.
///
/// Works on a snapshot of the registry: members added during a publish wait
/// for the next one. Closed members are collected during the pass and
/// removed afterwards in one registry update.
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
    published: AtomicU64,
}

impl Broadcaster {
    /// Broadcast to the members of `registry`.
    #[must_use]
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self {
            registry,
            published: AtomicU64::new(0),
        }
    }

    /// Deliver `value` to every current subscriber, pruning closed ones.
    pub fn broadcast(&self, value: NormalizedValue) -> PublishReport {
        let payload: Arc<str> = match ValueMessage::from(value).to_json() {
            Ok(text) => Arc::from(text),
            Err(e) => {
                log::error!("Sérialisation impossible : {e}");
                return PublishReport::default();
            }
        };

        let snapshot = self.registry.snapshot();
        let mut report = PublishReport::default();
        let mut dead: Vec<SubscriberId> = Vec::new();

        for (id, sub) in snapshot.iter() {
            match sub.deliver(&payload) {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Closed) => dead.push(*id),
                Err(DeliveryError::Lagging) => {
                    log::trace!("Subscriber {id} lagging, value {value} skipped");
                    report.lagging += 1;
                }
            }
        }

        report.pruned = self.registry.unregister_all(&dead);
        if report.pruned > 0 {
            log::debug!(
                "Pruned {} closed subscriber(s), {} remaining",
                report.pruned,
                self.registry.len()
            );
        }

        self.published.fetch_add(1, Ordering::Relaxed);
        report
    }

    /// Values broadcast since start.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// The registry this broadcaster reads.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }
}

impl Publisher for Broadcaster {
    fn publish(&self, value: NormalizedValue) {
        self.broadcast(value);
    }
}
