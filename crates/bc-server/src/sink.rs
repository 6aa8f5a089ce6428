use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

/// Why a single delivery did not happen.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The peer is gone; the subscriber must be pruned.
    #[error("connexion fermée")]
    Closed,

    /// The peer is still there but has not drained earlier values; this one is dropped.
    #[error("abonné en retard")]
    Lagging,
}

/// Outbound delivery capability of one subscriber.
///
/// CONTRAT : ne doit PAS bloquer. Appelé depuis le thread de capture.
pub trait Deliver: Send + Sync {
    /// Hand `payload` to the subscriber's connection.
    ///
    /// # Errors
    /// `Closed` once the connection has gone away, `Lagging` if it cannot take more yet.
    fn deliver(&self, payload: &Arc<str>) -> Result<(), DeliveryError>;
}

/// Latest-value-wins sink backed by a `tokio::sync::watch` channel.
///
/// A slow connection only ever sees the newest payload; older ones are overwritten.
pub struct WatchSink {
    tx: watch::Sender<Option<Arc<str>>>,
}

impl WatchSink {
    /// Create the sink and the receiver its connection task forwards from.
    #[must_use]
    pub fn channel() -> (Self, watch::Receiver<Option<Arc<str>>>) {
        let (tx, rx) = watch::channel(None);
        (Self { tx }, rx)
    }
}

impl Deliver for WatchSink {
    fn deliver(&self, payload: &Arc<str>) -> Result<(), DeliveryError> {
        self.tx
            .send(Some(Arc::clone(payload)))
            .map_err(|_| DeliveryError::Closed)
    }
}

/// Bounded-queue sink backed by a flume channel.
///
/// The WebSocket server uses [`WatchSink`]. This one is for in-process
/// consumers that want every value up to `capacity`, and is the only sink
/// that reports [`DeliveryError::Lagging`].
pub struct ChannelSink {
    tx: flume::Sender<Arc<str>>,
}

impl ChannelSink {
    /// Create the sink with room for `capacity` undelivered payloads.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, flume::Receiver<Arc<str>>) {
        let (tx, rx) = flume::bounded(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl Deliver for ChannelSink {
    fn deliver(&self, payload: &Arc<str>) -> Result<(), DeliveryError> {
        self.tx.try_send(Arc::clone(payload)).map_err(|e| match e {
            flume::TrySendError::Full(_) => DeliveryError::Lagging,
            flume::TrySendError::Disconnected(_) => DeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_sink_keeps_only_the_newest_payload() {
        let (sink, mut rx) = WatchSink::channel();
        for v in ["a", "b", "c"] {
            assert_eq!(sink.deliver(&Arc::from(v)), Ok(()));
        }
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().as_deref(), Some("c"));
    }

    #[test]
    fn watch_sink_reports_closed_once_receiver_is_gone() {
        let (sink, rx) = WatchSink::channel();
        drop(rx);
        assert_eq!(sink.deliver(&Arc::from("x")), Err(DeliveryError::Closed));
    }

    #[test]
    fn channel_sink_distinguishes_full_from_closed() {
        let (sink, rx) = ChannelSink::bounded(1);
        assert_eq!(sink.deliver(&Arc::from("1")), Ok(()));
        assert_eq!(sink.deliver(&Arc::from("2")), Err(DeliveryError::Lagging));
        assert_eq!(rx.try_recv().ok().as_deref(), Some("1"));
        drop(rx);
        assert_eq!(sink.deliver(&Arc::from("3")), Err(DeliveryError::Closed));
    }
}
