//! Subscriber registry, fan-out broadcaster, and WebSocket push transport.
//!
//! The capture thread calls [`Broadcaster::publish`] synchronously; each
//! connection is a tokio task that owns the receiving half of its
//! subscriber's sink and forwards whatever arrives to the socket.

pub mod broadcast;
pub mod registry;
pub mod sink;
pub mod ws;

pub use broadcast::{Broadcaster, PublishReport};
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry};
pub use sink::{ChannelSink, Deliver, DeliveryError, WatchSink};
pub use ws::PushServer;
