//! Registry of live subscribers and fan-out of catalog events.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use metrics::{counter, gauge};
use perpus_api_types::LiveEvent;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

pub(crate) const METRIC_LIVE_SUBSCRIBERS: &str = "perpus_live_subscribers";
pub(crate) const METRIC_LIVE_PUBLISHED: &str = "perpus_live_events_published_total";
pub(crate) const METRIC_LIVE_EVICTED: &str = "perpus_live_evicted_total";

/// Encoded JSON body of one stream frame.
pub type Frame = Arc<str>;

pub type SubscriberId = u64;

/// Lifecycle of one subscriber as seen through its handle. `Disconnected` is terminal.
///
/// A subscriber moves from connecting to `Connected` to `Disconnected`. The
/// connecting phase is the span inside [`EventBroadcaster::connect_with`] that
/// writes the acknowledgment frame before registering, and it ends before a
/// handle exists, so a handle starts out `Connected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Connected,
    Disconnected,
}

/// Outcome of a single [`EventBroadcaster::publish`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Subscribers whose buffer was full; they miss this event only.
    pub lagged: usize,
    /// Subscribers removed because their channel was closed.
    pub evicted: usize,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("subscriber channel closed before acknowledgment")]
    Closed,
    #[error("subscriber channel has no room for the acknowledgment")]
    Full,
    #[error("failed to encode live event: {0}")]
    Encode(#[from] serde_json::Error),
}

struct Registry {
    next_id: AtomicU64,
    subscribers: DashMap<SubscriberId, mpsc::Sender<Frame>>,
    buffer: usize,
}

impl Registry {
    fn remove(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        if removed {
            gauge!(METRIC_LIVE_SUBSCRIBERS).set(self.subscribers.len() as f64);
        }
        removed
    }
}

/// Shared handle to the subscriber registry. Cloning is cheap.
#[derive(Clone)]
pub struct EventBroadcaster {
    registry: Arc<Registry>,
}

impl EventBroadcaster {
    /// Create a broadcaster whose [`connect`](Self::connect) channels hold `buffer` frames.
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                subscribers: DashMap::new(),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Open a bounded channel and register its sending half.
    pub fn connect(&self) -> Result<(SubscriberHandle, mpsc::Receiver<Frame>), ConnectError> {
        let (sender, receiver) = mpsc::channel(self.registry.buffer);
        let handle = self.connect_with(sender)?;
        Ok((handle, receiver))
    }

    /// Register a caller-supplied channel.
    ///
    /// The acknowledgment frame is written before the subscriber becomes
    /// visible to [`publish`](Self::publish), so it is always the first frame.
    pub fn connect_with(
        &self,
        sender: mpsc::Sender<Frame>,
    ) -> Result<SubscriberHandle, ConnectError> {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let ack: Frame = serde_json::to_string(&LiveEvent::connected())?.into();

        match sender.try_send(ack) {
            Ok(()) => {}
            Err(TrySendError::Closed(_)) => return Err(ConnectError::Closed),
            Err(TrySendError::Full(_)) => return Err(ConnectError::Full),
        }

        self.registry.subscribers.insert(id, sender);
        let total = self.registry.subscribers.len();
        gauge!(METRIC_LIVE_SUBSCRIBERS).set(total as f64);
        info!(subscriber = id, total, "live subscriber connected");

        Ok(SubscriberHandle {
            id,
            registry: self.registry.clone(),
        })
    }

    /// Remove a subscriber. Unknown or already removed ids are ignored.
    pub fn disconnect(&self, id: SubscriberId) {
        if self.registry.remove(id) {
            info!(subscriber = id, "live subscriber disconnected");
        }
    }

    /// Send `event` to every registered subscriber.
    ///
    /// Never fails: an unencodable event is logged and dropped, and
    /// subscribers whose channel has closed are evicted before returning.
    pub fn publish(&self, event: &LiveEvent) -> Delivery {
        let frame: Frame = match serde_json::to_string(event) {
            Ok(json) => json.into(),
            Err(err) => {
                warn!(event = event.kind(), error = %err, "failed to encode live event");
                return Delivery::default();
            }
        };

        let mut delivery = Delivery::default();
        let mut closed = Vec::new();

        for entry in self.registry.subscribers.iter() {
            match entry.value().try_send(frame.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    delivery.lagged += 1;
                    debug!(
                        subscriber = *entry.key(),
                        event = event.kind(),
                        "subscriber lagging; frame dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards stay read-locked while iterating.
        for id in &closed {
            if self.registry.remove(*id) {
                delivery.evicted += 1;
            }
        }

        counter!(METRIC_LIVE_PUBLISHED, "event" => event.kind()).increment(1);
        if delivery.evicted > 0 {
            counter!(METRIC_LIVE_EVICTED).increment(delivery.evicted as u64);
        }
        debug!(
            event = event.kind(),
            delivered = delivery.delivered,
            lagged = delivery.lagged,
            evicted = delivery.evicted,
            "published live event"
        );

        delivery
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.subscribers.len()
    }

    pub fn is_connected(&self, id: SubscriberId) -> bool {
        self.registry.subscribers.contains_key(&id)
    }

    /// Drop every subscriber, which ends their streams.
    pub fn disconnect_all(&self) -> usize {
        let count = self.registry.subscribers.len();
        self.registry.subscribers.clear();
        gauge!(METRIC_LIVE_SUBSCRIBERS).set(0.0);
        if count > 0 {
            info!(count, "closed all live subscribers");
        }
        count
    }
}

/// Registration returned by [`EventBroadcaster::connect`].
///
/// Dropping the handle disconnects the subscriber.
pub struct SubscriberHandle {
    id: SubscriberId,
    registry: Arc<Registry>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        if self.registry.subscribers.contains_key(&self.id) {
            SubscriberState::Connected
        } else {
            SubscriberState::Disconnected
        }
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            debug!(subscriber = self.id, "live subscriber dropped");
        }
    }
}

impl std::fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
