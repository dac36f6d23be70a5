//! Change notification with replay-latest semantics.

use parking_lot::Mutex;
use std::sync::mpsc;

struct PublisherInner<V> {
    latest: Option<V>,
    senders: Vec<mpsc::Sender<V>>,
}

/// A per-instance publisher that fans values out to subscribers.
///
/// The latest published value is replayed to every newly attached
/// subscriber, so late subscribers see the current state immediately.
/// Disconnected subscribers are pruned on the next publish.
pub struct ChangePublisher<V> {
    inner: Mutex<PublisherInner<V>>,
}

impl<V: Clone> ChangePublisher<V> {
    /// Creates a publisher with no subscribers and no value.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(PublisherInner {
                latest: None,
                senders: Vec::new(),
            }),
        }
    }

    /// Publishes a value to every live subscriber.
    pub fn publish(&self, value: V) {
        let mut inner = self.inner.lock();
        inner.latest = Some(value.clone());
        inner
            .senders
            .retain(|sender| sender.send(value.clone()).is_ok());
    }

    /// Attaches a subscriber.
    ///
    /// If a value was ever published, the subscription starts with it.
    pub fn subscribe(&self) -> Subscription<V> {
        let (sender, receiver) = mpsc::channel();
        let mut inner = self.inner.lock();
        if let Some(latest) = &inner.latest {
            // A just-created channel cannot be disconnected.
            let _ = sender.send(latest.clone());
        }
        inner.senders.push(sender);
        Subscription { receiver }
    }

    /// Returns the latest published value, if any.
    pub fn latest(&self) -> Option<V> {
        self.inner.lock().latest.clone()
    }

    /// Returns the number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().senders.len()
    }
}

impl<V: Clone> Default for ChangePublisher<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream of published values.
///
/// Dropping the subscription detaches it from the publisher.
pub struct Subscription<V> {
    receiver: mpsc::Receiver<V>,
}

impl<V> Subscription<V> {
    /// Blocks until the next value, or `None` if the publisher is gone.
    pub fn recv(&self) -> Option<V> {
        self.receiver.recv().ok()
    }

    /// Returns the next value if one is ready.
    pub fn try_recv(&self) -> Option<V> {
        self.receiver.try_recv().ok()
    }

    /// Drains every value currently buffered.
    pub fn drain(&self) -> Vec<V> {
        let mut values = Vec::new();
        while let Ok(value) = self.receiver.try_recv() {
            values.push(value);
        }
        values
    }
}
