//! Bounded fan-out event bus.
//!
//! One producer side, many subscribers. Each subscriber owns a bounded
//! queue; [`EventBus::emit`] never blocks and never waits for slow
//! consumers — when a subscriber's queue is full the event is dropped for
//! that subscriber and the bus-wide drop counter is incremented. Durable
//! consumers that must not miss events should drain promptly or coalesce
//! from the persisted record instead.
//!
//! The bus is closed exactly once when the producing run reaches a
//! terminal state; emits after close are silently discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Default per-subscriber queue capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// A fan-out channel for events of type `T`.
///
/// Events emitted by a single producer are delivered to every subscriber
/// in emission order. Across producers no ordering is guaranteed.
#[derive(Debug)]
pub struct EventBus<T> {
    subscribers: Mutex<Vec<mpsc::Sender<T>>>,
    capacity: usize,
    closed: AtomicBool,
    dropped: AtomicU64,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus with the default per-subscriber capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit per-subscriber capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "event bus capacity must be non-zero");
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity,
            closed: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber and return its event stream.
    ///
    /// A subscription taken after [`close`](Self::close) yields an
    /// already-terminated stream.
    pub fn subscribe(&self) -> ReceiverStream<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        if self.closed.load(Ordering::Acquire) {
            // Sender dropped immediately; the stream ends on first poll.
            return ReceiverStream::new(rx);
        }
        self.subscribers.lock().push(tx);
        ReceiverStream::new(rx)
    }

    /// Offer an event to every subscriber without blocking.
    ///
    /// Slow subscribers with a full queue miss the event; each miss
    /// increments the drop counter. Emits after close are discarded.
    pub fn emit(&self, event: T) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Close the bus, ending every subscriber stream after it drains.
    ///
    /// Idempotent; later calls are no-ops.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.subscribers.lock().clear();
    }

    /// Whether the bus has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Total events dropped across all subscribers since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn delivers_in_emission_order() {
        let bus = EventBus::new();
        let stream = bus.subscribe();

        for i in 0..5u32 {
            bus.emit(i);
        }
        bus.close();

        let received: Vec<u32> = stream.collect().await;
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn fans_out_to_all_subscribers() {
        let bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.emit("hello");
        bus.close();

        assert_eq!(a.collect::<Vec<_>>().await, vec!["hello"]);
        assert_eq!(b.collect::<Vec<_>>().await, vec!["hello"]);
    }

    #[tokio::test]
    async fn drops_for_full_subscriber_and_counts() {
        let bus = EventBus::with_capacity(2);
        let stream = bus.subscribe();

        bus.emit(1u32);
        bus.emit(2);
        // Queue full: this one is dropped for the slow subscriber.
        bus.emit(3);

        assert_eq!(bus.dropped(), 1);
        bus.close();
        assert_eq!(stream.collect::<Vec<_>>().await, vec![1, 2]);
    }

    #[tokio::test]
    async fn emit_after_close_is_discarded() {
        let bus = EventBus::new();
        let stream = bus.subscribe();

        bus.emit(1u32);
        bus.close();
        bus.emit(2);

        assert_eq!(stream.collect::<Vec<_>>().await, vec![1]);
        assert_eq!(bus.dropped(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let bus = EventBus::<u32>::new();
        bus.close();
        bus.close();
        assert!(bus.is_closed());
    }

    #[tokio::test]
    async fn subscribe_after_close_yields_ended_stream() {
        let bus = EventBus::<u32>::new();
        bus.close();
        let events: Vec<u32> = bus.subscribe().collect().await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn dead_subscribers_are_pruned() {
        let bus = EventBus::new();
        let stream = bus.subscribe();
        drop(stream);

        bus.emit(1u32);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn zero_capacity_panics() {
        let _ = EventBus::<u32>::with_capacity(0);
    }
}
