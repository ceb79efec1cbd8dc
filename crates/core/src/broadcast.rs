// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcaster: multi-subscriber fan-out of a single event stream.
//!
//! Built on a bounded `tokio::sync::mpsc::channel` per subscriber — the same
//! primitive the teacher uses to move agent events out of a background task
//! in `adapters/agent/coop/ws.rs`'s `event_bridge`, here generalized to an
//! arbitrary number of concurrent subscribers instead of one. `publish` is
//! non-blocking: a subscriber whose buffer is full has its newest event
//! dropped and is flagged lagging, rather than ever blocking the publisher.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Subscribers<T> {
    senders: Mutex<HashMap<u64, mpsc::Sender<T>>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self { senders: Mutex::new(HashMap::new()) }
    }
}

pub struct Broadcaster<T: Clone + Send + 'static> {
    subscribers: Arc<Subscribers<T>>,
    next_id: AtomicU64,
    capacity: usize,
}

impl<T: Clone + Send + 'static> Broadcaster<T> {
    pub fn new(capacity: usize) -> Self {
        Self { subscribers: Arc::default(), next_id: AtomicU64::new(0), capacity }
    }

    /// Attach a new subscriber. The returned handle removes itself from the
    /// broadcaster's subscriber list when dropped, which is this
    /// broadcaster's `Subscriber.Close()`.
    pub fn join(&self) -> Subscriber<T> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.senders.lock().insert(id, tx);
        Subscriber { id, rx, subscribers: Arc::clone(&self.subscribers) }
    }

    /// Deliver `event` to every current subscriber. Never blocks: a full
    /// subscriber buffer drops the new event and is logged as lagging
    /// rather than stalling delivery to everyone else.
    pub fn publish(&self, event: T) {
        let senders = self.subscribers.senders.lock();
        for (id, tx) in senders.iter() {
            match tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = id, "broadcaster subscriber lagging, dropping newest event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.senders.lock().len()
    }
}

pub struct Subscriber<T> {
    id: u64,
    rx: mpsc::Receiver<T>,
    subscribers: Arc<Subscribers<T>>,
}

impl<T> Subscriber<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscriber<T> {
    fn drop(&mut self) {
        self.subscribers.senders.lock().remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_delivers_to_all_subscribers_in_order() {
        let bus: Broadcaster<u32> = Broadcaster::new(4);
        let mut s1 = bus.join();
        let mut s2 = bus.join();

        bus.publish(1);
        bus.publish(2);

        assert_eq!(s1.recv().await, Some(1));
        assert_eq!(s1.recv().await, Some(2));
        assert_eq!(s2.recv().await, Some(1));
        assert_eq!(s2.recv().await, Some(2));
    }

    #[tokio::test]
    async fn dropping_subscriber_removes_it_from_the_broadcaster() {
        let bus: Broadcaster<u32> = Broadcaster::new(4);
        let sub = bus.join();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn full_buffer_drops_newest_event_without_blocking() {
        let bus: Broadcaster<u32> = Broadcaster::new(1);
        let mut sub = bus.join();
        bus.publish(1);
        bus.publish(2); // buffer full, dropped
        assert_eq!(sub.recv().await, Some(1));
        // the second publish was dropped, not queued behind the first
        drop(bus);
        assert_eq!(sub.recv().await, None);
    }
}
