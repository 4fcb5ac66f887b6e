//! Bounded outbound queues between a session and its writer tasks.
//!
//! Cosmetic packets (entity moves, motion, the player's own position) carry
//! a [`CoalesceKey`]: a newer packet with the same key replaces the queued
//! one in place, and a cosmetic packet with a new key is dropped while the
//! queue is full. Reliable items are always queued.

use ahash::AHashMap;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};
use tokio::sync::Notify;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoalesceKey {
    /// Absolute move of a Bedrock runtime entity.
    EntityMove(u64),
    EntityMotion(u64),
    /// The player's position sent to the Java server.
    PlayerMove,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Reliable,
    Coalesce(CoalesceKey),
}

/// What happened to a pushed item.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Enqueued {
    Queued,
    Replaced,
    Dropped,
    Closed,
}

struct Inner<T> {
    items: VecDeque<Option<T>>,
    /// Sequence number of `items[0]`.
    head: u64,
    keyed: AHashMap<CoalesceKey, u64>,
    keys: VecDeque<Option<CoalesceKey>>,
    live: usize,
    dropped: u64,
    closed: bool,
}

pub struct OutboundQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
    capacity: usize,
}

impl<T> OutboundQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                head: 0,
                keyed: AHashMap::new(),
                keys: VecDeque::new(),
                live: 0,
                dropped: 0,
                closed: false,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panic while holding the lock cannot leave the queue inconsistent.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, item: T, delivery: Delivery) -> Enqueued {
        let mut inner = self.lock();
        if inner.closed {
            return Enqueued::Closed;
        }

        let outcome = match delivery {
            Delivery::Coalesce(key) => {
                if let Some(&sequence) = inner.keyed.get(&key) {
                    let index = (sequence - inner.head) as usize;
                    inner.items[index] = Some(item);
                    Enqueued::Replaced
                } else if inner.live >= self.capacity {
                    inner.dropped += 1;
                    if inner.dropped % 256 == 1 {
                        tracing::debug!("Outbound queue full, dropped {} cosmetic packets", inner.dropped);
                    }
                    Enqueued::Dropped
                } else {
                    let sequence = inner.head + inner.items.len() as u64;
                    inner.keyed.insert(key, sequence);
                    inner.items.push_back(Some(item));
                    inner.keys.push_back(Some(key));
                    inner.live += 1;
                    Enqueued::Queued
                }
            }
            Delivery::Reliable => {
                inner.items.push_back(Some(item));
                inner.keys.push_back(None);
                inner.live += 1;
                Enqueued::Queued
            }
        };
        drop(inner);
        if outcome == Enqueued::Queued {
            self.notify.notify_one();
        }
        outcome
    }

    /// Takes everything queued, in order.
    pub fn drain(&self) -> Vec<T> {
        let mut inner = self.lock();
        let mut out = Vec::with_capacity(inner.live);
        while let Some(item) = inner.items.pop_front() {
            let key = inner.keys.pop_front().flatten();
            let sequence = inner.head;
            inner.head += 1;
            if let Some(key) = key {
                if inner.keyed.get(&key) == Some(&sequence) {
                    inner.keyed.remove(&key);
                }
            }
            if let Some(item) = item {
                out.push(item);
            }
        }
        inner.live = 0;
        out
    }

    /// Waits until items are queued and takes them all. Returns `None` once
    /// the queue is closed and empty.
    ///
    /// There must be a single consumer.
    pub async fn next_batch(&self) -> Option<Vec<T>> {
        loop {
            let batch = self.drain();
            if !batch.is_empty() {
                return Some(batch);
            }
            if self.lock().closed {
                return None;
            }
            self.notify.notified().await;
        }
    }

    /// Stops accepting items. Items already queued are still delivered.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().live
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cosmetic packets dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{sync::Arc, time::Duration};

    #[test]
    fn newer_cosmetic_packets_replace_queued_ones() {
        let queue = OutboundQueue::new(8);
        queue.push("spawn", Delivery::Reliable);
        queue.push("move-1", Delivery::Coalesce(CoalesceKey::EntityMove(5)));
        queue.push("slot", Delivery::Reliable);
        assert_eq!(
            queue.push("move-2", Delivery::Coalesce(CoalesceKey::EntityMove(5))),
            Enqueued::Replaced
        );
        queue.push("other", Delivery::Coalesce(CoalesceKey::EntityMove(6)));
        assert_eq!(queue.drain(), ["spawn", "move-2", "slot", "other"]);

        // The key is free again once drained.
        assert_eq!(
            queue.push("move-3", Delivery::Coalesce(CoalesceKey::EntityMove(5))),
            Enqueued::Queued
        );
    }

    #[test]
    fn full_queues_drop_cosmetic_but_keep_reliable_packets() {
        let queue = OutboundQueue::new(2);
        queue.push(1, Delivery::Reliable);
        queue.push(2, Delivery::Coalesce(CoalesceKey::PlayerMove));
        assert_eq!(
            queue.push(3, Delivery::Coalesce(CoalesceKey::EntityMotion(1))),
            Enqueued::Dropped
        );
        assert_eq!(
            queue.push(4, Delivery::Coalesce(CoalesceKey::PlayerMove)),
            Enqueued::Replaced
        );
        assert_eq!(queue.push(5, Delivery::Reliable), Enqueued::Queued);
        assert_eq!(queue.drain(), [1, 4, 5]);
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn closed_queues_refuse_items() {
        let queue = OutboundQueue::new(2);
        queue.close();
        assert_eq!(queue.push(1, Delivery::Reliable), Enqueued::Closed);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn writers_wake_on_push_and_finish_on_close() {
        let queue = Arc::new(OutboundQueue::new(4));
        let writer = tokio::spawn({
            let queue = Arc::clone(&queue);
            async move {
                let mut seen = Vec::new();
                while let Some(batch) = queue.next_batch().await {
                    seen.extend(batch);
                }
                seen
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push(1, Delivery::Reliable);
        queue.push(2, Delivery::Reliable);
        queue.close();
        assert_eq!(writer.await.unwrap(), [1, 2]);
    }
}
