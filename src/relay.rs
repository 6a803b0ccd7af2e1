//! Single-slot replaying broadcast channel.
//!
//! A [`Relay`] keeps only the most recently published value. Every subscriber
//! that attaches later receives that value immediately, then every value
//! published afterwards. Nothing older than the latest value is ever replayed.
//!
//! Delivery is synchronous: [`Relay::publish`] returns only after every
//! subscriber callback has run. Callbacks run outside of the relay's internal
//! lock, so a callback may publish into another relay and may subscribe or
//! unsubscribe without deadlocking. This is what lets the list pipeline chain
//! sort → filter → search → table as plain relays.
//!
//! A publish into a relay that is already delivering is queued and delivered
//! by the outer call once the current round is done, so every subscriber sees
//! values in publish order and ends on [`Relay::latest`].

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Subscriber<T> {
    id: u64,
    /// Sequence number of the value replayed on subscribe.
    since: u64,
    callback: Callback<T>,
}

struct Slot<T> {
    latest: Option<T>,
    /// Sequence number of `latest`.
    seq: u64,
    subscribers: Vec<Subscriber<T>>,
    pending: VecDeque<(u64, T)>,
    delivering: bool,
}

/// Unblocks the relay if a subscriber callback panics mid-delivery.
struct DeliveryRound<'a, T> {
    slot: &'a Mutex<Slot<T>>,
    finished: bool,
}

impl<T> Drop for DeliveryRound<'_, T> {
    fn drop(&mut self) {
        if !self.finished {
            let mut slot = self.slot.lock();
            slot.delivering = false;
            slot.pending.clear();
        }
    }
}

/// Shared single-slot broadcast channel. Cloning yields another handle to the
/// same channel.
pub struct Relay<T> {
    slot: Arc<Mutex<Slot<T>>>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for Relay<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Relay<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Relay<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("Relay")
            .field("has_value", &slot.latest.is_some())
            .field("subscribers", &slot.subscribers.len())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Relay<T> {
    /// Create an empty relay. Subscribers receive nothing until the first publish.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                latest: None,
                seq: 0,
                subscribers: Vec::new(),
                pending: VecDeque::new(),
                delivering: false,
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Create a relay already holding `value`.
    pub fn with_value(value: T) -> Self {
        let relay = Self::new();
        relay.slot.lock().latest = Some(value);
        relay
    }

    /// Store `value` as the latest and deliver it to every current subscriber.
    /// Called from inside a delivery of this relay, the value is queued behind
    /// the current round instead.
    pub fn publish(&self, value: T) {
        let mut slot = self.slot.lock();
        slot.seq += 1;
        let seq = slot.seq;
        slot.latest = Some(value.clone());
        slot.pending.push_back((seq, value));
        if slot.delivering {
            return;
        }
        slot.delivering = true;
        let mut round = DeliveryRound {
            slot: &self.slot,
            finished: false,
        };
        while let Some((seq, value)) = slot.pending.pop_front() {
            // Subscribers that attached after `seq` already got a newer replay.
            let targets: Vec<Callback<T>> = slot
                .subscribers
                .iter()
                .filter(|sub| sub.since < seq)
                .map(|sub| Arc::clone(&sub.callback))
                .collect();
            drop(slot);
            for cb in targets {
                cb(&value);
            }
            slot = self.slot.lock();
        }
        slot.delivering = false;
        round.finished = true;
    }

    /// Clone of the most recently published value, if any.
    pub fn latest(&self) -> Option<T> {
        self.slot.lock().latest.clone()
    }

    /// Attach a subscriber. The latest value (if any) is delivered before this
    /// returns. Dropping the returned [`Subscription`] detaches the callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Callback<T> = Arc::new(callback);
        let replay = {
            let mut slot = self.slot.lock();
            let since = slot.seq;
            slot.subscribers.push(Subscriber {
                id,
                since,
                callback: Arc::clone(&callback),
            });
            slot.latest.clone()
        };
        if let Some(value) = replay {
            callback(&value);
        }

        let weak: Weak<Mutex<Slot<T>>> = Arc::downgrade(&self.slot);
        Subscription::new(move || {
            if let Some(slot) = weak.upgrade() {
                slot.lock().subscribers.retain(|sub| sub.id != id);
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.slot.lock().subscribers.len()
    }
}

/// Handle for one attached subscriber. Detaches on drop.
#[must_use = "dropping a Subscription detaches it immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Detach now. Equivalent to dropping the handle.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
