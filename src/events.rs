//! Typed publish points.
//!
//! One [`Publisher`] per output stream. Subscribers are called synchronously
//! on the publishing thread, in subscription order, with no lock held: a
//! callback may subscribe or unsubscribe on the same publisher. Those changes
//! take effect from the next publish. A panicking callback does not disable
//! the others.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type Callback<T> = Box<dyn FnMut(&T) + Send + 'static>;

/// Handle returned by [`Publisher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ids are unique across every publisher in the process.
static NEXT_SUBSCRIPTION: AtomicU64 = AtomicU64::new(0);

/// `None` while the callback is out being called.
type Slot<T> = (SubscriptionId, Option<Callback<T>>);

struct Inner<T: ?Sized> {
    subscribers: Mutex<Vec<Slot<T>>>,
}

impl<T: ?Sized> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Vec<Slot<T>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Callbacks taken out for one publish. Dropping it, normally or while
/// unwinding, hands them back to subscriptions that still exist.
struct InFlight<'a, T: ?Sized> {
    inner: &'a Inner<T>,
    taken: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T: ?Sized> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        let mut subs = self.inner.lock();
        for (id, callback) in self.taken.drain(..) {
            if let Some(slot) = subs.iter_mut().find(|(sid, _)| *sid == id) {
                slot.1 = Some(callback);
            }
        }
    }
}

/// Fan-out of `&T` payloads to subscribers. Clones share subscribers.
pub struct Publisher<T: ?Sized> {
    inner: Arc<Inner<T>>,
}

impl<T: ?Sized> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Publisher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&T) + Send + 'static,
    {
        let id = SubscriptionId(NEXT_SUBSCRIPTION.fetch_add(1, Ordering::Relaxed));
        self.inner.lock().push((id, Some(Box::new(callback))));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.inner.lock();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().len()
    }

    /// Deliver `payload` to every subscriber.
    pub fn publish(&self, payload: &T) {
        let mut in_flight = InFlight {
            inner: &self.inner,
            taken: self
                .inner
                .lock()
                .iter_mut()
                .filter_map(|(id, slot)| slot.take().map(|cb| (*id, cb)))
                .collect(),
        };
        for (_, callback) in in_flight.taken.iter_mut() {
            callback(payload);
        }
    }
}

/// Recoverable problems reported from a running session. None of them stop
/// the session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineFault {
    /// The audio source failed to open; lip sync is off, emotion still runs.
    Capture { message: String },
    /// A frame produced non-finite features; previous weights were kept.
    NumericalFault { sequence: u64 },
    /// `set_emotion` got a label with no preset; neutral was used.
    UnknownEmotion { label: String },
}
