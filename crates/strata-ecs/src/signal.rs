//! Notification channels
//!
//! [`Signal`] is a synchronous multicast channel: observers run on the
//! emitting call stack, in subscription order, and only see values emitted
//! while they are subscribed. Subscriptions are released explicitly, either
//! one at a time or in batches through a [`DisposeBag`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct SignalInner<T> {
    observers: Mutex<Vec<(u64, Observer<T>)>>,
    next_id: AtomicU64,
}

impl<T> SignalInner<T> {
    fn is_subscribed(&self, id: u64) -> bool {
        self.observers.lock().iter().any(|(observer_id, _)| *observer_id == id)
    }
}

/// Type-erased access to a signal for detaching observers.
trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

impl<T: 'static> Detach for SignalInner<T> {
    fn detach(&self, id: u64) {
        self.observers.lock().retain(|(observer_id, _)| *observer_id != id);
    }
}

/// Multicast, non-replaying notification channel.
///
/// Cloning a `Signal` yields another handle to the same channel.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T: 'static> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalInner {
                observers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Register an observer. It receives every value emitted until the
    /// returned [`Subscription`] is released or the signal completes.
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.observers.lock().push((id, Arc::new(observer)));
        let signal: Weak<dyn Detach> = Arc::downgrade(&self.inner) as Weak<dyn Detach>;
        Subscription {
            id,
            signal: Mutex::new(Some(signal)),
        }
    }

    /// Deliver `value` to every current observer.
    ///
    /// Observers are snapshotted first, so they may subscribe, unsubscribe
    /// or emit again while running. An observer released by an earlier one
    /// during the same emission is skipped.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, Observer<T>)> = self.inner.observers.lock().clone();
        for (id, observer) in snapshot {
            if self.inner.is_subscribed(id) {
                observer(value);
            }
        }
    }

    /// Drop every observer. Existing subscriptions become no-ops.
    pub fn complete(&self) {
        self.inner.observers.lock().clear();
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }
}

impl<T: 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("observers", &self.inner.observers.lock().len())
            .finish()
    }
}

/// Something that can release resources on demand.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// Handle to one observer registration.
///
/// Dropping the handle does not unsubscribe.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    signal: Mutex<Option<Weak<dyn Detach>>>,
}

impl Subscription {
    /// Remove the observer from its signal. Calling this again is a no-op.
    pub fn unsubscribe(&self) {
        let signal = self.signal.lock().take();
        if let Some(inner) = signal.and_then(|weak| weak.upgrade()) {
            inner.detach(self.id);
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has been called.
    pub fn is_closed(&self) -> bool {
        self.signal.lock().is_none()
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

type DisposeCallback = Box<dyn FnOnce() + Send>;

/// Batches subscriptions and callbacks so they can be released together.
///
/// Anything added after [`dispose`](Disposable::dispose) is released
/// immediately.
#[derive(Default)]
pub struct DisposeBag {
    items: Mutex<Vec<DisposeCallback>>,
    disposed: Mutex<bool>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a disposable resource.
    pub fn add<D: Disposable + 'static>(&self, item: D) {
        self.add_fn(move || item.dispose());
    }

    /// Register a callback to run on dispose.
    pub fn add_fn<F: FnOnce() + Send + 'static>(&self, callback: F) {
        if *self.disposed.lock() {
            callback();
            return;
        }
        self.items.lock().push(Box::new(callback));
    }

    /// Subscribe to `signal` and keep the subscription in this bag.
    pub fn subscribe<T, F>(&self, signal: &Signal<T>, observer: F)
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.add(signal.subscribe(observer));
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn is_disposed(&self) -> bool {
        *self.disposed.lock()
    }
}

impl Disposable for DisposeBag {
    fn dispose(&self) {
        *self.disposed.lock() = true;
        let items = std::mem::take(&mut *self.items.lock());
        for callback in items {
            callback();
        }
    }
}

impl fmt::Debug for DisposeBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeBag")
            .field("items", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, impl Fn(&u32) + Send + Sync + 'static) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        (log, move |v: &u32| sink.lock().push(*v))
    }

    #[test]
    fn multicast_to_all_observers() {
        let signal = Signal::<u32>::new();
        let (a, obs_a) = recorder();
        let (b, obs_b) = recorder();
        let _sa = signal.subscribe(obs_a);
        let _sb = signal.subscribe(obs_b);

        signal.emit(&1);
        signal.emit(&2);
        assert_eq!(*a.lock(), vec![1, 2]);
        assert_eq!(*b.lock(), vec![1, 2]);
    }

    #[test]
    fn late_subscriber_sees_no_history() {
        let signal = Signal::<u32>::new();
        signal.emit(&1);
        let (log, observer) = recorder();
        let _sub = signal.subscribe(observer);
        signal.emit(&2);
        assert_eq!(*log.lock(), vec![2]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let signal = Signal::<u32>::new();
        let (log, observer) = recorder();
        let sub = signal.subscribe(observer);
        signal.emit(&1);
        sub.unsubscribe();
        sub.unsubscribe();
        signal.emit(&2);
        assert!(sub.is_closed());
        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn observer_released_mid_emission_is_skipped() {
        let signal = Signal::<u32>::new();
        let second: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot = second.clone();
        let _first = signal.subscribe(move |_| {
            if let Some(sub) = slot.lock().as_ref() {
                sub.unsubscribe();
            }
        });
        let counter = calls.clone();
        *second.lock() = Some(signal.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        signal.emit(&0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn reentrant_emit_and_subscribe() {
        let signal = Signal::<u32>::new();
        let (log, observer) = recorder();
        let _log_sub = signal.subscribe(observer);

        let inner = signal.clone();
        let _relay = signal.subscribe(move |v| {
            if *v < 3 {
                inner.emit(&(v + 1));
            }
        });

        signal.emit(&1);
        assert_eq!(*log.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn complete_drops_observers() {
        let signal = Signal::<u32>::new();
        let (log, observer) = recorder();
        let sub = signal.subscribe(observer);
        signal.complete();
        signal.emit(&1);
        assert!(log.lock().is_empty());
        assert_eq!(signal.observer_count(), 0);
        sub.unsubscribe();
    }

    #[test]
    fn dispose_bag_releases_everything() {
        let signal = Signal::<u32>::new();
        let bag = DisposeBag::new();
        let (log, observer) = recorder();
        bag.subscribe(&signal, observer);
        let (other, observer) = recorder();
        bag.add(signal.subscribe(observer));

        let callbacks = Arc::new(AtomicUsize::new(0));
        let counter = callbacks.clone();
        bag.add_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(bag.len(), 3);

        signal.emit(&1);
        bag.dispose();
        signal.emit(&2);

        assert_eq!(*log.lock(), vec![1]);
        assert_eq!(*other.lock(), vec![1]);
        assert_eq!(callbacks.load(Ordering::SeqCst), 1);
        assert!(bag.is_empty());
        assert!(bag.is_disposed());

        bag.dispose();
        assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn adding_to_disposed_bag_releases_immediately() {
        let bag = DisposeBag::new();
        bag.dispose();
        let callbacks = Arc::new(AtomicUsize::new(0));
        let counter = callbacks.clone();
        bag.add_fn(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(callbacks.load(Ordering::SeqCst), 1);
        assert!(bag.is_empty());
    }

    #[test]
    fn subscription_outliving_signal_is_harmless() {
        let signal = Signal::<u32>::new();
        let sub = signal.subscribe(|_| {});
        drop(signal);
        sub.unsubscribe();
        assert!(sub.is_closed());
    }
}
