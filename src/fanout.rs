//! Callback fan-out with O(1) unregistration.
//!
//! [`HandlerSet`] keys every registered callback by a unique token. The
//! token is handed back inside a [`Subscription`], which removes exactly
//! that callback when [`Subscription::unsubscribe`] is called. Dispatch
//! snapshots the callbacks before invoking them, so a handler may
//! unregister itself (or others) while a message is being delivered.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_token: AtomicU64,
    handlers: Mutex<HashMap<u64, Handler<T>>>,
}

trait Unregister: Send + Sync {
    fn unregister(&self, token: u64) -> bool;
}

impl<T> Unregister for Registry<T> {
    fn unregister(&self, token: u64) -> bool {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&token)
            .is_some()
    }
}

/// A set of callbacks that all receive every emitted value.
///
/// Cloning a `HandlerSet` yields another handle to the same set.
pub struct HandlerSet<T> {
    inner: Arc<Registry<T>>,
}

impl<T: 'static> HandlerSet<T> {
    /// Creates an empty handler set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Registry {
                next_token: AtomicU64::new(0),
                handlers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Registers a callback and returns the handle that removes it.
    pub fn register<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token, Arc::new(handler));

        let registry: Weak<dyn Unregister> = Arc::downgrade(&self.inner) as Weak<dyn Unregister>;
        Subscription { token, registry }
    }

    /// Delivers `value` to every registered callback.
    ///
    /// Returns the number of callbacks invoked. No ordering is guaranteed
    /// between callbacks.
    pub fn emit(&self, value: &T) -> usize {
        let snapshot: Vec<Handler<T>> = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        for handler in &snapshot {
            handler(value);
        }
        snapshot.len()
    }

    /// Returns the number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for HandlerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for HandlerSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for HandlerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self
            .inner
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len();
        f.debug_struct("HandlerSet").field("handlers", &len).finish()
    }
}

/// Handle returned by [`HandlerSet::register`].
///
/// Dropping the handle does not unregister the callback; call
/// [`Subscription::unsubscribe`] for that.
#[must_use = "dropping a Subscription leaves the handler registered"]
pub struct Subscription {
    token: u64,
    registry: Weak<dyn Unregister>,
}

impl Subscription {
    /// Removes the callback. Returns `false` if it was already removed or
    /// the owning set no longer exists.
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unregister(self.token))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn every_handler_receives_value() {
        let set = HandlerSet::<u32>::new();
        let total = Arc::new(AtomicUsize::new(0));
        let _subs: Vec<Subscription> = (0..3)
            .map(|_| {
                let total = Arc::clone(&total);
                set.register(move |v| {
                    total.fetch_add(*v as usize, Ordering::SeqCst);
                })
            })
            .collect();

        assert_eq!(set.emit(&2), 3);
        assert_eq!(total.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_removes_only_that_handler() {
        let set = HandlerSet::<()>::new();
        let a = set.register(|_| {});
        let _b = set.register(|_| {});
        assert_eq!(set.len(), 2);

        assert!(a.unsubscribe());
        assert_eq!(set.len(), 1);
        assert_eq!(set.emit(&()), 1);
    }

    #[test]
    fn unsubscribe_after_set_dropped_is_harmless() {
        let set = HandlerSet::<()>::new();
        let sub = set.register(|_| {});
        drop(set);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn handler_may_unregister_during_dispatch() {
        let set = HandlerSet::<()>::new();
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let calls = Arc::new(AtomicUsize::new(0));

        let sub = {
            let slot = Arc::clone(&slot);
            let calls = Arc::clone(&calls);
            set.register(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(sub) = slot.lock().unwrap_or_else(PoisonError::into_inner).take() {
                    sub.unsubscribe();
                }
            })
        };
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(sub);

        set.emit(&());
        set.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(set.is_empty());
    }
}
