#![forbid(unsafe_code)]

//! State publisher: one value, one writer, any number of listeners.
//!
//! # Design
//!
//! [`provide_controls`] builds a shared `StoreInner<T>` and hands out two
//! views of it: a read-only [`Controls<T>`] and the sole writer
//! [`SetState<T>`]. Both are cheap `Rc` handles; clones share everything.
//!
//! Unlike an equality-gated observable, every `set` produces exactly one
//! notification pass, whether or not the value changed. Deciding whether a
//! change matters is left to whoever reads the state.
//!
//! # Failure Modes
//!
//! - **Derivation calls `set` on the same store**: the derivation runs under a
//!   shared borrow of the state, so a nested write panics (RefCell rules).
//!   Listeners, which run after the borrow is released, may write freely.
//! - **Listener unsubscribes mid-pass**: tolerated. The removed entry is
//!   skipped if it has not been called yet; others are unaffected.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::listeners::{Listener, ListenerId, ListenerSet, Unsubscribe};
use crate::lazy::LazyRef;

/// A `subscribe` function with a stable identity.
///
/// Hosts compare these with `Rc::ptr_eq` to decide whether to resubscribe.
pub type SubscribeFn = Rc<dyn Fn(Listener) -> Unsubscribe>;

/// Configuration for a single store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name attached to the store's tracing spans. Default: `"store"`.
    pub label: Cow<'static, str>,

    /// Emit the full list of listener ids on every subscribe, at trace
    /// level. Default: false.
    pub trace_subscribers: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            label: Cow::Borrowed("store"),
            trace_subscribers: false,
        }
    }
}

impl StoreConfig {
    /// Default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the tracing label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// Enable or disable the per-subscribe listener dump.
    #[must_use]
    pub fn with_subscriber_trace(mut self, enabled: bool) -> Self {
        self.trace_subscribers = enabled;
        self
    }
}

/// A state update: a replacement value or a derivation from the current one.
pub enum Update<T> {
    /// Store this value.
    Replace(T),
    /// Compute the next value from the current one.
    Derive(Box<dyn FnOnce(&T) -> T>),
}

impl<T> Update<T> {
    /// Wrap a derivation function.
    pub fn derive(f: impl FnOnce(&T) -> T + 'static) -> Self {
        Self::Derive(Box::new(f))
    }

    fn resolve(self, current: &T) -> T {
        match self {
            Self::Replace(value) => value,
            Self::Derive(f) => f(current),
        }
    }
}

impl<T> From<T> for Update<T> {
    fn from(value: T) -> Self {
        Self::Replace(value)
    }
}

impl<T> std::fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Replace(_) => f.write_str("Update::Replace(..)"),
            Self::Derive(_) => f.write_str("Update::Derive(..)"),
        }
    }
}

struct StoreInner<T> {
    state: RefCell<T>,
    version: Cell<u64>,
    listeners: Rc<RefCell<ListenerSet>>,
    /// Built on first request, then reused so its identity never changes.
    subscriber: LazyRef<SubscribeFn>,
    config: StoreConfig,
}

impl<T> StoreInner<T> {
    fn subscriber(&self) -> &SubscribeFn {
        self.subscriber.get_or_init(|| {
            let listeners = Rc::clone(&self.listeners);
            let config = self.config.clone();
            Rc::new(move |listener: Listener| register(&listeners, &config, listener)) as SubscribeFn
        })
    }

    fn notify(&self) {
        // Snapshot first so callbacks can mutate the set while we iterate.
        let snapshot = self.listeners.borrow().snapshot();
        let _span = tracing::debug_span!(
            "extstore.set_state",
            store = %self.config.label,
            version = self.version.get(),
            listeners = snapshot.len()
        )
        .entered();

        for (id, listener) in snapshot {
            let live = self.listeners.borrow().contains(id);
            if !live {
                tracing::trace!(listener = %id, "skipped: removed during pass");
                continue;
            }
            listener();
        }
    }
}

fn register(
    listeners: &Rc<RefCell<ListenerSet>>,
    config: &StoreConfig,
    listener: Listener,
) -> Unsubscribe {
    let (id, count) = {
        let mut set = listeners.borrow_mut();
        (set.insert(listener), set.len())
    };
    if config.trace_subscribers {
        let ids: Vec<ListenerId> = listeners.borrow().ids();
        tracing::trace!(store = %config.label, listener = %id, count, ?ids, "subscribed");
    } else {
        tracing::trace!(store = %config.label, listener = %id, count, "subscribed");
    }
    Unsubscribe::new(listeners, id)
}

/// Create a store holding `initial`, returning its read handle and writer.
#[must_use]
pub fn provide_controls<T: 'static>(initial: T) -> (Controls<T>, SetState<T>) {
    provide_controls_with(initial, StoreConfig::default())
}

/// [`provide_controls`] with explicit configuration.
#[must_use]
pub fn provide_controls_with<T: 'static>(
    initial: T,
    config: StoreConfig,
) -> (Controls<T>, SetState<T>) {
    let inner = Rc::new(StoreInner {
        state: RefCell::new(initial),
        version: Cell::new(0),
        listeners: Rc::new(RefCell::new(ListenerSet::default())),
        subscriber: LazyRef::new(),
        config,
    });
    (
        Controls {
            inner: Rc::clone(&inner),
        },
        SetState { inner },
    )
}

/// Read-only view of a store: `subscribe` plus `get_state`.
///
/// Cloning yields another handle to the **same** store.
///
/// # Invariants
///
/// 1. [`get_state`](Self::get_state) returns the most recently committed
///    value; listeners observe the new value.
/// 2. [`subscriber`](Self::subscriber) returns the same `Rc` for the store's
///    whole lifetime.
/// 3. [`version`](Self::version) increments by exactly 1 per `set`.
pub struct Controls<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T> Clone for Controls<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Controls<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controls")
            .field("label", &self.inner.config.label)
            .field("state", &*self.inner.state.borrow())
            .field("version", &self.inner.version.get())
            .field("subscriber_count", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl<T> Controls<T> {
    /// Clone of the current state.
    #[must_use]
    pub fn get_state(&self) -> T
    where
        T: Clone,
    {
        self.inner.state.borrow().clone()
    }

    /// Borrow the current state for the duration of `f`.
    pub fn with_state<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Register a callback, returning the handle that removes it.
    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Unsubscribe {
        self.subscribe_listener(Rc::new(listener))
    }

    /// Register an existing listener. Registering the same `Rc` again while
    /// it is live is a no-op that returns an equivalent handle.
    pub fn subscribe_listener(&self, listener: Listener) -> Unsubscribe {
        (self.inner.subscriber())(listener)
    }

    /// The store's `subscribe` function, identical on every call.
    #[must_use]
    pub fn subscriber(&self) -> SubscribeFn {
        Rc::clone(self.inner.subscriber())
    }

    /// Number of `set` calls so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of live listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Tracing label from the store's [`StoreConfig`].
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.config.label
    }

    /// Whether both handles view the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether `setter` writes to this store.
    #[must_use]
    pub fn is_written_by(&self, setter: &SetState<T>) -> bool {
        Rc::ptr_eq(&self.inner, &setter.inner)
    }
}

/// The single writer for a store.
pub struct SetState<T> {
    inner: Rc<StoreInner<T>>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetState")
            .field("label", &self.inner.config.label)
            .finish_non_exhaustive()
    }
}

impl<T> SetState<T> {
    /// Resolve `update` against the current state, commit it, then call every
    /// live listener once.
    ///
    /// # Panics
    ///
    /// Panics if a derivation function writes to this same store.
    pub fn dispatch(&self, update: Update<T>) {
        let next = {
            let current = self.inner.state.borrow();
            update.resolve(&current)
        };
        *self.inner.state.borrow_mut() = next;
        self.inner.version.set(self.inner.version.get() + 1);
        self.inner.notify();
    }

    /// Replace the state.
    pub fn set(&self, value: T) {
        self.dispatch(Update::Replace(value));
    }

    /// Replace the state with `f(&current)`.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same store.
    pub fn update(&self, f: impl FnOnce(&T) -> T + 'static) {
        self.dispatch(Update::derive(f));
    }

    /// Whether both handles write to the same store.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}
