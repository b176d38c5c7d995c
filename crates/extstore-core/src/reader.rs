#![forbid(unsafe_code)]

//! Selector reader: bridges a store to a host's external-store primitive.
//!
//! # Design
//!
//! The host owns re-rendering. It exposes one primitive, modelled by
//! [`ExternalStoreHost::sync_external_store`]: given a `subscribe` function
//! and a snapshot reader, it returns the current snapshot and re-runs the
//! calling render whenever a notification is followed by a snapshot that is
//! unequal to the previous one.
//!
//! [`use_control`] is the only adapter between stores and hosts. It builds
//! `read = || select(&state)` and passes it as both the client and the
//! fallback snapshot. Nothing is cached; every read re-runs the selector.
//!
//! A selector that panics is not caught. The panic reaches the host's render
//! path.

use std::rc::Rc;

use crate::store::{Controls, SubscribeFn};

/// A snapshot reader handed to a host.
pub type Snapshot<X> = Rc<dyn Fn() -> X>;

/// A host UI runtime's external-store subscription primitive.
pub trait ExternalStoreHost {
    /// Subscribe the current render to `subscribe` and return the current
    /// snapshot.
    ///
    /// Hosts are expected to resubscribe only when `subscribe` is a
    /// different `Rc` from the previous render's, and to call
    /// `get_server_snapshot` (falling back to `get_snapshot`) when rendering
    /// without a live subscription.
    fn sync_external_store<X>(
        &mut self,
        subscribe: &SubscribeFn,
        get_snapshot: Snapshot<X>,
        get_server_snapshot: Option<Snapshot<X>>,
    ) -> X
    where
        X: Clone + PartialEq + 'static;
}

/// A store paired with a projection.
pub struct Reader<T, X> {
    controls: Controls<T>,
    select: Rc<dyn Fn(&T) -> X>,
}

impl<T, X> Clone for Reader<T, X> {
    fn clone(&self) -> Self {
        Self {
            controls: self.controls.clone(),
            select: Rc::clone(&self.select),
        }
    }
}

impl<T, X> std::fmt::Debug for Reader<T, X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reader")
            .field("store", &self.controls.label())
            .finish_non_exhaustive()
    }
}

impl<T: 'static, X: 'static> Reader<T, X> {
    /// Pair `controls` with `select`.
    pub fn new(controls: Controls<T>, select: impl Fn(&T) -> X + 'static) -> Self {
        Self {
            controls,
            select: Rc::new(select),
        }
    }

    /// `select(current state)`, recomputed on every call.
    pub fn read(&self) -> X {
        self.controls.with_state(|state| (self.select)(state))
    }

    /// [`read`](Self::read) as a snapshot function.
    #[must_use]
    pub fn snapshot_fn(&self) -> Snapshot<X> {
        let reader = self.clone();
        Rc::new(move || reader.read())
    }

    /// The underlying store.
    #[must_use]
    pub fn controls(&self) -> &Controls<T> {
        &self.controls
    }
}

impl<T: Clone + 'static> Reader<T, T> {
    /// A reader that returns the whole state.
    pub fn identity(controls: Controls<T>) -> Self {
        Self::new(controls, T::clone)
    }
}

/// Read `select(state)` through `host`, registering the store as the
/// render's change source.
pub fn use_control<H, T, X>(
    host: &mut H,
    controls: &Controls<T>,
    select: impl Fn(&T) -> X + 'static,
) -> X
where
    H: ExternalStoreHost,
    T: 'static,
    X: Clone + PartialEq + 'static,
{
    let read = Reader::new(controls.clone(), select).snapshot_fn();
    host.sync_external_store(&controls.subscriber(), Rc::clone(&read), Some(read))
}

/// [`use_control`] with the identity selector.
pub fn use_control_state<H, T>(host: &mut H, controls: &Controls<T>) -> T
where
    H: ExternalStoreHost,
    T: Clone + PartialEq + 'static,
{
    use_control(host, controls, T::clone)
}
