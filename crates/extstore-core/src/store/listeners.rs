#![forbid(unsafe_code)]

//! Identity-keyed listener registry.
//!
//! # Design
//!
//! Listeners are `Rc<dyn Fn()>`. Identity is the `Rc` allocation address, so
//! registering the same `Rc` twice keeps a single entry. Each registration
//! gets a fresh [`ListenerId`]; ids are never reused, which keeps a stale
//! [`Unsubscribe`] handle from removing a later registration of the same
//! callback.
//!
//! The notification pass (see `publisher.rs`) works on a [`snapshot`] and
//! re-checks [`contains`] before every call, so callbacks may subscribe or
//! unsubscribe freely while a pass is running.
//!
//! [`snapshot`]: ListenerSet::snapshot
//! [`contains`]: ListenerSet::contains

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

/// A zero-argument change callback.
pub type Listener = Rc<dyn Fn()>;

/// Registration id of a listener within one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Raw numeric id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn identity_of(listener: &Listener) -> usize {
    Rc::as_ptr(listener).cast::<()>() as usize
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    entries: BTreeMap<ListenerId, Listener>,
    by_identity: HashMap<usize, ListenerId>,
    next_id: u64,
}

impl ListenerSet {
    /// Register `listener`, returning its id. Re-registering a live callback
    /// returns the existing id.
    pub(crate) fn insert(&mut self, listener: Listener) -> ListenerId {
        let key = identity_of(&listener);
        if let Some(&id) = self.by_identity.get(&key) {
            return id;
        }
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.by_identity.insert(key, id);
        self.entries.insert(id, listener);
        id
    }

    /// Remove the listener registered under `id`. Returns `false` if it was
    /// already gone.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.remove(&id) {
            Some(listener) => {
                self.by_identity.remove(&identity_of(&listener));
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, id: ListenerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn ids(&self) -> Vec<ListenerId> {
        self.entries.keys().copied().collect()
    }

    /// Copy of the current registrations, taken at the start of a pass.
    pub(crate) fn snapshot(&self) -> Vec<(ListenerId, Listener)> {
        self.entries
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect()
    }
}

/// Handle returned by `subscribe`; removes exactly that registration.
///
/// Calling [`unsubscribe`](Self::unsubscribe) more than once is a no-op.
/// The handle holds the registry weakly, so it never keeps a store alive, and
/// dropping it does **not** unsubscribe. Use [`into_guard`](Self::into_guard)
/// for drop-scoped subscriptions.
#[derive(Clone)]
pub struct Unsubscribe {
    set: Weak<RefCell<ListenerSet>>,
    id: ListenerId,
}

impl Unsubscribe {
    pub(crate) fn new(set: &Rc<RefCell<ListenerSet>>, id: ListenerId) -> Self {
        Self {
            set: Rc::downgrade(set),
            id,
        }
    }

    /// Remove the registration. Idempotent.
    pub fn unsubscribe(&self) {
        let Some(set) = self.set.upgrade() else {
            return;
        };
        let (removed, remaining) = {
            let mut set = set.borrow_mut();
            (set.remove(self.id), set.len())
        };
        if removed {
            tracing::trace!(listener = %self.id, remaining, "unsubscribed");
        }
    }

    /// Whether the registration is still live.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.set
            .upgrade()
            .is_some_and(|set| set.borrow().contains(self.id))
    }

    /// Id of the registration this handle removes.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Convert into an RAII guard that unsubscribes when dropped.
    #[must_use]
    pub fn into_guard(self) -> SubscriptionGuard {
        SubscriptionGuard { handle: self }
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("id", &self.id)
            .field("subscribed", &self.is_subscribed())
            .finish()
    }
}

/// Drop guard around an [`Unsubscribe`] handle.
#[derive(Debug)]
pub struct SubscriptionGuard {
    handle: Unsubscribe,
}

impl SubscriptionGuard {
    /// The wrapped handle.
    #[must_use]
    pub fn handle(&self) -> &Unsubscribe {
        &self.handle
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.handle.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Rc<RefCell<ListenerSet>> {
        Rc::new(RefCell::new(ListenerSet::default()))
    }

    #[test]
    fn same_rc_registers_once() {
        let mut set = ListenerSet::default();
        let l: Listener = Rc::new(|| {});
        let a = set.insert(Rc::clone(&l));
        let b = set.insert(Rc::clone(&l));
        assert_eq!(a, b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn equal_closures_are_distinct_identities() {
        let mut set = ListenerSet::default();
        set.insert(Rc::new(|| {}));
        set.insert(Rc::new(|| {}));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut set = ListenerSet::default();
        let l: Listener = Rc::new(|| {});
        let first = set.insert(Rc::clone(&l));
        assert!(set.remove(first));
        let second = set.insert(l);
        assert_ne!(first, second);
        assert!(!set.contains(first));
        assert!(set.contains(second));
    }

    #[test]
    fn remove_missing_is_false() {
        let mut set = ListenerSet::default();
        assert!(!set.remove(ListenerId(9)));
    }

    #[test]
    fn stale_handle_does_not_remove_new_registration() {
        let set = shared();
        let l: Listener = Rc::new(|| {});
        let old = Unsubscribe::new(&set, set.borrow_mut().insert(Rc::clone(&l)));
        old.unsubscribe();
        let fresh = Unsubscribe::new(&set, set.borrow_mut().insert(l));
        old.unsubscribe();
        assert!(fresh.is_subscribed());
        assert_eq!(set.borrow().len(), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let set = shared();
        let keep = set.borrow_mut().insert(Rc::new(|| {}));
        let handle = Unsubscribe::new(&set, set.borrow_mut().insert(Rc::new(|| {})));
        handle.unsubscribe();
        handle.unsubscribe();
        assert!(!handle.is_subscribed());
        assert_eq!(set.borrow().ids(), vec![keep]);
    }

    #[test]
    fn handle_outliving_registry_is_inert() {
        let set = shared();
        let handle = Unsubscribe::new(&set, set.borrow_mut().insert(Rc::new(|| {})));
        drop(set);
        handle.unsubscribe();
        assert!(!handle.is_subscribed());
    }

    #[test]
    fn guard_unsubscribes_on_drop() {
        let set = shared();
        let guard = Unsubscribe::new(&set, set.borrow_mut().insert(Rc::new(|| {}))).into_guard();
        assert!(guard.handle().is_subscribed());
        drop(guard);
        assert_eq!(set.borrow().len(), 0);
    }

    #[test]
    fn snapshot_is_detached_from_later_mutation() {
        let mut set = ListenerSet::default();
        let a = set.insert(Rc::new(|| {}));
        let snap = set.snapshot();
        set.remove(a);
        set.insert(Rc::new(|| {}));
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].0, a);
    }
}
