#![forbid(unsafe_code)]

//! Per-call-site store bookkeeping for [`RenderHost`](crate::RenderHost).
//!
//! One [`StoreSlot`] exists for every `sync_external_store` call site of a
//! mounted component, in call order. The slot remembers which `subscribe`
//! function it is attached to, the live subscription, and a [`Probe`] that
//! keeps the latest snapshot reader and the last rendered snapshot.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use extstore_core::{Snapshot, SubscribeFn, Unsubscribe};

pub(crate) struct Probe<X> {
    get_snapshot: RefCell<Snapshot<X>>,
    rendered: RefCell<Option<X>>,
}

impl<X: Clone + PartialEq + 'static> Probe<X> {
    pub(crate) fn new(get_snapshot: Snapshot<X>) -> Self {
        Self {
            get_snapshot: RefCell::new(get_snapshot),
            rendered: RefCell::new(None),
        }
    }

    /// Swap in this render's reader, read it, and record the result as the
    /// rendered snapshot.
    pub(crate) fn render(&self, get_snapshot: Snapshot<X>) -> X {
        *self.get_snapshot.borrow_mut() = Rc::clone(&get_snapshot);
        let value = get_snapshot();
        *self.rendered.borrow_mut() = Some(value.clone());
        value
    }

    /// Re-read the snapshot. `true` if it differs from the rendered one.
    pub(crate) fn changed(&self) -> bool {
        let read = Rc::clone(&self.get_snapshot.borrow());
        let next = read();
        self.rendered.borrow().as_ref() != Some(&next)
    }
}

pub(crate) struct StoreSlot {
    pub(crate) subscribe: SubscribeFn,
    pub(crate) unsubscribe: Unsubscribe,
    /// An `Rc<Probe<X>>` for the slot's snapshot type.
    pub(crate) probe: Rc<dyn Any>,
}

impl StoreSlot {
    pub(crate) fn probe<X: 'static>(&self) -> Option<Rc<Probe<X>>> {
        Rc::clone(&self.probe).downcast::<Probe<X>>().ok()
    }

    pub(crate) fn release(&self) {
        self.unsubscribe.unsubscribe();
    }
}
