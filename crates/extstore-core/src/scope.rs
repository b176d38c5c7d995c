#![forbid(unsafe_code)]

//! Owning scope: ordered, render-stable slots.
//!
//! A [`Scope`] stands in for one mounted component. Each render calls
//! [`begin_render`](Scope::begin_render) and then accesses slots in the same
//! order as every previous render. The `n`th access returns the value created
//! by the `n`th access of the first render, so anything built through a scope
//! (a lazy value, a store and its controls) keeps its identity until the
//! scope is dropped.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Type mismatch | Slot access order changed | `try_lazy` returns [`ScopeError`], `lazy` panics |
//! | Extra slot | New access appended after earlier renders | Created on first use |

use std::any::{Any, type_name};
use std::rc::Rc;

use crate::error::ScopeError;
use crate::store::{Controls, SetState, StoreConfig, provide_controls_with};

struct Slot {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

/// Per-component slot storage.
#[derive(Default)]
pub struct Scope {
    slots: Vec<Slot>,
    cursor: usize,
    renders: u64,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("slots", &self.slots.len())
            .field("cursor", &self.cursor)
            .field("renders", &self.renders)
            .finish()
    }
}

impl Scope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind the slot cursor. Call once at the start of every render.
    pub fn begin_render(&mut self) {
        self.cursor = 0;
        self.renders += 1;
    }

    /// Next slot as an `Rc<T>`, created with `init` on first access.
    pub fn try_lazy<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Result<Rc<T>, ScopeError> {
        let index = self.cursor;
        self.cursor += 1;

        if let Some(slot) = self.slots.get(index) {
            return Rc::clone(&slot.value)
                .downcast::<T>()
                .map_err(|_| ScopeError::SlotTypeMismatch {
                    index,
                    expected: type_name::<T>(),
                    found: slot.type_name,
                });
        }

        let value = Rc::new(init());
        self.slots.push(Slot {
            value: Rc::clone(&value) as Rc<dyn Any>,
            type_name: type_name::<T>(),
        });
        Ok(value)
    }

    /// Like [`try_lazy`](Self::try_lazy).
    ///
    /// # Panics
    ///
    /// Panics if the slot holds a different type, i.e. the order of slot
    /// accesses changed since an earlier render.
    pub fn lazy<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<T> {
        match self.try_lazy(init) {
            Ok(value) => value,
            Err(err) => panic!("{err}"),
        }
    }

    /// A store created on the first render and returned unchanged afterwards.
    /// `initial` is ignored after the first render.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`lazy`](Self::lazy).
    pub fn provide_controls<T: 'static>(&mut self, initial: T) -> (Controls<T>, SetState<T>) {
        self.provide_controls_with(initial, StoreConfig::default())
    }

    /// [`provide_controls`](Self::provide_controls) with explicit
    /// configuration.
    ///
    /// # Panics
    ///
    /// Panics under the same conditions as [`lazy`](Self::lazy).
    pub fn provide_controls_with<T: 'static>(
        &mut self,
        initial: T,
        config: StoreConfig,
    ) -> (Controls<T>, SetState<T>) {
        let pair = self.lazy(move || provide_controls_with(initial, config));
        (pair.0.clone(), pair.1.clone())
    }

    /// Number of slots created so far.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of [`begin_render`](Self::begin_render) calls.
    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn lazy_slot_is_identical_across_renders() {
        let mut scope = Scope::new();
        let calls = Cell::new(0u32);
        let mut seen = Vec::new();

        for _ in 0..4 {
            scope.begin_render();
            seen.push(scope.lazy(|| {
                calls.set(calls.get() + 1);
                String::from("state")
            }));
        }

        assert_eq!(calls.get(), 1);
        assert!(seen.windows(2).all(|w| Rc::ptr_eq(&w[0], &w[1])));
        assert_eq!(scope.render_count(), 4);
    }

    #[test]
    fn slots_are_positional() {
        let mut scope = Scope::new();
        scope.begin_render();
        let a = scope.lazy(|| 1u8);
        let b = scope.lazy(|| 2u8);

        scope.begin_render();
        assert!(Rc::ptr_eq(&a, &scope.lazy(|| 0u8)));
        assert!(Rc::ptr_eq(&b, &scope.lazy(|| 0u8)));
        assert_eq!(scope.slot_count(), 2);
    }

    #[test]
    fn separate_scopes_do_not_share() {
        let mut a = Scope::new();
        let mut b = Scope::new();
        a.begin_render();
        b.begin_render();
        assert!(!Rc::ptr_eq(&a.lazy(|| 0u8), &b.lazy(|| 0u8)));
    }

    #[test]
    fn reordered_access_is_an_error() {
        let mut scope = Scope::new();
        scope.begin_render();
        scope.lazy(|| 1u32);

        scope.begin_render();
        let err = scope.try_lazy(|| "oops").unwrap_err();
        assert!(matches!(err, ScopeError::SlotTypeMismatch { index: 0, .. }));
        assert!(err.to_string().contains("u32"));
    }

    #[test]
    #[should_panic(expected = "slot access order")]
    fn lazy_panics_on_mismatch() {
        let mut scope = Scope::new();
        scope.begin_render();
        scope.lazy(|| 1u32);
        scope.begin_render();
        scope.lazy(|| 1i64);
    }

    #[test]
    fn provided_controls_survive_rerenders() {
        let mut scope = Scope::new();

        scope.begin_render();
        let (controls, set) = scope.provide_controls(0);
        set.set(5);

        scope.begin_render();
        let (again, again_set) = scope.provide_controls(0);
        assert!(controls.ptr_eq(&again));
        assert!(set.ptr_eq(&again_set));
        assert!(Rc::ptr_eq(&controls.subscriber(), &again.subscriber()));
        // Initial value from the second render is ignored.
        assert_eq!(again.get_state(), 5);
    }
}
