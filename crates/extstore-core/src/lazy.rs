#![forbid(unsafe_code)]

//! Construct-once holder for values that are expensive or identity-bearing.
//!
//! [`LazyRef<T>`] runs its factory on the first [`get_or_init`] call and
//! hands out the same `&T` for the rest of its lifetime. The "unset" state is
//! an empty [`OnceCell`], so no value of `T` can be mistaken for it.
//!
//! [`get_or_init`]: LazyRef::get_or_init

use std::cell::OnceCell;

/// A value built on first access and reused for the holder's lifetime.
///
/// # Invariants
///
/// 1. The factory passed to [`get_or_init`](Self::get_or_init) runs at most
///    once per holder.
/// 2. Every access after initialization returns a reference to the same
///    instance.
pub struct LazyRef<T> {
    cell: OnceCell<T>,
}

impl<T> LazyRef<T> {
    /// Create an empty holder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Return the held value, building it with `init` if this is the first
    /// access.
    pub fn get_or_init(&self, init: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(init)
    }

    /// The held value, or `None` before the first access.
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Whether the factory has already run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for LazyRef<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for LazyRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyRef").field("value", &self.cell.get()).finish()
    }
}
