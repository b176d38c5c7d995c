#![forbid(unsafe_code)]

//! Synchronous state publisher.
//!
//! - [`provide_controls`]: builds a store and returns its [`Controls`] (read
//!   side) and [`SetState`] (write side).
//! - [`Unsubscribe`]: idempotent removal handle returned by `subscribe`.
//! - [`SubscriptionGuard`]: RAII form of [`Unsubscribe`].
//!
//! # Invariants
//!
//! 1. Listeners run strictly after the new state is committed.
//! 2. One `set` call produces exactly one notification pass; no batching and
//!    no equality short-circuit.
//! 3. A pass calls each listener that is live at the start of the pass and
//!    still live at its turn exactly once. Listeners added during a pass
//!    first run on the next one.
//! 4. The `subscribe` function handed to hosts has one identity per store.

pub mod listeners;
pub mod publisher;

pub use listeners::{Listener, ListenerId, SubscriptionGuard, Unsubscribe};
pub use publisher::{
    Controls, SetState, StoreConfig, SubscribeFn, Update, provide_controls, provide_controls_with,
};
