#![forbid(unsafe_code)]

//! Core: lazy scope slots, the state publisher, and selector readers.
//!
//! # Role in extstore
//! `extstore-core` lets rendering code read shared, mutable state and
//! re-render exactly when it changes, without the UI layer owning the state.
//! Rendering itself belongs to a host runtime, reached through a single
//! trait ([`ExternalStoreHost`]).
//!
//! # Primary responsibilities
//! - **LazyRef / Scope**: values built once per owning scope and reused.
//! - **Controls / SetState**: a store's read side and its sole writer.
//! - **Reader / use_control**: projection of state into what a render needs.
//!
//! # Concurrency
//! Everything is single-threaded and synchronous (`Rc`/`RefCell`). The only
//! hazard is re-entrancy: listeners may subscribe, unsubscribe, or write
//! while a notification pass is running.
//!
//! # Example
//! ```
//! use extstore_core::provide_controls;
//!
//! let (controls, set_state) = provide_controls(0);
//! let _unsubscribe = controls.subscribe(|| {});
//! set_state.set(5);
//! set_state.update(|prev| prev + 1);
//! assert_eq!(controls.get_state(), 6);
//! ```

pub mod error;
pub mod lazy;
pub mod reader;
pub mod scope;
pub mod store;

pub use error::ScopeError;
pub use lazy::LazyRef;
pub use reader::{ExternalStoreHost, Reader, Snapshot, use_control, use_control_state};
pub use scope::Scope;
pub use store::{
    Controls, Listener, ListenerId, SetState, StoreConfig, SubscribeFn, SubscriptionGuard,
    Unsubscribe, Update, provide_controls, provide_controls_with,
};
