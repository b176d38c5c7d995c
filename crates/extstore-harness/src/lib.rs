#![forbid(unsafe_code)]

//! Reference host and fixtures for exercising extstore end to end.
//!
//! - [`RenderHost`]: mounts render closures, subscribes them through
//!   [`ExternalStoreHost`](extstore_core::ExternalStoreHost), and re-renders
//!   on unequal snapshots.
//! - [`render_static`]: one-shot render using fallback snapshots only.
//!
//! # Example
//! ```
//! use extstore_core::{provide_controls, use_control};
//! use extstore_harness::RenderHost;
//!
//! let (controls, set_state) = provide_controls(0);
//! let mut host = RenderHost::new();
//! let c = controls.clone();
//! let id = host.mount(move |cx| format!("count={}", use_control(cx, &c, |n: &i32| *n)));
//!
//! host.act(|| set_state.set(3)).unwrap();
//! assert_eq!(host.output(id), Some("count=3"));
//! ```

pub mod error;
pub mod host;
mod probe;
pub mod static_render;

pub use error::HostError;
pub use host::{ComponentId, HostConfig, HostStats, RenderCx, RenderHost};
pub use static_render::{StaticCx, render_static};
