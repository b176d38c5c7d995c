#![forbid(unsafe_code)]

//! Deterministic reference render host.
//!
//! # Design
//!
//! [`RenderHost`] mounts render closures, each with its own [`Scope`] and an
//! ordered list of store slots (one per `sync_external_store` call site).
//! It implements the external-store contract the way a UI runtime would:
//!
//! 1. On render, each call site reads its snapshot and keeps its
//!    subscription unless the `subscribe` function changed identity.
//! 2. A store notification re-reads the latest snapshot reader. The
//!    component is marked dirty only if the result is unequal to what it
//!    last rendered.
//! 3. [`flush`](RenderHost::flush) re-renders dirty components until none
//!    remain, up to [`HostConfig::max_flush_passes`] passes.
//!
//! Nothing renders implicitly: writes only mark components dirty. Use
//! [`act`](RenderHost::act) to run a write and flush in one step.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown id | Component unmounted or never mounted | [`HostError::UnknownComponent`] |
//! | Render loop | Renders keep writing state they read | [`HostError::RenderLoop`], dirty set cleared |
//! | Call-site type change | Render order changed | Old subscription released, slot rebuilt |
//! | Fallible render fails | `try_mount` closure returned `Err` (e.g. [`HostError::Scope`]) | Previous output kept; a failed mount is rolled back |

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use extstore_core::{ExternalStoreHost, Scope, Snapshot, SubscribeFn, Unsubscribe};
use tracing::{debug, warn};

use crate::error::HostError;
use crate::probe::{Probe, StoreSlot};

/// Identifier of a mounted component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u64);

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Host configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Maximum re-render passes per [`flush`](RenderHost::flush) before the
    /// host reports a render loop. Values below 1 count as 1. Default: 50.
    pub max_flush_passes: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 50,
        }
    }
}

impl HostConfig {
    /// Set the flush pass cap (clamped to at least 1).
    #[must_use]
    pub fn with_max_flush_passes(mut self, passes: usize) -> Self {
        self.max_flush_passes = passes.max(1);
        self
    }
}

/// Counters accumulated over the host's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    /// Completed renders, including mounts.
    pub renders: u64,
    /// Subscriptions opened.
    pub subscribes: u64,
    /// Subscriptions released.
    pub unsubscribes: u64,
}

type DirtySet = Rc<RefCell<BTreeSet<ComponentId>>>;
type RenderFn = Box<dyn FnMut(&mut RenderCx<'_>) -> Result<String, HostError>>;

struct Component {
    scope: Scope,
    slots: Vec<StoreSlot>,
    render: RenderFn,
    output: String,
}

impl Component {
    fn release_all(&self, stats: &mut HostStats) {
        for slot in &self.slots {
            slot.release();
            stats.unsubscribes += 1;
        }
    }
}

/// The render context handed to a component's render closure.
pub struct RenderCx<'a> {
    id: ComponentId,
    scope: &'a mut Scope,
    slots: &'a mut Vec<StoreSlot>,
    cursor: usize,
    dirty: &'a DirtySet,
    stats: &'a mut HostStats,
}

impl RenderCx<'_> {
    /// The component being rendered.
    #[must_use]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// The component's owning scope.
    pub fn scope(&mut self) -> &mut Scope {
        &mut *self.scope
    }

    fn release_slot(&mut self, index: usize) {
        self.slots[index].release();
        self.stats.unsubscribes += 1;
    }

    fn install<X>(&mut self, index: usize, subscribe: &SubscribeFn, probe: Rc<Probe<X>>)
    where
        X: Clone + PartialEq + 'static,
    {
        let unsubscribe = self.attach(subscribe, Rc::clone(&probe));
        let slot = StoreSlot {
            subscribe: Rc::clone(subscribe),
            unsubscribe,
            probe,
        };
        if index < self.slots.len() {
            self.slots[index] = slot;
        } else {
            self.slots.push(slot);
        }
    }

    fn attach<X>(&mut self, subscribe: &SubscribeFn, probe: Rc<Probe<X>>) -> Unsubscribe
    where
        X: Clone + PartialEq + 'static,
    {
        let dirty = Rc::clone(self.dirty);
        let id = self.id;
        self.stats.subscribes += 1;
        debug!(component = %id, slot = self.cursor - 1, "subscribing");
        subscribe(Rc::new(move || {
            if probe.changed() {
                dirty.borrow_mut().insert(id);
            }
        }))
    }
}

impl ExternalStoreHost for RenderCx<'_> {
    fn sync_external_store<X>(
        &mut self,
        subscribe: &SubscribeFn,
        get_snapshot: Snapshot<X>,
        _get_server_snapshot: Option<Snapshot<X>>,
    ) -> X
    where
        X: Clone + PartialEq + 'static,
    {
        let index = self.cursor;
        self.cursor += 1;

        let existing = self
            .slots
            .get(index)
            .map(|slot| (slot.probe::<X>(), Rc::ptr_eq(&slot.subscribe, subscribe)));

        match existing {
            Some((Some(probe), true)) => probe.render(get_snapshot),
            Some((Some(probe), false)) => {
                debug!(component = %self.id, slot = index, "subscribe identity changed");
                self.release_slot(index);
                let value = probe.render(get_snapshot);
                self.install(index, subscribe, probe);
                value
            }
            other => {
                if other.is_some() {
                    debug!(component = %self.id, slot = index, "snapshot type changed");
                    self.release_slot(index);
                }
                let probe = Rc::new(Probe::new(Rc::clone(&get_snapshot)));
                let value = probe.render(get_snapshot);
                self.install(index, subscribe, probe);
                value
            }
        }
    }
}

/// Reference host: mounts components and re-renders them on store changes.
pub struct RenderHost {
    config: HostConfig,
    components: BTreeMap<ComponentId, Component>,
    dirty: DirtySet,
    next_id: u64,
    stats: HostStats,
}

impl Default for RenderHost {
    fn default() -> Self {
        Self::with_config(HostConfig::default())
    }
}

impl std::fmt::Debug for RenderHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderHost")
            .field("config", &self.config)
            .field("mounted", &self.components.len())
            .field("dirty", &self.dirty.borrow().len())
            .field("stats", &self.stats)
            .finish()
    }
}

fn render_into(
    id: ComponentId,
    component: &mut Component,
    dirty: &DirtySet,
    stats: &mut HostStats,
) -> Result<(), HostError> {
    dirty.borrow_mut().remove(&id);
    component.scope.begin_render();

    let mut cx = RenderCx {
        id,
        scope: &mut component.scope,
        slots: &mut component.slots,
        cursor: 0,
        dirty,
        stats: &mut *stats,
    };
    let result = (component.render)(&mut cx);
    let used = cx.cursor;
    let output = match result {
        Ok(output) => output,
        Err(err) => {
            debug!(component = %id, error = %err, "render failed");
            return Err(err);
        }
    };

    // Call sites that disappeared this render give up their subscriptions.
    for slot in component.slots.drain(used..) {
        slot.release();
        stats.unsubscribes += 1;
    }

    component.output = output;
    stats.renders += 1;
    debug!(
        component = %id,
        renders = component.scope.render_count(),
        stores = component.slots.len(),
        "rendered"
    );
    Ok(())
}

impl RenderHost {
    /// Host with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with explicit configuration.
    #[must_use]
    pub fn with_config(config: HostConfig) -> Self {
        Self {
            config,
            components: BTreeMap::new(),
            dirty: Rc::new(RefCell::new(BTreeSet::new())),
            next_id: 0,
            stats: HostStats::default(),
        }
    }

    /// Mount a component and render it once.
    pub fn mount(
        &mut self,
        mut render: impl FnMut(&mut RenderCx<'_>) -> String + 'static,
    ) -> ComponentId {
        let id = self.insert(Box::new(move |cx: &mut RenderCx<'_>| {
            Ok::<_, HostError>(render(cx))
        }));
        if let Some(component) = self.components.get_mut(&id) {
            let rendered = render_into(id, component, &self.dirty, &mut self.stats);
            debug_assert!(rendered.is_ok());
        }
        id
    }

    /// Mount a component whose render can fail, and render it once.
    ///
    /// Inside the closure, `cx.scope().try_lazy(..)?` turns a slot mismatch
    /// into [`HostError::Scope`]. If the first render fails, the component
    /// is not mounted and every subscription it opened is released.
    pub fn try_mount(
        &mut self,
        render: impl FnMut(&mut RenderCx<'_>) -> Result<String, HostError> + 'static,
    ) -> Result<ComponentId, HostError> {
        let id = self.insert(Box::new(render));
        let component = self
            .components
            .get_mut(&id)
            .ok_or(HostError::UnknownComponent(id))?;
        if let Err(err) = render_into(id, component, &self.dirty, &mut self.stats) {
            self.unmount(id)?;
            return Err(err);
        }
        Ok(id)
    }

    fn insert(&mut self, render: RenderFn) -> ComponentId {
        let id = ComponentId(self.next_id);
        self.next_id += 1;
        self.components.insert(
            id,
            Component {
                scope: Scope::new(),
                slots: Vec::new(),
                render,
                output: String::new(),
            },
        );
        debug!(component = %id, "mounted");
        id
    }

    /// Render a component now, whether or not it is dirty.
    pub fn rerender(&mut self, id: ComponentId) -> Result<(), HostError> {
        let component = self
            .components
            .get_mut(&id)
            .ok_or(HostError::UnknownComponent(id))?;
        render_into(id, component, &self.dirty, &mut self.stats)
    }

    /// Re-render dirty components until none remain. Returns the number of
    /// renders performed.
    ///
    /// If a render fails, the error is returned and the components not yet
    /// rendered in that pass stay dirty. The failed component does not.
    pub fn flush(&mut self) -> Result<usize, HostError> {
        let cap = self.config.max_flush_passes.max(1);
        let mut rendered = 0;
        let mut passes = 0;
        loop {
            let batch = std::mem::take(&mut *self.dirty.borrow_mut());
            if batch.is_empty() {
                return Ok(rendered);
            }
            if passes >= cap {
                warn!(
                    passes,
                    dirty = batch.len(),
                    "flush pass cap reached; dropping pending renders"
                );
                return Err(HostError::RenderLoop { passes });
            }
            passes += 1;

            let mut queue = batch.into_iter();
            while let Some(id) = queue.next() {
                let Some(component) = self.components.get_mut(&id) else {
                    continue;
                };
                if let Err(err) = render_into(id, component, &self.dirty, &mut self.stats) {
                    self.dirty.borrow_mut().extend(queue);
                    return Err(err);
                }
                rendered += 1;
            }
        }
    }

    /// Run `f`, then [`flush`](Self::flush).
    pub fn act<R>(&mut self, f: impl FnOnce() -> R) -> Result<R, HostError> {
        let out = f();
        self.flush()?;
        Ok(out)
    }

    /// Remove a component and release all of its subscriptions.
    pub fn unmount(&mut self, id: ComponentId) -> Result<(), HostError> {
        let component = self
            .components
            .remove(&id)
            .ok_or(HostError::UnknownComponent(id))?;
        component.release_all(&mut self.stats);
        self.dirty.borrow_mut().remove(&id);
        debug!(component = %id, "unmounted");
        Ok(())
    }

    /// Output of the component's latest render.
    #[must_use]
    pub fn output(&self, id: ComponentId) -> Option<&str> {
        self.components.get(&id).map(|c| c.output.as_str())
    }

    /// How many times the component has rendered, including its mount.
    #[must_use]
    pub fn render_count(&self, id: ComponentId) -> Option<u64> {
        self.components.get(&id).map(|c| c.scope.render_count())
    }

    /// Whether a store change is waiting to re-render the component.
    #[must_use]
    pub fn is_dirty(&self, id: ComponentId) -> bool {
        self.dirty.borrow().contains(&id)
    }

    /// Number of dirty components.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.dirty.borrow().len()
    }

    /// Number of mounted components.
    #[must_use]
    pub fn mounted(&self) -> usize {
        self.components.len()
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> HostStats {
        self.stats
    }
}

impl Drop for RenderHost {
    fn drop(&mut self) {
        for component in self.components.values() {
            component.release_all(&mut self.stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extstore_core::{ScopeError, provide_controls, use_control, use_control_state};

    #[test]
    fn mount_renders_once() {
        let mut host = RenderHost::new();
        let id = host.mount(|_| "hello".to_string());
        assert_eq!(host.output(id), Some("hello"));
        assert_eq!(host.render_count(id), Some(1));
        assert_eq!(host.stats().renders, 1);
    }

    #[test]
    fn write_marks_dirty_and_flush_renders() {
        let (controls, set) = provide_controls(1);
        let mut host = RenderHost::new();
        let c = controls.clone();
        let id = host.mount(move |cx| format!("n={}", use_control_state(cx, &c)));

        set.set(2);
        assert!(host.is_dirty(id));
        assert_eq!(host.output(id), Some("n=1"));

        assert_eq!(host.flush(), Ok(1));
        assert_eq!(host.output(id), Some("n=2"));
        assert!(!host.is_dirty(id));
    }

    #[test]
    fn unequal_snapshot_required_for_dirty() {
        let (controls, set) = provide_controls((1, 'a'));
        let mut host = RenderHost::new();
        let c = controls.clone();
        let id = host.mount(move |cx| use_control(cx, &c, |s: &(i32, char)| s.0).to_string());

        set.set((1, 'b'));
        assert!(!host.is_dirty(id));
        set.set((2, 'b'));
        assert!(host.is_dirty(id));
    }

    #[test]
    fn dropped_call_site_releases_subscription() {
        let (controls, _set) = provide_controls(0);
        let show = Rc::new(std::cell::Cell::new(true));
        let mut host = RenderHost::new();

        let (c, s) = (controls.clone(), Rc::clone(&show));
        let id = host.mount(move |cx| {
            if s.get() {
                use_control_state(cx, &c).to_string()
            } else {
                String::from("hidden")
            }
        });
        assert_eq!(controls.subscriber_count(), 1);

        show.set(false);
        host.rerender(id).unwrap();
        assert_eq!(controls.subscriber_count(), 0);
        assert_eq!(host.stats().unsubscribes, 1);
    }

    #[test]
    fn unknown_component_errors() {
        let mut host = RenderHost::new();
        let id = host.mount(|_| String::new());
        host.unmount(id).unwrap();
        assert_eq!(host.unmount(id), Err(HostError::UnknownComponent(id)));
        assert_eq!(host.rerender(id), Err(HostError::UnknownComponent(id)));
        assert_eq!(host.output(id), None);
    }

    #[test]
    fn dropping_host_releases_subscriptions() {
        let (controls, _set) = provide_controls(0);
        {
            let mut host = RenderHost::new();
            let c = controls.clone();
            host.mount(move |cx| use_control_state(cx, &c).to_string());
            assert_eq!(controls.subscriber_count(), 1);
        }
        assert_eq!(controls.subscriber_count(), 0);
    }

    #[test]
    fn config_clamps_pass_cap() {
        assert_eq!(HostConfig::default().with_max_flush_passes(0).max_flush_passes, 1);
    }

    #[test]
    fn zero_pass_cap_still_renders_one_pass() {
        let (controls, set) = provide_controls(0);
        let mut host = RenderHost::with_config(HostConfig {
            max_flush_passes: 0,
        });
        let c = controls.clone();
        let id = host.mount(move |cx| use_control_state(cx, &c).to_string());

        assert_eq!(host.act(|| set.set(1)), Ok(()));
        assert_eq!(host.output(id), Some("1"));
    }

    #[test]
    fn reordered_slot_surfaces_scope_error() {
        let swapped = Rc::new(std::cell::Cell::new(false));
        let mut host = RenderHost::new();

        let s = Rc::clone(&swapped);
        let id = host
            .try_mount(move |cx| {
                if s.get() {
                    let label = cx.scope().try_lazy(|| String::from("x"))?;
                    Ok(label.to_string())
                } else {
                    let n = cx.scope().try_lazy(|| 7u32)?;
                    Ok(n.to_string())
                }
            })
            .unwrap();
        assert_eq!(host.output(id), Some("7"));

        swapped.set(true);
        let err = host.rerender(id).unwrap_err();
        assert!(matches!(
            err,
            HostError::Scope(ScopeError::SlotTypeMismatch { index: 0, .. })
        ));
        assert_eq!(host.output(id), Some("7"));
    }

    #[test]
    fn failed_first_render_is_rolled_back() {
        let (controls, _set) = provide_controls(0);
        let mut host = RenderHost::new();

        let c = controls.clone();
        let result = host.try_mount(move |cx| {
            use_control_state(cx, &c);
            Err(HostError::Scope(ScopeError::SlotTypeMismatch {
                index: 0,
                expected: "u32",
                found: "String",
            }))
        });

        assert!(matches!(result, Err(HostError::Scope(_))));
        assert_eq!(host.mounted(), 0);
        assert_eq!(controls.subscriber_count(), 0);
    }

    #[test]
    fn failing_render_keeps_rest_of_pass_dirty() {
        let (controls, set) = provide_controls(0);
        let mut host = RenderHost::new();

        let c = controls.clone();
        let failing = host
            .try_mount(move |cx| {
                let n = use_control_state(cx, &c);
                if n == 0 {
                    Ok(n.to_string())
                } else {
                    Err(HostError::Scope(ScopeError::SlotTypeMismatch {
                        index: 0,
                        expected: "i32",
                        found: "String",
                    }))
                }
            })
            .unwrap();
        let c = controls.clone();
        let healthy = host.mount(move |cx| use_control_state(cx, &c).to_string());

        set.set(1);
        assert!(matches!(host.flush(), Err(HostError::Scope(_))));
        assert_eq!(host.output(failing), Some("0"));
        assert!(!host.is_dirty(failing));
        assert!(host.is_dirty(healthy));

        assert_eq!(host.flush(), Ok(1));
        assert_eq!(host.output(healthy), Some("1"));
    }

    #[test]
    fn debug_format() {
        let host = RenderHost::new();
        assert!(format!("{host:?}").contains("RenderHost"));
    }
}
