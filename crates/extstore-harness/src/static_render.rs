#![forbid(unsafe_code)]

//! One-shot rendering without live subscriptions.
//!
//! [`render_static`] runs a render closure once against a fresh [`Scope`].
//! Store reads use the fallback (server) snapshot when one is supplied and
//! never subscribe, so nothing outlives the call.

use extstore_core::{ExternalStoreHost, Scope, Snapshot, SubscribeFn};

/// Context for [`render_static`].
#[derive(Debug, Default)]
pub struct StaticCx {
    scope: Scope,
    reads: usize,
}

impl StaticCx {
    /// The render's throwaway scope.
    pub fn scope(&mut self) -> &mut Scope {
        &mut self.scope
    }

    /// Number of store reads performed so far.
    #[must_use]
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl ExternalStoreHost for StaticCx {
    fn sync_external_store<X>(
        &mut self,
        _subscribe: &SubscribeFn,
        get_snapshot: Snapshot<X>,
        get_server_snapshot: Option<Snapshot<X>>,
    ) -> X
    where
        X: Clone + PartialEq + 'static,
    {
        self.reads += 1;
        match get_server_snapshot {
            Some(read) => read(),
            None => get_snapshot(),
        }
    }
}

/// Render once, with no subscriptions.
pub fn render_static(render: impl FnOnce(&mut StaticCx) -> String) -> String {
    let mut cx = StaticCx::default();
    cx.scope.begin_render();
    let output = render(&mut cx);
    tracing::debug!(reads = cx.reads, "static render");
    output
}
