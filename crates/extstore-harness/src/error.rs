//! Error types for the reference host.

use extstore_core::ScopeError;

use crate::host::ComponentId;

/// Errors from [`RenderHost`](crate::RenderHost) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The component was never mounted or has been unmounted.
    UnknownComponent(ComponentId),
    /// Components kept re-dirtying each other past the configured pass cap.
    RenderLoop { passes: usize },
    /// A fallible render failed to read back one of its scope slots.
    Scope(ScopeError),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownComponent(id) => write!(f, "unknown component {id}"),
            Self::RenderLoop { passes } => {
                write!(f, "render loop: components still dirty after {passes} flush passes")
            }
            Self::Scope(err) => write!(f, "render failed: {err}"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Scope(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ScopeError> for HostError {
    fn from(err: ScopeError) -> Self {
        Self::Scope(err)
    }
}
