//! Error types.

/// Errors from [`Scope`](crate::scope::Scope) slot access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A slot was read back as a different type than it was created with.
    /// This happens when the order of slot accesses changes between renders.
    SlotTypeMismatch {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

impl std::fmt::Display for ScopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SlotTypeMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "scope slot {index} holds `{found}` but `{expected}` was requested; \
                 slot access order must not change between renders"
            ),
        }
    }
}

impl std::error::Error for ScopeError {}
