//! Error types for orgclone-core.

use thiserror::Error;

/// Errors raised while mapping a repository name onto the local tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The name is malformed or would resolve outside the organization root.
    #[error("invalid repository name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
}
