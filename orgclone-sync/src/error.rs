//! Error types for orgclone-sync.

use std::path::PathBuf;

use thiserror::Error;

use orgclone_core::ResolveError;
use orgclone_forge::ForgeError;

/// Why a single repository could not be reconciled.
///
/// These never abort a run; each one is carried in that repository's
/// [`crate::ReconciliationResult`].
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    InvalidName(#[from] ResolveError),

    /// Something other than a git work tree occupies the target path.
    #[error("{path} exists but is not a git work tree ({reason}); leaving it untouched")]
    PathConflict { path: PathBuf, reason: &'static str },

    /// Local commits are missing from the remote, so a fast-forward is impossible.
    #[error("local history at {path} has diverged from its upstream ({ahead} local-only, {behind} remote-only commits)")]
    DivergedHistory {
        path: PathBuf,
        ahead: usize,
        behind: usize,
    },

    /// The existing repository tracks a different remote.
    #[error("origin of {path} is {found}, expected {expected}")]
    UpstreamMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    /// The current branch tracks nothing on `origin`, so there is no tip to
    /// compare against.
    #[error("branch {branch} at {path} has no remote-tracking branch on origin")]
    NoUpstream { path: PathBuf, branch: String },

    #[error("{path} has a detached HEAD; no branch to fast-forward")]
    DetachedHead { path: PathBuf },

    /// Clone, fetch or checkout failure, including network and auth errors.
    #[error("git error at {path}: {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cancelled before completion")]
    Cancelled,

    /// The worker running this reconciliation panicked.
    #[error("reconcile worker failed: {0}")]
    Worker(String),
}

/// Errors that abort a whole organization sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The repository listing failed; nothing was reconciled.
    #[error("failed to list repositories for '{organization}': {source}")]
    Listing {
        organization: String,
        #[source]
        source: ForgeError,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("listing task failed: {0}")]
    Join(String),
}

/// Convenience constructor for [`ReconcileError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ReconcileError {
    ReconcileError::Io {
        path: path.into(),
        source,
    }
}
