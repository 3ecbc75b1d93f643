//! # orgclone-sync
//!
//! Repository reconciliation and organization-wide sync orchestration.
//!
//! Call [`sync_organization`] to list and mirror every repository of an
//! organization, or [`Reconciler::reconcile`] to bring a single local copy up
//! to date with its remote.

pub mod cancel;
pub mod error;
pub mod git;
pub mod pipeline;
pub mod reconcile;

pub use cancel::CancelToken;
pub use error::{ReconcileError, SyncError};
pub use git::{Credentials, TransferOptions};
pub use pipeline::{reconcile_all, sync_organization, SyncConfig, SyncReport, SyncTotals};
pub use reconcile::{Outcome, ReconciliationResult, Reconciler};
