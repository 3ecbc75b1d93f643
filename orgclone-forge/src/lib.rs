//! # orgclone-forge
//!
//! Repository listing for a hosting-platform organization.
//!
//! The sync pipeline only depends on [`RepositoryLister`]; [`GitHubLister`]
//! is the production implementation against the GitHub REST API (and GitHub
//! Enterprise via a custom API URL).

pub mod error;
pub mod github;

use orgclone_core::RepositoryRef;

pub use error::ForgeError;
pub use github::{GitHubConfig, GitHubLister};

/// Source of the repositories that belong to an organization.
///
/// Implementations must drain every page before returning; a partial listing
/// is reported as an error, never as a shorter `Vec`.
pub trait RepositoryLister: Send + Sync {
    fn list_org_repositories(&self, organization: &str) -> Result<Vec<RepositoryRef>, ForgeError>;
}
