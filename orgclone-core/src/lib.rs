//! orgclone core library: domain types, local path resolution, errors.
//!
//! - [`types`]: newtypes and the repository/target structs
//! - [`error`]: [`ResolveError`]
//! - [`resolver`]: maps an organization root + repository name to a [`LocalTarget`]

pub mod error;
pub mod resolver;
pub mod types;

pub use error::ResolveError;
pub use resolver::{resolve, staging_path, STAGING_SUFFIX};
pub use types::{LocalTarget, RepoName, RepositoryRef};
