//! Domain types shared by the listing, sync and CLI crates.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A repository name, unique within one organization.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepoName(pub String);

impl RepoName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<String> for RepoName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RepoName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// One remote repository as reported by the listing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub name: RepoName,
    /// Fetchable location: an HTTPS/SSH URL or a local path.
    pub clone_url: String,
}

impl RepositoryRef {
    pub fn new(name: impl Into<RepoName>, clone_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clone_url: clone_url.into(),
        }
    }
}

/// The local working copy a repository is reconciled into.
///
/// Only [`crate::resolver::resolve`] constructs targets outside of tests, so a
/// `LocalTarget` always sits directly below its organization root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalTarget {
    pub path: PathBuf,
}

impl LocalTarget {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for LocalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.path.display(), f)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(RepoName::from("widgets").to_string(), "widgets");
        assert_eq!(RepoName::from("widgets").as_str(), "widgets");
    }

    #[test]
    fn newtype_equality() {
        let a = RepoName::from("x");
        let b = RepoName::from(String::from("x"));
        assert_eq!(a, b);
    }

    #[test]
    fn repository_ref_serde_roundtrip() {
        let repo = RepositoryRef::new("api", "https://github.com/acme/api.git");
        let json = serde_json::to_string(&repo).expect("serialize");
        let back: RepositoryRef = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(repo, back);
    }

    #[test]
    fn local_target_display_is_path() {
        let target = LocalTarget {
            path: PathBuf::from("/srv/acme/api"),
        };
        assert_eq!(target.to_string(), "/srv/acme/api");
    }
}
