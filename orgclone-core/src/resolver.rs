//! Repository directory resolution.
//!
//! Every repository of an organization lands directly below the organization
//! root:
//!
//! ```text
//! <root>/
//!   <repo>/                     (working copy)
//!   .<repo>.orgclone-tmp/       (staging dir, only while a clone is in flight)
//! ```
//!
//! Resolution is pure: no filesystem access, no canonicalisation. The
//! listing API is trusted, but the resolver is still the last check before
//! anything is written, so names that could leave `<root>` are refused.

use std::path::{Component, Path, PathBuf};

use crate::error::ResolveError;
use crate::types::LocalTarget;

/// Suffix of the sibling directory a fresh clone is staged in.
pub const STAGING_SUFFIX: &str = ".orgclone-tmp";

/// Map `name` onto its working-copy path below `root`.
pub fn resolve(root: &Path, name: &str) -> Result<LocalTarget, ResolveError> {
    validate_name(name)?;
    Ok(LocalTarget {
        path: root.join(name),
    })
}

/// `<root>/.<name>.orgclone-tmp` for a resolved target.
///
/// Falls back to appending the suffix in place if the target has no file name,
/// which cannot happen for targets produced by [`resolve`].
pub fn staging_path(target: &LocalTarget) -> PathBuf {
    match (target.path.parent(), target.path.file_name()) {
        (Some(parent), Some(name)) => {
            parent.join(format!(".{}{STAGING_SUFFIX}", name.to_string_lossy()))
        }
        _ => PathBuf::from(format!("{}{STAGING_SUFFIX}", target.path.display())),
    }
}

fn validate_name(name: &str) -> Result<(), ResolveError> {
    let invalid = |reason| ResolveError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name == "." || name == ".." {
        return Err(invalid("name is a relative path segment"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("name contains a path separator"));
    }
    if name.chars().any(char::is_control) {
        return Err(invalid("name contains a control character"));
    }
    if name.ends_with(STAGING_SUFFIX) {
        return Err(invalid("name uses the reserved staging suffix"));
    }

    // Catches drive prefixes and anything else the platform treats specially.
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(part)), None) if part == name => Ok(()),
        _ => Err(invalid("name is not a single path component")),
    }
}
