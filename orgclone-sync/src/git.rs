//! Version-control primitives over git2.
//!
//! The reconciler only needs a handful of capabilities: clone with full
//! history, fetch the tracked remote, ask it for its default branch,
//! fast-forward the current branch, recognise a work tree, and read HEAD. Everything here is blocking and is expected to
//! run on the blocking pool.

use std::fmt;
use std::path::Path;

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    Commit, Cred, CredentialType, Delta, Direction, ErrorCode, FetchOptions, Oid, RemoteCallbacks,
    Repository,
};

use crate::cancel::CancelToken;

pub const ORIGIN: &str = "origin";

// ---------------------------------------------------------------------------
// Transfer options
// ---------------------------------------------------------------------------

/// Token credentials for HTTPS remotes.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    /// GitHub accepts any username alongside a token; `x-access-token` is the
    /// conventional one.
    pub fn token(token: impl Into<String>) -> Self {
        Self {
            username: "x-access-token".to_string(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Settings applied to every network transfer.
#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub credentials: Option<Credentials>,
    pub cancel: CancelToken,
}

impl TransferOptions {
    fn remote_callbacks(&self) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();

        let cancel = self.cancel.clone();
        callbacks.transfer_progress(move |_| !cancel.is_cancelled());

        // libgit2 calls back again after a rejected credential; one try only.
        let mut tried = false;
        let credentials = self.credentials.as_ref();
        callbacks.credentials(move |_url, username_from_url, allowed| {
            if tried {
                return Err(git2::Error::from_str("remote rejected the supplied credentials"));
            }
            tried = true;
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(creds) = credentials {
                    return Cred::userpass_plaintext(&creds.username, &creds.token);
                }
            }
            if allowed.contains(CredentialType::SSH_KEY) {
                return Cred::ssh_key_from_agent(username_from_url.unwrap_or("git"));
            }
            Err(git2::Error::from_str("no usable credentials for remote"))
        });
        callbacks
    }

    fn fetch_options(&self) -> FetchOptions<'_> {
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.remote_callbacks());
        options
    }
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

/// Clone `remote_url` with its full history into `dest`, checking out the
/// remote's default branch. `dest` must not exist or be empty.
pub fn clone_full_history(
    remote_url: &str,
    dest: &Path,
    transfer: &TransferOptions,
) -> Result<Repository, git2::Error> {
    RepoBuilder::new()
        .fetch_options(transfer.fetch_options())
        .clone(remote_url, dest)
}

/// Fetch `origin` using its configured refspecs. Only remote-tracking refs
/// and tags move; the work tree and local branches are untouched.
pub fn fetch_remote_refs(repo: &Repository, transfer: &TransferOptions) -> Result<(), git2::Error> {
    let mut remote = repo.find_remote(ORIGIN)?;
    let mut options = transfer.fetch_options();
    remote.fetch::<&str>(&[], Some(&mut options), None)
}

/// Ask `origin` which branch its HEAD points at, e.g. `refs/heads/main`.
///
/// `Ok(None)` while the remote has no commits.
pub fn remote_default_branch(
    repo: &Repository,
    transfer: &TransferOptions,
) -> Result<Option<String>, git2::Error> {
    let mut remote = repo.find_remote(ORIGIN)?;
    let connection =
        remote.connect_auth(Direction::Fetch, Some(transfer.remote_callbacks()), None)?;
    let branch = connection.default_branch();
    match branch {
        Ok(buf) => Ok(buf.as_str().map(str::to_string)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Move `branch_ref` to `new_tip`, update the work tree to match and make it
/// the current branch.
///
/// The checkout runs first and in safe mode, so uncommitted changes that would
/// be overwritten make the call fail before the branch moves. If the branch
/// then cannot be moved, the files the checkout touched are put back so the
/// work tree matches HEAD again. Callers must have checked that `new_tip`
/// descends from the current tip.
pub fn fast_forward_current_branch(
    repo: &Repository,
    branch_ref: &str,
    new_tip: Oid,
) -> Result<(), git2::Error> {
    let new_commit = repo.find_commit(new_tip)?;
    let old_commit = match current_head(repo)? {
        Some(oid) => Some(repo.find_commit(oid)?),
        None => None,
    };

    let mut checkout = CheckoutBuilder::new();
    checkout.safe();
    repo.checkout_tree(new_commit.as_object(), Some(&mut checkout))?;

    let moved = move_branch(repo, branch_ref, new_tip);
    if let (Err(err), Some(old_commit)) = (&moved, &old_commit) {
        if let Err(restore_err) = restore_checkout(repo, old_commit, &new_commit) {
            return Err(git2::Error::from_str(&format!(
                "{err}; restoring the previous checkout also failed: {restore_err}"
            )));
        }
    }
    moved
}

fn move_branch(repo: &Repository, branch_ref: &str, new_tip: Oid) -> Result<(), git2::Error> {
    match repo.find_reference(branch_ref) {
        Ok(mut reference) => {
            reference.set_target(new_tip, "orgclone: fast-forward")?;
        }
        Err(err) if err.code() == ErrorCode::NotFound => {
            repo.reference(branch_ref, new_tip, false, "orgclone: initial checkout")?;
        }
        Err(err) => return Err(err),
    }
    repo.set_head(branch_ref)
}

/// Undo a checkout of `new` over `old`, touching only the paths that differ
/// between the two trees.
fn restore_checkout(
    repo: &Repository,
    old: &Commit<'_>,
    new: &Commit<'_>,
) -> Result<(), git2::Error> {
    let diff = repo.diff_tree_to_tree(Some(&old.tree()?), Some(&new.tree()?), None)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| git2::Error::from_str("repository has no work tree"))?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    let mut restored = 0usize;
    let mut added = Vec::new();
    for delta in diff.deltas() {
        match delta.status() {
            Delta::Added => added.extend(delta.new_file().path().map(Path::to_path_buf)),
            _ => {
                if let Some(path) = delta.old_file().path() {
                    checkout.path(path);
                    restored += 1;
                }
            }
        }
    }
    // An empty path list would force-checkout the whole tree.
    if restored > 0 {
        repo.checkout_tree(old.as_object(), Some(&mut checkout))?;
    }

    let mut index = repo.index()?;
    for path in &added {
        match std::fs::remove_file(workdir.join(path)) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(git2::Error::from_str(&err.to_string())),
        }
        index.remove_path(path)?;
    }
    index.write()
}

/// Open `path` only if it is the root of a non-bare work tree.
///
/// Parent directories are not searched, so a plain directory nested inside
/// some other repository is not mistaken for a clone.
pub fn open_work_tree(path: &Path) -> Option<Repository> {
    let repo = Repository::open(path).ok()?;
    if repo.is_bare() {
        return None;
    }
    let workdir = repo.workdir()?.canonicalize().ok()?;
    let wanted = path.canonicalize().ok()?;
    (workdir == wanted).then_some(repo)
}

pub fn is_valid_repository(path: &Path) -> bool {
    open_work_tree(path).is_some()
}

/// HEAD commit, or `None` while the current branch is unborn.
pub fn current_head(repo: &Repository) -> Result<Option<Oid>, git2::Error> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}

// ---------------------------------------------------------------------------
// Helpers used by the reconciler
// ---------------------------------------------------------------------------

/// The branch HEAD points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentBranch {
    /// Full ref name, e.g. `refs/heads/main`.
    pub refname: String,
    /// `None` while unborn.
    pub tip: Option<Oid>,
}

/// `Ok(None)` for a detached HEAD.
pub fn current_branch(repo: &Repository) -> Result<Option<CurrentBranch>, git2::Error> {
    let head = repo.find_reference("HEAD")?;
    let Some(refname) = head.symbolic_target() else {
        return Ok(None);
    };
    let tip = match repo.refname_to_id(refname) {
        Ok(oid) => Some(oid),
        Err(err) if err.code() == ErrorCode::NotFound => None,
        Err(err) => return Err(err),
    };
    Ok(Some(CurrentBranch {
        refname: refname.to_string(),
        tip,
    }))
}

/// Tip of the remote-tracking branch `branch_ref` follows.
///
/// Uses the configured upstream when there is one, otherwise
/// `refs/remotes/origin/<branch>`. `Ok(None)` when that ref does not exist.
pub fn upstream_tip(repo: &Repository, branch_ref: &str) -> Result<Option<Oid>, git2::Error> {
    let configured = match repo.branch_upstream_name(branch_ref) {
        Ok(buf) => buf.as_str().map(str::to_string),
        Err(err) if err.code() == ErrorCode::NotFound => None,
        Err(err) => return Err(err),
    };
    let upstream = configured.unwrap_or_else(|| {
        let short = branch_ref.strip_prefix("refs/heads/").unwrap_or(branch_ref);
        format!("refs/remotes/{ORIGIN}/{short}")
    });
    match repo.refname_to_id(&upstream) {
        Ok(oid) => Ok(Some(oid)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

pub fn origin_url(repo: &Repository) -> Result<Option<String>, git2::Error> {
    match repo.find_remote(ORIGIN) {
        Ok(remote) => Ok(remote.url().map(str::to_string)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// `(ahead, behind)` commit counts of `local` relative to `upstream`.
pub fn ahead_behind(
    repo: &Repository,
    local: Oid,
    upstream: Oid,
) -> Result<(usize, usize), git2::Error> {
    repo.graph_ahead_behind(local, upstream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_redacts_token() {
        let creds = Credentials::token("ghp_secret");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("x-access-token"));
        assert!(!rendered.contains("ghp_secret"));
    }

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(!is_valid_repository(dir.path()));
    }

    #[test]
    fn bare_repository_is_not_a_work_tree() {
        let dir = tempfile::TempDir::new().unwrap();
        Repository::init_bare(dir.path()).unwrap();
        assert!(!is_valid_repository(dir.path()));
    }

    #[test]
    fn subdirectory_of_a_work_tree_is_not_its_root() {
        let dir = tempfile::TempDir::new().unwrap();
        Repository::init(dir.path()).unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        assert!(is_valid_repository(dir.path()));
        assert!(!is_valid_repository(&nested));
    }

    #[test]
    fn fresh_repository_has_unborn_head_on_a_branch() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        assert_eq!(current_head(&repo).unwrap(), None);
        let branch = current_branch(&repo).unwrap().expect("symbolic HEAD");
        assert!(branch.refname.starts_with("refs/heads/"));
        assert_eq!(branch.tip, None);
        assert_eq!(origin_url(&repo).unwrap(), None);
    }
}
