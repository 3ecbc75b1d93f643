//! Local git fixtures: a seed work tree pushing into a bare "remote".

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

pub const BRANCH: &str = "refs/heads/main";

/// A bare remote plus the seed work tree that publishes into it.
pub struct Remote {
    _dir: TempDir,
    pub bare: PathBuf,
    pub seed: PathBuf,
}

impl Remote {
    /// Remote with a single commit adding `first.txt`.
    pub fn with_first_commit() -> Self {
        let remote = Self::empty();
        remote.commit_and_push("first.txt", "first commit", "add first commit");
        remote
    }

    pub fn empty() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let seed = dir.path().join("seed");
        let bare = dir.path().join("remote.git");

        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let seed_repo = Repository::init_opts(&seed, &opts).expect("init seed");

        let mut bare_opts = RepositoryInitOptions::new();
        bare_opts.bare(true).initial_head("main");
        Repository::init_opts(&bare, &bare_opts).expect("init bare");

        seed_repo
            .remote("origin", bare.to_str().expect("utf-8 path"))
            .expect("add origin");

        Self {
            _dir: dir,
            bare,
            seed,
        }
    }

    pub fn url(&self) -> String {
        self.bare.to_string_lossy().into_owned()
    }

    pub fn commit_and_push(&self, file: &str, content: &str, message: &str) -> Oid {
        let repo = Repository::open(&self.seed).expect("open seed");
        let oid = commit_file(&repo, file, content, message);
        let mut origin = repo.find_remote("origin").expect("origin");
        origin
            .push(&[format!("{BRANCH}:{BRANCH}")], None)
            .expect("push");
        oid
    }

    pub fn head(&self) -> Oid {
        Repository::open_bare(&self.bare)
            .expect("open bare")
            .refname_to_id(BRANCH)
            .expect("remote branch")
    }
}

/// Stage and commit `file` on the current branch of `repo`.
pub fn commit_file(repo: &Repository, file: &str, content: &str, message: &str) -> Oid {
    let workdir = repo.workdir().expect("work tree");
    fs::write(workdir.join(file), content).expect("write file");

    let mut index = repo.index().expect("index");
    index.add_path(Path::new(file)).expect("add");
    index.write().expect("write index");
    let tree = repo
        .find_tree(index.write_tree().expect("write tree"))
        .expect("tree");

    let signature = Signature::now("test", "test@example.com").expect("signature");
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .expect("commit")
}

pub fn head_of(path: &Path) -> Oid {
    Repository::open(path)
        .expect("open local")
        .head()
        .expect("head")
        .target()
        .expect("direct ref")
}

pub fn commit_count(path: &Path) -> usize {
    let repo = Repository::open(path).expect("open local");
    let mut walk = repo.revwalk().expect("revwalk");
    walk.push_head().expect("push head");
    walk.count()
}

/// Every entry directly below `dir`, sorted.
pub fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|it| {
            it.filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
