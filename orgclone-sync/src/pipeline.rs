//! Organization sync: list, resolve, reconcile every repository.
//!
//! Fan-out is one task per repository on a [`JoinSet`]; a [`Semaphore`] with
//! `concurrency` permits bounds how many reconciliations (and therefore how
//! many network connections and open repositories) are in flight. Each task
//! owns its result slot; results are merged only after the join barrier.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

use orgclone_core::{resolve, LocalTarget, RepoName, RepositoryRef};
use orgclone_forge::RepositoryLister;

use crate::cancel::CancelToken;
use crate::error::{ReconcileError, SyncError};
use crate::git::{Credentials, TransferOptions};
use crate::reconcile::{Outcome, ReconciliationResult, Reconciler};

pub const DEFAULT_CONCURRENCY: usize = 8;

/// Per-run settings, passed explicitly so concurrent runs never share state.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Maximum number of repositories reconciled at once (minimum 1).
    pub concurrency: usize,
    /// Used for HTTPS clone/fetch authentication.
    pub credentials: Option<Credentials>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            credentials: None,
        }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct SyncReport {
    pub organization: String,
    pub root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sorted by repository name.
    pub results: Vec<ReconciliationResult>,
}

/// Outcome counts for a [`SyncReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    pub cloned: usize,
    pub updated: usize,
    pub up_to_date: usize,
    pub failed: usize,
}

impl SyncReport {
    pub fn totals(&self) -> SyncTotals {
        let mut totals = SyncTotals::default();
        for result in &self.results {
            match result.outcome {
                Outcome::Cloned { .. } => totals.cloned += 1,
                Outcome::Updated { .. } => totals.updated += 1,
                Outcome::UpToDate { .. } => totals.up_to_date += 1,
                Outcome::Failed(_) => totals.failed += 1,
            }
        }
        totals
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReconciliationResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }
}

/// Mirror every repository of `organization` below `root`.
///
/// Fails only if listing fails (before anything is written) or `root` cannot
/// be created. Per-repository failures are reported in the returned report.
pub async fn sync_organization<L>(
    lister: Arc<L>,
    organization: &str,
    root: &Path,
    config: &SyncConfig,
    cancel: CancelToken,
) -> Result<SyncReport, SyncError>
where
    L: RepositoryLister + ?Sized + 'static,
{
    let started_at = Utc::now();

    let org = organization.to_string();
    let repos = tokio::task::spawn_blocking(move || lister.list_org_repositories(&org))
        .await
        .map_err(|e| SyncError::Join(e.to_string()))?
        .map_err(|source| SyncError::Listing {
            organization: organization.to_string(),
            source,
        })?;
    info!(
        organization,
        count = repos.len(),
        root = %root.display(),
        "listed repositories"
    );

    // A run cancelled while listing still reports every repository, but
    // writes nothing.
    if !cancel.is_cancelled() {
        std::fs::create_dir_all(root).map_err(|source| SyncError::Io {
            path: root.to_path_buf(),
            source,
        })?;
    }

    let results = reconcile_all(repos, root, config, cancel).await;

    Ok(SyncReport {
        organization: organization.to_string(),
        root: root.to_path_buf(),
        started_at,
        finished_at: Utc::now(),
        results,
    })
}

/// Reconcile `repos` below `root` on the bounded worker pool.
///
/// Returns one result per distinct repository name, sorted by name.
pub async fn reconcile_all(
    repos: Vec<RepositoryRef>,
    root: &Path,
    config: &SyncConfig,
    cancel: CancelToken,
) -> Vec<ReconciliationResult> {
    let reconciler = Reconciler::new(TransferOptions {
        credentials: config.credentials.clone(),
        cancel: cancel.clone(),
    });
    let work = move |name: &RepoName, target: &LocalTarget, url: &str| {
        reconciler.reconcile(name, target, url)
    };

    let mut results = Vec::with_capacity(repos.len());
    let mut seen = HashSet::new();
    let mut jobs = Vec::with_capacity(repos.len());

    for repo in repos {
        if !seen.insert(repo.name.clone()) {
            warn!(repo = %repo.name, "repository listed twice, reconciling it once");
            continue;
        }

        match resolve(root, repo.name.as_str()) {
            Ok(target) => jobs.push(Job {
                name: repo.name,
                target,
                remote_url: repo.clone_url,
            }),
            Err(err) => {
                warn!(repo = %repo.name, error = %err, "refusing to reconcile");
                results.push(ReconciliationResult::failed(repo.name, None, err.into()));
            }
        }
    }

    results.extend(run_bounded(jobs, config.concurrency, cancel, work).await);
    results.sort_by(|a, b| a.name.cmp(&b.name));
    results
}

/// One resolved repository waiting for a worker.
struct Job {
    name: RepoName,
    target: LocalTarget,
    remote_url: String,
}

/// Run `work` for every job with at most `concurrency` (minimum 1) calls in
/// flight. Every job yields exactly one result, even if its task dies.
async fn run_bounded<F>(
    jobs: Vec<Job>,
    concurrency: usize,
    cancel: CancelToken,
    work: F,
) -> Vec<ReconciliationResult>
where
    F: Fn(&RepoName, &LocalTarget, &str) -> ReconciliationResult + Send + Sync + 'static,
{
    let work = Arc::new(work);
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    let mut slots: HashMap<task::Id, (RepoName, LocalTarget)> = HashMap::new();

    for job in jobs {
        let work = work.clone();
        let permits = permits.clone();
        let cancel = cancel.clone();
        let slot = (job.name.clone(), job.target.clone());
        let handle = tasks.spawn(async move {
            let Job {
                name,
                target,
                remote_url,
            } = job;
            // The semaphore is never closed, so acquire only fails if it were.
            let Ok(_permit) = permits.acquire_owned().await else {
                return ReconciliationResult::failed(name, Some(target), ReconcileError::Cancelled);
            };
            if cancel.is_cancelled() {
                return ReconciliationResult::failed(name, Some(target), ReconcileError::Cancelled);
            }

            let slot_name = name.clone();
            let slot_target = target.clone();
            let blocking = move || work(&name, &target, &remote_url);
            match tokio::task::spawn_blocking(blocking).await {
                Ok(result) => result,
                Err(err) => ReconciliationResult::failed(
                    slot_name,
                    Some(slot_target),
                    ReconcileError::Worker(err.to_string()),
                ),
            }
        });
        slots.insert(handle.id(), slot);
    }

    let mut results = Vec::with_capacity(slots.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, result)) => {
                slots.remove(&id);
                results.push(result);
            }
            Err(err) => {
                error!(error = %err, "reconcile task aborted");
                if let Some((name, target)) = slots.remove(&err.id()) {
                    results.push(ReconciliationResult::failed(
                        name,
                        Some(target),
                        ReconcileError::Worker(err.to_string()),
                    ));
                }
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn jobs(count: usize) -> Vec<Job> {
        (0..count)
            .map(|i| {
                let name = format!("repo-{i}");
                Job {
                    target: LocalTarget {
                        path: PathBuf::from("/srv/acme").join(&name),
                    },
                    name: RepoName::from(name),
                    remote_url: format!("https://example.test/acme/repo-{i}.git"),
                }
            })
            .collect()
    }

    /// Work that sleeps briefly and records the most calls seen at once.
    fn counting_work(
        peak: Arc<AtomicUsize>,
    ) -> impl Fn(&RepoName, &LocalTarget, &str) -> ReconciliationResult + Send + Sync + 'static {
        let in_flight = Arc::new(AtomicUsize::new(0));
        move |name, target, _url| {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            ReconciliationResult {
                name: name.clone(),
                target: Some(target.clone()),
                outcome: Outcome::UpToDate { head: None },
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn in_flight_work_never_exceeds_concurrency() {
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded(jobs(8), 2, CancelToken::new(), counting_work(peak.clone())).await;

        assert_eq!(results.len(), 8);
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=2).contains(&peak), "peak in-flight was {peak}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zero_concurrency_runs_one_at_a_time() {
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded(jobs(4), 0, CancelToken::new(), counting_work(peak.clone())).await;

        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| !r.outcome.is_failure()));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_work_still_reports_its_repository() {
        let work = |name: &RepoName, target: &LocalTarget, _url: &str| {
            if name.as_str() == "repo-1" {
                panic!("worker blew up");
            }
            ReconciliationResult {
                name: name.clone(),
                target: Some(target.clone()),
                outcome: Outcome::UpToDate { head: None },
            }
        };

        let mut results = run_bounded(jobs(3), 2, CancelToken::new(), work).await;
        results.sort_by(|a, b| a.name.cmp(&b.name));

        let names: Vec<_> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["repo-0", "repo-1", "repo-2"]);
        assert!(matches!(
            results[1].outcome,
            Outcome::Failed(ReconcileError::Worker(_))
        ));
        assert!(results[1].target.is_some());
    }

    #[tokio::test]
    async fn cancelled_jobs_never_reach_the_worker() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let peak = Arc::new(AtomicUsize::new(0));

        let results = run_bounded(jobs(3), 2, cancel, counting_work(peak.clone())).await;

        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|r| matches!(r.outcome, Outcome::Failed(ReconcileError::Cancelled))));
        assert_eq!(peak.load(Ordering::SeqCst), 0);
    }
}
