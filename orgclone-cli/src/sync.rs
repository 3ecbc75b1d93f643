//! The sync run: credentials, destination, listing, reconciliation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::warn;

use orgclone_forge::github::{DEFAULT_API_URL, DEFAULT_PER_PAGE};
use orgclone_forge::{GitHubConfig, GitHubLister};
use orgclone_sync::pipeline::DEFAULT_CONCURRENCY;
use orgclone_sync::{sync_organization, CancelToken, Credentials, SyncConfig};

use crate::report;

/// Environment variable holding the API and clone token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Arguments for a sync run.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Name of the organization whose repositories are mirrored.
    #[arg(long, short = 'o')]
    pub org: String,

    /// Directory to clone into. Defaults to your home directory; relative
    /// paths are taken relative to it.
    #[arg(long, short = 'p')]
    pub path: Option<PathBuf>,

    /// Maximum number of repositories cloned or updated at once.
    #[arg(long, short = 'j', default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// API root, e.g. https://ghe.example.com/api/v3 for GitHub Enterprise.
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Repositories requested per listing page (1-100).
    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    pub per_page: u32,

    /// Emit a machine-readable JSON report instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .with_context(|| format!("{TOKEN_ENV} must be set"))?;
        let home = dirs::home_dir().context("could not determine home directory")?;
        let root = destination(self.path.as_deref(), &home);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(self.run_async(token, root))
    }

    async fn run_async(self, token: String, root: PathBuf) -> Result<()> {
        let mut github = GitHubConfig::new(token.clone());
        github.api_url = self.api_url.clone();
        github.per_page = self.per_page;
        let lister = Arc::new(GitHubLister::new(github));

        let config = SyncConfig {
            concurrency: self.concurrency,
            credentials: Some(Credentials::token(token)),
        };
        let cancel = CancelToken::new();

        let run = sync_organization(lister, &self.org, &root, &config, cancel.clone());
        tokio::pin!(run);

        let report = tokio::select! {
            result = &mut run => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    warn!(error = %err, "ctrl-c handler failed");
                }
                warn!("received ctrl-c, abandoning in-flight transfers");
                cancel.cancel();
                // Let aborted clones clean up their staging directories.
                let _ = run.await;
                bail!("interrupted");
            }
        }
        .with_context(|| format!("failed to sync organization '{}'", self.org))?;

        if self.json {
            report::print_json(&report)?;
        } else {
            report::print_table(&report);
        }
        Ok(())
    }
}

/// Where repositories land: `home` when unset or empty, `path` when
/// absolute, otherwise `home/path`.
pub fn destination(path: Option<&Path>, home: &Path) -> PathBuf {
    match path {
        None => home.to_path_buf(),
        Some(p) if p.as_os_str().is_empty() => home.to_path_buf(),
        Some(p) if p.is_absolute() => p.to_path_buf(),
        Some(p) => home.join(p),
    }
}
