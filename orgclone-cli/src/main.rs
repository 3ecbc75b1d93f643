//! clone-org-repos: mirror every repository of a GitHub organization.
//!
//! # Usage
//!
//! ```text
//! GITHUB_TOKEN=... clone-org-repos --org <name> [--path <dir>] [--concurrency N]
//!                                  [--api-url URL] [--per-page N] [--json]
//! ```
//!
//! Exit status is non-zero when `GITHUB_TOKEN` is missing, the repository
//! listing fails, or the run is interrupted. Individual repositories that
//! fail to clone or update are reported but do not change the exit status.

mod report;
mod sync;

use anyhow::Result;
use clap::Parser;

use sync::SyncArgs;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "clone-org-repos",
    version,
    about = "Clone all repositories in a GitHub organization and keep them up to date",
    long_about = "clone-org-repos clones every repository of an organization into a \
                  directory and fast-forwards the ones already cloned there."
)]
struct Cli {
    #[command(flatten)]
    sync: SyncArgs,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    cli.sync.run()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
