//! GitHub / GitHub Enterprise repository listing.
//!
//! `GET {api_url}/orgs/{org}/repos` is paginated; the next page is announced
//! in the RFC 8288 `Link` header (`<...>; rel="next"`). Pages are requested
//! until no `next` link is returned.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use orgclone_core::{RepoName, RepositoryRef};

use crate::error::ForgeError;
use crate::RepositoryLister;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: u32 = 100;

const ACCEPT: &str = "application/vnd.github+json";
const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Connection settings for [`GitHubLister`].
#[derive(Clone)]
pub struct GitHubConfig {
    /// API root, without trailing slash (e.g. `https://ghe.example.com/api/v3`).
    pub api_url: String,
    pub token: String,
    /// Page size, clamped to GitHub's 1..=100.
    pub per_page: u32,
    /// Extra attempts for 5xx / 429 / transport failures.
    pub max_retries: u32,
    /// Delay before retry `n` is `retry_backoff * n`.
    pub retry_backoff: Duration,
    pub timeout: Duration,
}

impl GitHubConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: token.into(),
            per_page: DEFAULT_PER_PAGE,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("per_page", &self.per_page)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff", &self.retry_backoff)
            .field("timeout", &self.timeout)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Lister
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    clone_url: String,
}

pub struct GitHubLister {
    config: GitHubConfig,
    agent: ureq::Agent,
}

impl GitHubLister {
    pub fn new(config: GitHubConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(concat!("clone-org-repos/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { config, agent }
    }

    fn first_page_url(&self, organization: &str) -> String {
        format!(
            "{}/orgs/{}/repos?per_page={}&type=all",
            self.config.api_url.trim_end_matches('/'),
            organization,
            self.config.per_page.clamp(1, 100),
        )
    }

    /// Fetch one page, retrying transient failures.
    fn fetch_page(
        &self,
        organization: &str,
        url: &str,
    ) -> Result<(Vec<ApiRepository>, Option<String>), ForgeError> {
        let mut attempt = 0;
        loop {
            match self.fetch_page_once(organization, url) {
                Ok(page) => return Ok(page),
                Err(err) if err.is_transient() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(%url, attempt, error = %err, "retrying repository listing request");
                    std::thread::sleep(self.config.retry_backoff * attempt);
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn fetch_page_once(
        &self,
        organization: &str,
        url: &str,
    ) -> Result<(Vec<ApiRepository>, Option<String>), ForgeError> {
        let response = self
            .agent
            .get(url)
            .set("Authorization", &format!("Bearer {}", self.config.token))
            .set("Accept", ACCEPT)
            .set("X-GitHub-Api-Version", API_VERSION)
            .call()
            .map_err(|err| classify(organization, url, err))?;

        let next = response.header("link").and_then(next_page_url);
        let repos: Vec<ApiRepository> =
            response.into_json().map_err(|source| ForgeError::Decode {
                url: url.to_string(),
                source,
            })?;
        Ok((repos, next))
    }
}

impl RepositoryLister for GitHubLister {
    fn list_org_repositories(&self, organization: &str) -> Result<Vec<RepositoryRef>, ForgeError> {
        let mut seen = HashSet::new();
        let mut repos = Vec::new();
        let mut next = Some(self.first_page_url(organization));
        let mut page = 0u32;

        while let Some(url) = next {
            page += 1;
            let (batch, following) = self.fetch_page(organization, &url)?;
            debug!(%organization, page, count = batch.len(), "fetched repository page");

            for api in batch {
                if !seen.insert(api.name.clone()) {
                    warn!(%organization, repo = %api.name, "duplicate repository in listing, skipping");
                    continue;
                }
                repos.push(RepositoryRef {
                    name: RepoName::from(api.name),
                    clone_url: api.clone_url,
                });
            }
            next = following;
        }

        Ok(repos)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn classify(organization: &str, url: &str, err: ureq::Error) -> ForgeError {
    match err {
        ureq::Error::Status(status, response) => {
            let body = response.into_string().unwrap_or_default();
            let message = api_message(&body);
            match status {
                401 | 403 => ForgeError::Unauthorized {
                    url: url.to_string(),
                    status,
                    message,
                },
                404 => ForgeError::NotFound {
                    organization: organization.to_string(),
                    url: url.to_string(),
                },
                _ => ForgeError::Status {
                    url: url.to_string(),
                    status,
                    message,
                },
            }
        }
        ureq::Error::Transport(transport) => ForgeError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        },
    }
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": ...}`.
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().chars().take(200).collect())
}

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
