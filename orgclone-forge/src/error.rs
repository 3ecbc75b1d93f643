//! Error types for orgclone-forge.

use thiserror::Error;

/// Errors from the repository listing API.
#[derive(Debug, Error)]
pub enum ForgeError {
    /// The token is missing, expired, or lacks access to the organization.
    #[error("authentication rejected by {url} (HTTP {status}): {message}")]
    Unauthorized {
        url: String,
        status: u16,
        message: String,
    },

    #[error("organization '{organization}' not found at {url}")]
    NotFound { organization: String, url: String },

    /// Any other non-success status, after retries for server errors.
    #[error("unexpected HTTP {status} from {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
    },

    /// DNS, connect, TLS or timeout failure, after retries.
    #[error("transport error talking to {url}: {message}")]
    Transport { url: String, message: String },

    #[error("failed to decode repository listing from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

impl ForgeError {
    /// Whether the same request may succeed if sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::Transport { .. } => true,
            ForgeError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
