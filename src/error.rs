//! Error types
//!
//! [`ClientError`] covers configuration and caller mistakes and is returned
//! to the caller. [`FetchError`] covers everything that can go wrong on the
//! wire; the client logs it and hands back an empty response instead.

use crate::resource::Engine;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unknown engine: {0}")]
    UnknownEngine(String),

    #[error("unknown service '{service}' for engine {engine}")]
    UnknownService { engine: Engine, service: String },

    #[error("no registry entry for {method} {group}:{mount_point} ({engine})")]
    MissingRegistryEntry {
        engine: Engine,
        group: String,
        mount_point: String,
        method: String,
    },

    #[error("{template} expects {expected} path argument(s), got {got}")]
    PathParamMismatch {
        template: String,
        expected: usize,
        got: usize,
    },

    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Only GET requests are ever sent
    #[error("read-only client refuses {0} requests")]
    ReadOnly(String),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("too many redirects: {0}")]
    Redirect(#[source] reqwest::Error),

    #[error("API request failed: {status}")]
    Status { status: u16 },

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether a later attempt could plausibly succeed.
    ///
    /// Connection failures, timeouts, 408, 429 and 5xx are transient; other
    /// 4xx statuses, redirect loops and refused methods are terminal.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Connect(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status } => {
                *status == 408 || *status == 429 || (500..600).contains(status)
            }
            FetchError::ReadOnly(_) | FetchError::Redirect(_) | FetchError::Request(_) => false,
        }
    }

    /// Status code for HTTP-level failures
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else if err.is_redirect() {
            FetchError::Redirect(err)
        } else if err.is_connect() {
            FetchError::Connect(err)
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Request(err)
        }
    }
}
