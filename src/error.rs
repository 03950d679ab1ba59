use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by the remote store for a listing, metadata or media request.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("rate limited (HTTP {status}): {message}")]
    RateLimited { status: u16, message: String },
    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    #[error("client error (HTTP {status}): {message}")]
    Client { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Builds the error for a non-success response from its status and body.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = error_message(body);
        if status == 429 || mentions_rate_limit(body) {
            RemoteError::RateLimited { status, message }
        } else if (500..600).contains(&status) {
            RemoteError::Server { status, message }
        } else {
            RemoteError::Client { status, message }
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, RemoteError::RateLimited { .. })
    }

    /// Rate limits, 5xx and connection level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            RemoteError::RateLimited { .. } | RemoteError::Server { .. } => true,
            RemoteError::Transport(err) => !err.is_builder() && !err.is_redirect(),
            RemoteError::Client { .. } | RemoteError::Decode(_) => false,
        }
    }
}

fn mentions_rate_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("ratelimitexceeded") || lower.contains("rate limit")
}

// Drive wraps failures as {"error": {"code": .., "message": ..}}; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Terminal failure of a single file. Never aborts the rest of the run.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("local access to {path:?} failed: {source}")]
    LocalAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<TransferError>,
    },
    #[error("{path:?} holds {local} bytes but the remote file has {remote} and checksums differ")]
    Diverged { path: PathBuf, local: u64, remote: u64 },
    #[error("stream interrupted at byte {offset}: {reason}")]
    Interrupted { offset: u64, reason: String },
}

impl TransferError {
    pub fn local(path: impl Into<PathBuf>, source: io::Error) -> Self {
        TransferError::LocalAccess {
            path: path.into(),
            source,
        }
    }
}

/// Failures that end a whole invocation.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("cannot resolve root node: {0}")]
    RootLookup(#[source] RemoteError),
    #[error("cannot create destination {path:?}: {source}")]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
