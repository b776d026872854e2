//! Request-time error taxonomy shared by the agent and the gateway.
//!
//! `ConfigError` is deliberately absent here: it is fatal-at-startup-only
//! and belongs to each binary's own `main`, not to requests flowing through
//! the system. Everything in [`RequestError`] is something a single
//! request can fail with while the process keeps running.

/// One request's worth of failure, kind-only (no transport-specific
/// payload). Both `gwclient`'s transport and `gwserver`'s HTTP layer map
/// their richer internal errors onto this set at their respective
/// boundaries.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    /// TLS/connect failure, or retries exhausted against a 5xx/connection
    /// error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Token invalid, expired, or rejected after one invalidate-and-retry.
    #[error("auth error: {0}")]
    Auth(String),

    /// Valid token, but the policy set forbids (tenant, target, access).
    #[error("access denied")]
    PolicyDenied,

    /// The worker itself reported an `error` string. Not a protocol fault.
    #[error("worker error: {0}")]
    Worker(String),

    /// The worker produced malformed output, or exited mid-request.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The request did not complete before its deadline.
    #[error("timed out")]
    Timeout,
}

impl RequestError {
    /// The HTTP status the gateway maps this error to. Mirrors spec §7:
    /// only `PolicyDenied`/`Auth` get the "expected" 401/403; everything
    /// else collapses to the 5xx family without leaking internals.
    pub fn http_status(&self) -> u16 {
        match self {
            RequestError::Auth(_) => 401,
            RequestError::PolicyDenied => 403,
            RequestError::Worker(_) => 200,
            RequestError::Protocol(_) => 502,
            RequestError::Timeout => 504,
            RequestError::Transport(_) => 503,
        }
    }
}
