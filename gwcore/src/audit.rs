//! The append-only audit record. One of these is written per gateway
//! request, whether allowed or denied; see `gwserver::audit` for the sink
//! that serializes and flushes these to disk.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Allow,
    Deny,
}

/// A single line of the `debug.log` audit sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Wall-clock timestamp, seconds since the Unix epoch.
    pub timestamp: i64,
    pub tenant: String,
    pub target: String,
    pub method: String,
    /// Snapshot of the request params, for post-hoc debugging. Not
    /// redacted -- the worker protocol carries no secrets.
    pub params: Value,
    pub decision: Decision,
    /// `"ok"` on success, otherwise a short error description. Never the
    /// full internal error chain.
    pub outcome: String,
}

impl AuditRecord {
    pub fn allow(
        timestamp: i64,
        tenant: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        params: Value,
        outcome: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            tenant: tenant.into(),
            target: target.into(),
            method: method.into(),
            params,
            decision: Decision::Allow,
            outcome: outcome.into(),
        }
    }

    pub fn deny(
        timestamp: i64,
        tenant: impl Into<String>,
        target: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Self {
        Self {
            timestamp,
            tenant: tenant.into(),
            target: target.into(),
            method: method.into(),
            params,
            decision: Decision::Deny,
            outcome: "access denied".to_owned(),
        }
    }
}
