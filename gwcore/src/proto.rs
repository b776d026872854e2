//! The two wire shapes that sandwich the gateway: the agent-facing HTTP
//! body, and the worker-facing line-delimited JSON-RPC-ish protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Methods a worker is required to support. Closed set -- the gateway
/// rejects anything else before it ever reaches a worker.
pub const ALLOWED_METHODS: &[&str] = &["insert", "update", "select"];

pub fn is_allowed_method(method: &str) -> bool {
    ALLOWED_METHODS.contains(&method)
}

/// The JSON body an agent POSTs to `/mcp/{target}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// The JSON body the gateway sends back to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProxyResponse {
    Result { result: Value },
    Error { error: String },
}

/// One line written to a worker's stdin. The gateway owns `id` generation;
/// the worker must echo it back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub jsonrpc: WireVersion,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl WorkerRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: WireVersion,
            id,
            method: method.into(),
            params,
        }
    }
}

/// One line read back from a worker's stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub jsonrpc: WireVersion,
    pub id: u64,
    #[serde(flatten)]
    pub outcome: WorkerOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerOutcome {
    Result { result: Value },
    Error { error: String },
}

/// The literal `"2.0"` string, serialized/deserialized without allocating a
/// throwaway `String` at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireVersion;

const JSONRPC_VERSION: &str = "2.0";

impl Serialize for WireVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for WireVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == JSONRPC_VERSION {
            Ok(WireVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version {s:?}, expected {JSONRPC_VERSION:?}"
            )))
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn worker_request_round_trips() {
        let req = WorkerRequest::new(1, "insert", json!({"name": "x", "value": "1"}));
        let line = serde_json::to_string(&req).unwrap();
        assert_eq!(
            line,
            r#"{"jsonrpc":"2.0","id":1,"method":"insert","params":{"name":"x","value":"1"}}"#
        );
        let parsed: WorkerRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.id, 1);
        assert_eq!(parsed.method, "insert");
    }

    #[test]
    fn worker_response_parses_result() {
        let line = r#"{"jsonrpc":"2.0","id":1,"result":{"status":"inserted","id":1}}"#;
        let resp: WorkerResponse = serde_json::from_str(line).unwrap();
        assert_eq!(resp.id, 1);
        assert!(matches!(resp.outcome, WorkerOutcome::Result { .. }));
    }

    #[test]
    fn worker_response_parses_error() {
        let line = r#"{"jsonrpc":"2.0","id":1,"error":"boom"}"#;
        let resp: WorkerResponse = serde_json::from_str(line).unwrap();
        match resp.outcome {
            WorkerOutcome::Error { error } => assert_eq!(error, "boom"),
            WorkerOutcome::Result { .. } => panic!("expected error outcome"),
        }
    }

    #[test]
    fn rejects_wrong_jsonrpc_version() {
        let line = r#"{"jsonrpc":"1.0","id":1,"result":{}}"#;
        let err = serde_json::from_str::<WorkerResponse>(line).unwrap_err();
        assert!(err.to_string().contains("unsupported jsonrpc version"));
    }

    #[test]
    fn allowed_methods_closed_set() {
        assert!(is_allowed_method("insert"));
        assert!(is_allowed_method("update"));
        assert!(is_allowed_method("select"));
        assert!(!is_allowed_method("delete"));
    }
}
