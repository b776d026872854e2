//! Maps the worker wire protocol (spec.md §4.6) onto [`Store`] operations.
//! Params schema checking happens here, not at the gateway (spec.md §3
//! `ProxyRequest`) -- the supervisor forwards whatever params it was sent
//! without inspecting their shape.

use gwcore::proto::{WireVersion, WorkerOutcome, WorkerRequest, WorkerResponse};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::store::{Store, StoreError};

/// Handle one request line, returning the response line to write back.
/// Never panics or propagates an error out -- every failure (unknown
/// method, bad params, store I/O) becomes a `{"error": ...}` response body,
/// since the worker protocol has no failure mode below "one response line
/// per request line" (spec.md §4.6).
pub fn dispatch(store: &mut Store, request: WorkerRequest) -> WorkerResponse {
    let outcome = match request.method.as_str() {
        "insert" => handle_insert(store, &request.params),
        "update" => handle_update(store, &request.params),
        "select" => handle_select(store, &request.params),
        other => Err(format!("unsupported method {other:?}")),
    };

    let outcome = match outcome {
        Ok(result) => WorkerOutcome::Result { result },
        Err(error) => WorkerOutcome::Error { error },
    };

    WorkerResponse {
        jsonrpc: WireVersion,
        id: request.id,
        outcome,
    }
}

fn handle_insert(store: &mut Store, params: &Value) -> Result<Value, String> {
    #[derive(Deserialize)]
    struct Params {
        name: String,
        value: String,
    }
    let params: Params = serde_json::from_value(params.clone())
        .map_err(|e| format!("insert: invalid params: {e}"))?;
    let id = store
        .insert(params.name, params.value)
        .map_err(store_err)?;
    Ok(json!({ "status": "inserted", "id": id }))
}

fn handle_update(store: &mut Store, params: &Value) -> Result<Value, String> {
    #[derive(Deserialize)]
    struct Params {
        id: u64,
        value: String,
    }
    let params: Params = serde_json::from_value(params.clone())
        .map_err(|e| format!("update: invalid params: {e}"))?;
    let rows = store.update(params.id, params.value).map_err(store_err)?;
    Ok(json!({ "status": "updated", "rows": rows }))
}

fn handle_select(store: &Store, params: &Value) -> Result<Value, String> {
    #[derive(Deserialize, Default)]
    struct Params {
        #[serde(default)]
        id: Option<u64>,
    }
    let params: Params = if params.is_null() {
        Params::default()
    } else {
        serde_json::from_value(params.clone())
            .map_err(|e| format!("select: invalid params: {e}"))?
    };
    Ok(serde_json::to_value(store.select(params.id))
        .expect("Record serialization is infallible"))
}

fn store_err(e: StoreError) -> String {
    format!("store error: {e}")
}
