//! The target -> [`WorkerSlot`] map. The map's mutex covers only
//! lookup/insert/remove (spec.md §5); all actual worker I/O happens after
//! the lock is released, inside the slot's own mutex.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use gwcore::error::RequestError;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::worker::{WorkerError, WorkerSlot};

/// Deadline for a single request to a worker before the slot is reset and a
/// timeout surfaced to the caller (spec.md §5).
pub const REQUEST_DEADLINE: Duration = Duration::from_secs(30);
/// Grace period given to a worker to exit on shutdown before it's killed
/// (spec.md §4.5, `<= 2s`).
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(2);

pub struct Supervisor {
    slots: Mutex<HashMap<String, Arc<WorkerSlot>>>,
    worker_bin: PathBuf,
    data_dir: PathBuf,
}

impl Supervisor {
    pub fn new(worker_bin: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            worker_bin,
            data_dir,
        }
    }

    async fn get_or_spawn_slot(&self, target: &str) -> Arc<WorkerSlot> {
        let mut slots = self.slots.lock().await;
        slots
            .entry(target.to_owned())
            .or_insert_with(|| {
                Arc::new(WorkerSlot::new(
                    target,
                    self.worker_bin.clone(),
                    self.data_dir.clone(),
                ))
            })
            .clone()
    }

    /// Route one call to `target`'s worker, spawning it lazily if this is
    /// the first request to see it. Enforces the 30s request deadline: on
    /// timeout the slot is closed and respawned on the next use.
    pub async fn call(
        &self,
        target: &str,
        method: &str,
        params: Value,
    ) -> Result<Value, RequestError> {
        if !gwcore::proto::is_allowed_method(method) {
            return Err(RequestError::Protocol(format!(
                "unsupported method {method:?}"
            )));
        }

        let slot = self.get_or_spawn_slot(target).await;

        match tokio::time::timeout(REQUEST_DEADLINE, slot.call(method, params)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(map_worker_error(e)),
            Err(_elapsed) => {
                // `tokio::time::timeout` drops the `slot.call()` future on
                // elapse, releasing its mutex guard; mark the slot Faulted
                // (not Closed -- that's reserved for final gateway
                // shutdown) so the next caller forces a respawn rather than
                // waiting behind a hung worker forever (spec.md §5).
                slot.reset_after_timeout().await;
                Err(RequestError::Timeout)
            }
        }
    }

    /// Gracefully shut down every live worker. Called once, at gateway
    /// shutdown.
    pub async fn shutdown_all(&self) {
        let slots = self.slots.lock().await;
        for slot in slots.values() {
            slot.shutdown(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    /// Close any slot idle longer than `idle_timeout`. Off by default
    /// (spec.md §9): the gateway only calls this in a loop when an operator
    /// opts in via `--idle-timeout-secs`.
    pub async fn reap_idle(&self, idle_timeout: Duration) {
        let targets: Vec<Arc<WorkerSlot>> = {
            let slots = self.slots.lock().await;
            slots.values().cloned().collect()
        };
        for slot in targets {
            if slot.reap_if_idle(idle_timeout).await {
                tracing::debug!(target = %slot.target, "supervisor.reaped_idle_slot");
            }
        }
    }
}

fn map_worker_error(e: WorkerError) -> RequestError {
    match e {
        WorkerError::Spawn(io) => RequestError::Protocol(format!("spawn failed: {io}")),
        WorkerError::Write(io) => RequestError::Protocol(format!("write failed: {io}")),
        WorkerError::Read(io) => RequestError::Protocol(format!("read failed: {io}")),
        WorkerError::Eof => RequestError::Protocol("worker exited mid-request".to_owned()),
        WorkerError::MalformedJson(e) => {
            RequestError::Protocol(format!("malformed worker response: {e}"))
        }
        WorkerError::IdMismatch { expected, got } => RequestError::Protocol(format!(
            "worker response id {got} did not match request id {expected}"
        )),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn rejects_unsupported_method() {
        let supervisor = Supervisor::new(
            PathBuf::from("/nonexistent/worker"),
            PathBuf::from("/tmp"),
        );
        let err = supervisor
            .call("a", "delete", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Protocol(_)));
    }

    #[tokio::test]
    async fn missing_worker_binary_is_a_protocol_error() {
        let supervisor = Supervisor::new(
            PathBuf::from("/nonexistent/worker"),
            PathBuf::from("/tmp"),
        );
        let err = supervisor
            .call("a", "select", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Protocol(_)));
    }
}
