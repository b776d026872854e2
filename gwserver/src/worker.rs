//! A single worker process and its wire protocol. One [`WorkerSlot`] per
//! live target; see `supervisor.rs` for the target -> slot map that owns
//! these.

use std::{
    path::PathBuf,
    process::Stdio,
    sync::atomic::{AtomicI64, Ordering},
};

use gwcore::proto::{WorkerOutcome, WorkerRequest, WorkerResponse};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, ChildStdout, Command},
    sync::Mutex,
};

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn worker process: {0}")]
    Spawn(std::io::Error),
    #[error("failed to write request to worker stdin: {0}")]
    Write(std::io::Error),
    #[error("failed to read response from worker stdout: {0}")]
    Read(std::io::Error),
    #[error("worker closed its output before replying")]
    Eof,
    #[error("worker response was not valid JSON: {0}")]
    MalformedJson(serde_json::Error),
    #[error("worker response id {got} did not match request id {expected}")]
    IdMismatch { expected: u64, got: u64 },
}

/// A live worker's pipes, not yet wrapped in the slot's state machine.
struct WorkerHandle {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    next_id: u64,
}

impl WorkerHandle {
    async fn call(&mut self, method: &str, params: Value) -> Result<Value, WorkerError> {
        let id = self.next_id;
        self.next_id += 1;

        let request = WorkerRequest::new(id, method, params);
        let mut line = serde_json::to_vec(&request).expect("serialization is infallible");
        line.push(b'\n');

        self.stdin.write_all(&line).await.map_err(WorkerError::Write)?;
        self.stdin.flush().await.map_err(WorkerError::Write)?;

        let mut response_line = String::new();
        let bytes_read = self
            .stdout
            .read_line(&mut response_line)
            .await
            .map_err(WorkerError::Read)?;
        if bytes_read == 0 {
            return Err(WorkerError::Eof);
        }

        let response: WorkerResponse =
            serde_json::from_str(&response_line).map_err(WorkerError::MalformedJson)?;
        if response.id != id {
            return Err(WorkerError::IdMismatch {
                expected: id,
                got: response.id,
            });
        }

        match response.outcome {
            WorkerOutcome::Result { result } => Ok(result),
            WorkerOutcome::Error { error } => Ok(serde_json::json!({ "error": error })),
        }
    }
}

/// `Spawning` and `InUse` are implicit here rather than stored: `Spawning` is
/// just the moment inside `call()` between observing `NotSpawned`/`Faulted`
/// and installing a fresh `Ready` handle, and `InUse` is "some task currently
/// holds this slot's mutex guard".
enum SlotState {
    NotSpawned,
    Ready(WorkerHandle),
    Faulted,
    Closed,
}

/// One tenant target's worker process, plus the mutex that serializes
/// requests to it. At most one [`WorkerSlot`] exists per target at any time
/// (enforced by the supervisor's map).
pub struct WorkerSlot {
    pub target: String,
    state: Mutex<SlotState>,
    worker_bin: PathBuf,
    data_dir: PathBuf,
    /// Seconds since the Unix epoch of the last completed call, for optional
    /// idle-timeout reaping (spec.md §9 -- off by default).
    last_activity: AtomicI64,
}

impl WorkerSlot {
    pub fn new(target: impl Into<String>, worker_bin: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            target: target.into(),
            state: Mutex::new(SlotState::NotSpawned),
            worker_bin,
            data_dir,
            last_activity: AtomicI64::new(now_unix()),
        }
    }

    pub fn last_activity(&self) -> i64 {
        self.last_activity.load(Ordering::Relaxed)
    }

    /// If this slot has a live worker that's been idle longer than
    /// `idle_timeout`, close it. Returns whether it reaped anything. A
    /// slot mid-request holds its mutex for the duration of the call, so
    /// this never interrupts in-flight work -- it just waits behind it,
    /// same as any other caller of this slot.
    pub async fn reap_if_idle(&self, idle_timeout: std::time::Duration) -> bool {
        let idle_for = now_unix() - self.last_activity();
        if idle_for < idle_timeout.as_secs() as i64 {
            return false;
        }
        let mut guard = self.state.lock().await;
        if matches!(*guard, SlotState::Ready(_)) {
            if let SlotState::Ready(mut handle) =
                std::mem::replace(&mut *guard, SlotState::NotSpawned)
            {
                drop(handle.stdin.shutdown().await);
                let _ = handle.child.kill().await;
            }
            true
        } else {
            false
        }
    }

    /// Storage path derived deterministically from the target, per
    /// spec.md §4.5, so a restarted worker reattaches to the same state.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("tenant_{}.db", self.target))
    }

    fn spawn(&self) -> Result<WorkerHandle, WorkerError> {
        let mut child = Command::new(&self.worker_bin)
            .env("DB_PATH", self.db_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::Spawn)?;

        let stdin = child.stdin.take().expect("piped");
        let stdout = child.stdout.take().expect("piped");

        Ok(WorkerHandle {
            child,
            stdin,
            stdout: BufReader::new(stdout),
            next_id: 1,
        })
    }

    /// Serve one request through this slot, serialized against any other
    /// concurrent caller of the same slot (spec.md §4.5/§5: "requests to
    /// the same worker slot are processed in the order they acquire the
    /// slot's mutex"). Spawns or respawns the worker process if it isn't
    /// currently live.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, WorkerError> {
        let mut guard = self.state.lock().await;

        if matches!(*guard, SlotState::NotSpawned | SlotState::Faulted) {
            let handle = self.spawn()?;
            *guard = SlotState::Ready(handle);
        }

        let handle = match &mut *guard {
            SlotState::Ready(handle) => handle,
            _ => unreachable!("just spawned above"),
        };

        let result = handle.call(method, params).await;
        self.last_activity.store(now_unix(), Ordering::Relaxed);
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                *guard = SlotState::Faulted;
                Err(e)
            }
        }
    }

    /// Give the worker an EOF on stdin and a short grace period to exit
    /// before forcibly terminating it (spec.md §4.5, `<= 2s`). Permanently
    /// closes the slot -- only called once, at gateway shutdown.
    pub async fn shutdown(&self, grace_period: std::time::Duration) {
        let mut guard = self.state.lock().await;
        if let SlotState::Ready(handle) = &mut *guard {
            drop(handle.stdin.shutdown().await);
            match tokio::time::timeout(grace_period, handle.child.wait()).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(target = %self.target, "worker did not exit within grace period, killing");
                    let _ = handle.child.kill().await;
                }
            }
        }
        *guard = SlotState::Closed;
    }

    /// Kill the worker after its in-flight request blew past the deadline
    /// and mark the slot `Faulted`, not `Closed` -- the next request to
    /// this target must respawn rather than find a slot that can never be
    /// used again (spec.md §5: "the gateway closes the slot's pipes, marks
    /// the slot Faulted ... and respawns on the next use").
    pub async fn reset_after_timeout(&self) {
        let mut guard = self.state.lock().await;
        let previous = std::mem::replace(&mut *guard, SlotState::Faulted);
        if let SlotState::Ready(mut handle) = previous {
            let _ = handle.child.kill().await;
        }
    }
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
