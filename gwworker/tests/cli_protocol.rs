//! Drives the compiled `gwworker` binary itself over real stdin/stdout
//! pipes -- the same way `gwserver`'s supervisor talks to it -- rather than
//! calling `protocol::dispatch` in-process. Also covers `WorkerSlot`
//! reattachment: a worker relaunched against the same `DB_PATH` sees the
//! prior process's writes.

use std::{
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
};

use serde_json::{json, Value};

fn worker_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_gwworker"))
}

struct WorkerProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl WorkerProcess {
    fn spawn(db_path: &Path) -> Self {
        let mut child = Command::new(worker_bin())
            .env("DB_PATH", db_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .expect("failed to spawn gwworker");
        let stdin = child.stdin.take().expect("piped");
        let stdout = BufReader::new(child.stdout.take().expect("piped"));
        Self {
            child,
            stdin,
            stdout,
        }
    }

    fn call(&mut self, id: u64, method: &str, params: Value) -> Value {
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        writeln!(self.stdin, "{request}").expect("write to worker stdin");
        self.stdin.flush().expect("flush worker stdin");

        let mut line = String::new();
        self.stdout
            .read_line(&mut line)
            .expect("read from worker stdout");
        serde_json::from_str(&line).expect("worker response is valid JSON")
    }

    /// Close stdin (the gateway's graceful-shutdown signal) and wait for
    /// the process to exit.
    fn finish(mut self) {
        drop(self.stdin);
        self.child.wait().expect("worker did not exit cleanly");
    }
}

#[test]
fn insert_then_select_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerProcess::spawn(&dir.path().join("tenant_test.db"));

    let response = worker.call(1, "insert", json!({"name": "x", "value": "1"}));
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["status"], "inserted");
    assert_eq!(response["result"]["id"], 1);

    let response = worker.call(2, "select", json!({}));
    let rows = response["result"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "x");

    worker.finish();
}

#[test]
fn state_persists_across_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tenant_test.db");

    {
        let mut worker = WorkerProcess::spawn(&db_path);
        worker.call(1, "insert", json!({"name": "a", "value": "1"}));
        worker.finish();
    }

    let mut worker = WorkerProcess::spawn(&db_path);
    let response = worker.call(1, "select", json!({}));
    let rows = response["result"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "a");
    worker.finish();
}

#[test]
fn update_unknown_id_reports_zero_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerProcess::spawn(&dir.path().join("tenant_test.db"));

    let response = worker.call(1, "update", json!({"id": 99, "value": "z"}));
    assert_eq!(response["result"]["rows"], 0);

    worker.finish();
}

#[test]
fn requests_are_answered_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut worker = WorkerProcess::spawn(&dir.path().join("tenant_test.db"));

    let r1 = worker.call(1, "insert", json!({"name": "a", "value": "1"}));
    let r2 = worker.call(2, "insert", json!({"name": "b", "value": "2"}));
    assert_eq!(r1["result"]["id"], 1);
    assert_eq!(r2["result"]["id"], 2);

    worker.finish();
}
