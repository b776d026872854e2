//! Append-only, newline-delimited JSON audit sink. Best-effort: a write
//! failure is logged and swallowed, never surfaced as a request failure
//! (spec.md §4.7).

use std::path::PathBuf;

use gwcore::audit::AuditRecord;
use tokio::{
    fs::OpenOptions,
    io::AsyncWriteExt,
    sync::Mutex,
};

pub struct AuditSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl AuditSink {
    pub async fn open(path: PathBuf) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Write one record and flush. Never returns an error to the caller --
    /// a failure here must not fail the request it's auditing.
    pub async fn write(&self, record: &AuditRecord) {
        let mut line = match serde_json::to_vec(record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "audit.serialize_failed");
                return;
            }
        };
        line.push(b'\n');

        let mut file = self.file.lock().await;
        if let Err(e) = file.write_all(&line).await {
            tracing::warn!(error = %e, path = %self.path.display(), "audit.write_failed");
            return;
        }
        if let Err(e) = file.flush().await {
            tracing::warn!(error = %e, path = %self.path.display(), "audit.flush_failed");
        }
    }
}

#[cfg(test)]
mod test {
    use gwcore::audit::AuditRecord;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn writes_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.log");
        let sink = AuditSink::open(path.clone()).await.unwrap();

        sink.write(&AuditRecord::allow(
            1_000,
            "tenant_a",
            "a",
            "insert",
            json!({}),
            "ok",
        ))
        .await;
        sink.write(&AuditRecord::deny(1_001, "tenant_a", "b", "insert", json!({})))
            .await;

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#""decision":"allow""#));
        assert!(lines[1].contains(r#""decision":"deny""#));
    }
}
