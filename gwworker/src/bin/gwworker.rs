//! Entrypoint for a single tenant target's worker process. Spawned by
//! `gwserver`'s supervisor with `DB_PATH` set to this target's data file
//! (spec.md §6); reads one JSON request per stdin line, writes one JSON
//! response per stdout line, in order.

use std::path::PathBuf;

use argh::FromArgs;
use gwcore::proto::WorkerRequest;
use gwworker::{protocol, store::Store};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Backend worker for one tenant target.
#[derive(FromArgs)]
struct Args {
    /// path to this worker's data file. Defaults to `DB_PATH` from the
    /// environment, which is how the supervisor launches it; the flag
    /// exists mainly for running a worker by hand during development.
    #[argh(option)]
    db_path: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    gwlogger::init();
    let args: Args = argh::from_env();
    let db_path = match args.db_path {
        Some(path) => path,
        None => PathBuf::from(
            std::env::var("DB_PATH")
                .map_err(|_| anyhow::anyhow!("DB_PATH is not set"))?,
        ),
    };

    let mut store = Store::load(db_path)?;

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let request: WorkerRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                // Our only caller is the gateway, and it always writes
                // well-formed requests; seeing one that doesn't parse means
                // something upstream is badly wrong. Exiting (rather than
                // skipping the line) is the honest response -- the
                // supervisor already treats a worker that disappears
                // mid-request as a `ProtocolError` and respawns on the
                // next call (spec.md §4.5, §7).
                tracing::error!(error = %e, line, "gwworker.malformed_request");
                break;
            }
        };

        let response = protocol::dispatch(&mut store, request);
        let mut out_line =
            serde_json::to_vec(&response).expect("WorkerResponse serialization is infallible");
        out_line.push(b'\n');
        stdout.write_all(&out_line).await?;
        stdout.flush().await?;
    }

    Ok(())
}
