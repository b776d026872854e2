//! Command-line entrypoint. Mirrors `node/src/cli.rs`'s `argh`-based style:
//! one top-level struct, `run()` spins up a tokio runtime and blocks on the
//! async `serve` future.

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use argh::FromArgs;
use axum_server::tls_rustls::RustlsConfig;
use gwtokio::{notify_once::NotifyOnce, task::LxTask};
use secrecy::ExposeSecret;

use crate::{
    audit::AuditSink,
    config::GatewayConfig,
    http::{build_router, GatewayState},
    policy::PolicySet,
    supervisor::{Supervisor, SHUTDOWN_GRACE_PERIOD},
    validator::TokenValidator,
};

/// Maximum time to wait for in-flight connections to close once graceful
/// shutdown begins before giving up (spec.md §4.5).
const SERVER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);
gwstd::const_assert!(SHUTDOWN_GRACE_PERIOD.as_secs() < SERVER_SHUTDOWN_TIMEOUT.as_secs());

/// Run the multi-tenant gateway.
#[derive(FromArgs)]
pub struct Args {
    /// address to bind the HTTPS listener to
    #[argh(option, default = "\"0.0.0.0:8443\".parse().unwrap()")]
    pub bind_addr: SocketAddr,

    /// path to the gateway's TLS certificate chain (PEM)
    #[argh(option)]
    pub tls_cert: PathBuf,

    /// path to the gateway's TLS private key (PEM)
    #[argh(option)]
    pub tls_key: PathBuf,

    /// path to the static policy file
    #[argh(option)]
    pub policy_file: PathBuf,

    /// directory holding per-tenant worker data files
    #[argh(option)]
    pub data_dir: PathBuf,

    /// path to the worker executable the supervisor spawns per target
    #[argh(option)]
    pub worker_bin: PathBuf,

    /// path to the append-only audit log
    #[argh(option, default = "PathBuf::from(\"debug.log\")")]
    pub audit_log: PathBuf,

    /// idle-timeout in seconds after which an unused worker slot is closed;
    /// unset means slots live until gateway shutdown (spec default)
    #[argh(option)]
    pub idle_timeout_secs: Option<u64>,

    /// load `JWT_SECRET` (and friends) from a `.env` file before reading
    /// the environment; local development only
    #[argh(switch)]
    pub dotenv: bool,
}

impl Args {
    pub fn run(self) -> anyhow::Result<()> {
        if self.dotenv {
            let _ = dotenvy::dotenv();
        }

        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;
        rt.block_on(self.serve())
    }

    async fn serve(self) -> anyhow::Result<()> {
        let jwt_secret = GatewayConfig::jwt_secret_from_env()?;
        let validator_secret =
            secrecy::SecretString::from(jwt_secret.expose_secret().to_owned());
        let config = GatewayConfig {
            jwt_secret,
            bind_addr: self.bind_addr,
            tls_cert_path: self.tls_cert,
            tls_key_path: self.tls_key,
            policy_path: self.policy_file,
            data_dir: self.data_dir,
            audit_log_path: self.audit_log,
            worker_bin: self.worker_bin,
            idle_timeout: self.idle_timeout_secs.map(Duration::from_secs),
        };

        let policy = PolicySet::load(&config.policy_path)?;
        let audit = AuditSink::open(config.audit_log_path.clone()).await?;
        let validator = TokenValidator::new(validator_secret);
        let supervisor = Supervisor::new(config.worker_bin.clone(), config.data_dir.clone());

        let state = Arc::new(GatewayState {
            validator,
            policy,
            supervisor,
            audit,
        });
        let app = build_router(state.clone());

        let shutdown = NotifyOnce::new();

        if let Some(idle_timeout) = config.idle_timeout {
            let state = state.clone();
            let mut reaper_shutdown = shutdown.clone();
            LxTask::spawn("idle-reaper", async move {
                let mut interval = tokio::time::interval(idle_timeout / 2);
                loop {
                    tokio::select! {
                        _ = interval.tick() => state.supervisor.reap_idle(idle_timeout).await,
                        () = reaper_shutdown.recv() => break,
                    }
                }
            })
            .detach();
        }

        let ctrl_c_shutdown = shutdown.clone();
        LxTask::spawn("shutdown-on-ctrl-c", async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received ctrl-c, starting graceful shutdown");
            }
            ctrl_c_shutdown.send();
        })
        .detach();

        let tls_config =
            RustlsConfig::from_pem_file(&config.tls_cert_path, &config.tls_key_path).await?;
        let handle = axum_server::Handle::new();

        tracing::info!(bind_addr = %config.bind_addr, "gateway listening");
        let server_fut = axum_server::bind_rustls(config.bind_addr, tls_config)
            .handle(handle.clone())
            .serve(app.into_make_service());
        tokio::pin!(server_fut);

        let mut graceful_shutdown_rx = shutdown.clone();
        let graceful_shutdown_fut = async {
            graceful_shutdown_rx.recv().await;
            tracing::info!("shutting down gateway listener");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        };
        tokio::pin!(graceful_shutdown_fut);

        tokio::select! {
            biased;
            () = &mut graceful_shutdown_fut => (),
            result = &mut server_fut => result?,
        }
        match tokio::time::timeout(SERVER_SHUTDOWN_TIMEOUT, server_fut).await {
            Ok(result) => result?,
            Err(_) => tracing::warn!("gateway timed out waiting for connections to close"),
        }

        state.supervisor.shutdown_all().await;
        Ok(())
    }
}
