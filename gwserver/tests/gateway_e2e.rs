//! End-to-end tests: a real HTTPS listener (rustls over a loopback TCP
//! socket), a real child-process worker, and `gwclient`'s pinned transport
//! on the other end. Exercises the happy path, cross-tenant denial, and a
//! worker crashing mid-request followed by a respawn on the next call,
//! against the actual wire protocol rather than an in-process
//! `tower::ServiceExt::oneshot` call (see `src/http.rs`'s unit tests for
//! those, which cover the router in isolation).

use std::{
    net::SocketAddr,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
    sync::Arc,
};

use axum_server::tls_rustls::RustlsConfig;
use gwclient::{TokenCache, Transport};
use gwcore::error::RequestError;
use gwserver::{
    audit::AuditSink,
    http::{build_router, GatewayState},
    policy::PolicySet,
    supervisor::Supervisor,
    validator::TokenValidator,
};
use secrecy::SecretString;

const SECRET: &str = "integration-test-secret";

fn fixture(name: &str) -> PathBuf {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn self_signed_cert() -> (rcgen::Certificate, rcgen::KeyPair) {
    let key_pair = rcgen::KeyPair::generate().unwrap();
    let mut params = rcgen::CertificateParams::new(vec!["localhost".to_owned()]).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key_pair).unwrap();
    (cert, key_pair)
}

/// Spin up a real gateway listening on an OS-assigned loopback port, using
/// `worker_bin` as the child process every target routes to. Returns the
/// bound address, the server task (dropping it stops the listener), and a
/// `reqwest::Client` pinned to the listener's self-signed cert.
async fn spawn_gateway(
    policy_text: &str,
    worker_bin: PathBuf,
) -> (SocketAddr, tokio::task::JoinHandle<()>, reqwest::Client) {
    let policy = PolicySet::parse(policy_text).unwrap();
    let data_dir = tempfile::tempdir().unwrap().into_path();
    let audit_path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let state = Arc::new(GatewayState {
        validator: TokenValidator::new(SecretString::from(SECRET.to_owned())),
        policy,
        supervisor: Supervisor::new(worker_bin, data_dir),
        audit: AuditSink::open(audit_path.to_path_buf()).await.unwrap(),
    });
    let app = build_router(state);

    let (cert, key_pair) = self_signed_cert();
    let tls_config = RustlsConfig::from_pem(
        cert.pem().into_bytes(),
        key_pair.serialize_pem().into_bytes(),
    )
    .await
    .unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    let server = tokio::spawn(async move {
        axum_server::from_tcp_rustls(listener, tls_config)
            .serve(app.into_make_service())
            .await
            .unwrap();
    });

    let root_store = gwtls::load_pinned_root_store(cert.pem().as_bytes()).unwrap();
    let mut client_tls_config = gwtls::client_config_builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    client_tls_config.alpn_protocols = gwtls::GW_ALPN_PROTOCOLS.clone();
    let client = reqwest::ClientBuilder::new()
        .use_preconfigured_tls(client_tls_config)
        .https_only(true)
        .build()
        .unwrap();

    (addr, server, client)
}

fn transport(
    client: reqwest::Client,
    addr: SocketAddr,
    tenant: &str,
    target: &str,
) -> Transport {
    let token_cache = TokenCache::new(tenant, SecretString::from(SECRET.to_owned()));
    Transport::new(
        client,
        format!("https://localhost:{}", addr.port()),
        target,
        token_cache,
    )
}

#[tokio::test]
async fn happy_path_insert_succeeds() {
    let (addr, _server, client) =
        spawn_gateway("p, tenant_a, backend_a, access\n", fixture("fake_worker.sh")).await;
    let transport = transport(client, addr, "tenant_a", "a");

    let result = transport
        .send("insert", serde_json::json!({"name": "x", "value": "1"}))
        .await
        .unwrap();
    assert_eq!(result["status"], "inserted");
    assert_eq!(result["id"], 1);
}

#[tokio::test]
async fn cross_tenant_call_is_denied() {
    let (addr, _server, client) =
        spawn_gateway("p, tenant_a, backend_a, access\n", fixture("fake_worker.sh")).await;
    // tenant_a is only permitted to reach backend_a; target "b" should deny.
    let transport = transport(client, addr, "tenant_a", "b");

    let err = transport
        .send("select", serde_json::json!({}))
        .await
        .unwrap_err();
    assert_eq!(err, RequestError::PolicyDenied);
}

#[tokio::test]
async fn worker_crash_causes_one_failure_then_respawn_succeeds() {
    let (addr, _server, client) = spawn_gateway(
        "p, tenant_a, backend_a, access\n",
        fixture("crash_once_worker.sh"),
    )
    .await;
    let transport = transport(client, addr, "tenant_a", "a");

    let first = transport
        .send("insert", serde_json::json!({"name": "x", "value": "1"}))
        .await
        .unwrap();
    assert_eq!(first["status"], "inserted");

    // The fixture worker exits after its one reply; the next write to its
    // stdin observes a closed pipe and the request fails.
    let second = transport
        .send("insert", serde_json::json!({"name": "y", "value": "2"}))
        .await;
    assert!(second.is_err());

    // The supervisor respawns a fresh worker on the next request, which
    // succeeds exactly like the first.
    let third = transport
        .send("insert", serde_json::json!({"name": "z", "value": "3"}))
        .await
        .unwrap();
    assert_eq!(third["status"], "inserted");
}
