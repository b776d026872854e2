//! Pinned HTTPS transport: one trusted root, retried JSON POSTs, structured
//! errors. Mirrors the shape of `lexe-api/src/rest.rs`'s `RestClient`/
//! `send_with_retries`, with its own retry/stop-code semantics for the
//! gateway's wire protocol.

use std::time::Duration;

use gwcore::{
    error::RequestError,
    proto::{ProxyRequest, ProxyResponse},
};
use serde_json::Value;

use crate::token::TokenCache;

/// Per-attempt timeout.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);
/// Total attempts against a 5xx/connection failure, including the first.
pub const MAX_RETRYABLE_ATTEMPTS: u32 = 3;
/// Initial backoff wait, doubling on each subsequent retryable attempt.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Sends `{method, params}` to `{base_url}/mcp/{target}` over a TLS
/// connection pinned to a single root certificate.
pub struct Transport {
    client: reqwest::Client,
    base_url: String,
    target: String,
    token_cache: std::sync::Arc<TokenCache>,
}

enum Outcome {
    Success(Value),
    WorkerError(String),
    Unauthorized,
    Forbidden,
    OtherClientError(u16),
    Retryable(String),
}

impl Transport {
    /// Build a transport pinned to the single root certificate in
    /// `root_cert_pem`.
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        target: impl Into<String>,
        token_cache: std::sync::Arc<TokenCache>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            target: target.into(),
            token_cache,
        }
    }

    /// Build a [`reqwest::Client`] whose TLS trust store is pinned to
    /// exactly the one root certificate in `root_cert_pem`. Fails loudly
    /// (spec §4.2: missing pinned root is a startup error, not a silent
    /// fallback) unless `allow_system_trust_fallback` is set and the pinned
    /// root can't be loaded.
    pub fn build_pinned_client(
        root_cert_pem: &[u8],
        allow_system_trust_fallback: bool,
    ) -> anyhow::Result<reqwest::Client> {
        let roots = match gwtls::load_pinned_root_store(root_cert_pem) {
            Ok(roots) => roots,
            Err(e) if allow_system_trust_fallback => {
                tracing::warn!(
                    error = %e,
                    "pinned root unavailable, falling back to system trust \
                     because fallback was explicitly enabled"
                );
                return Self::build_system_trust_client();
            }
            Err(e) => {
                anyhow::bail!("failed to load pinned root certificate: {e}")
            }
        };

        let mut tls_config = gwtls::client_config_builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        tls_config.alpn_protocols = gwtls::GW_ALPN_PROTOCOLS.clone();

        let client = reqwest::ClientBuilder::new()
            .use_preconfigured_tls(tls_config)
            .https_only(true)
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(client)
    }

    fn build_system_trust_client() -> anyhow::Result<reqwest::Client> {
        let client = reqwest::ClientBuilder::new()
            .https_only(true)
            .timeout(ATTEMPT_TIMEOUT)
            .build()?;
        Ok(client)
    }

    /// Send one `{method, params}` call, retrying per spec §4.2.
    pub async fn send(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Value, RequestError> {
        let mut retry_count: u32 = 0;
        let mut retried_after_401 = false;
        let mut backoff = gwstd::backoff::iter_with_initial_wait_ms(INITIAL_BACKOFF_MS);

        loop {
            let now = now_unix();
            let token = self.token_cache.get(now).await;

            match self.try_once(method, params.clone(), &token).await {
                Outcome::Success(value) => return Ok(value),
                Outcome::WorkerError(msg) => return Err(RequestError::Worker(msg)),
                Outcome::Forbidden => return Err(RequestError::PolicyDenied),
                Outcome::OtherClientError(status) => {
                    return Err(RequestError::Protocol(format!(
                        "unexpected status {status}"
                    )))
                }
                Outcome::Unauthorized => {
                    if retried_after_401 {
                        return Err(RequestError::Auth(
                            "unauthorized after retry".to_owned(),
                        ));
                    }
                    retried_after_401 = true;
                    self.token_cache.invalidate().await;
                    continue;
                }
                Outcome::Retryable(msg) => {
                    retry_count += 1;
                    if retry_count >= MAX_RETRYABLE_ATTEMPTS {
                        return Err(RequestError::Transport(msg));
                    }
                    let wait = backoff.next().expect("infinite iterator");
                    tokio::time::sleep(wait).await;
                    continue;
                }
            }
        }
    }

    async fn try_once(&self, method: &str, params: Value, token: &str) -> Outcome {
        let url = format!("{}/mcp/{}", self.base_url, self.target);
        let body = ProxyRequest {
            method: method.to_owned(),
            params,
        };

        let response = match self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "transport.request_failed");
                return Outcome::Retryable(e.to_string());
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Outcome::Unauthorized;
        }
        if status == reqwest::StatusCode::FORBIDDEN {
            return Outcome::Forbidden;
        }
        if status.is_server_error() {
            return Outcome::Retryable(format!("server returned {status}"));
        }
        if status.is_client_error() {
            return Outcome::OtherClientError(status.as_u16());
        }

        match response.json::<ProxyResponse>().await {
            Ok(ProxyResponse::Result { result }) => Outcome::Success(result),
            Ok(ProxyResponse::Error { error }) => Outcome::WorkerError(error),
            Err(e) => {
                tracing::warn!(error = %e, "transport.malformed_response");
                Outcome::OtherClientError(status.as_u16())
            }
        }
    }
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
