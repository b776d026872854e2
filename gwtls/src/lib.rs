//! Dependency-minimized rustls presets plus single-root certificate pinning.
//!
//! The gateway never consults system or webpki trust anchors: every TLS
//! handshake (agent -> gateway, and any handshake a worker-facing proxy might
//! do) is pinned against exactly one root certificate supplied out-of-band.
//! See [`load_pinned_root_store`].

use std::sync::{Arc, LazyLock};

/// Allow accessing [`rustls`] via `gwtls::rustls`.
pub use rustls;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
/// Allow accessing [`webpki_roots`] via `gwtls::webpki_roots`.
#[cfg(feature = "webpki-roots")]
pub use webpki_roots;

/// Errors produced while loading a pinned root certificate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read PEM data: {0}")]
    Pem(#[from] std::io::Error),
    #[error("pinned root file contains no certificates")]
    NoCerts,
    #[error("pinned root file contains {0} certificates, expected exactly 1")]
    TooManyCerts(usize),
    #[error("root certificate rejected by webpki: {0}")]
    InvalidCert(#[from] rustls::Error),
}

/// Helper to get a builder for a [`ClientConfig`] with the gateway's presets.
/// NOTE: Remember to set `alpn_protocols` to [`GW_ALPN_PROTOCOLS`] afterwards!
pub fn client_config_builder(
) -> rustls::ConfigBuilder<ClientConfig, rustls::WantsVerifier> {
    // We use the correct provider and TLS versions here
    #[allow(clippy::disallowed_methods)]
    ClientConfig::builder_with_provider(GW_CRYPTO_PROVIDER.clone())
        .with_protocol_versions(GW_TLS_PROTOCOL_VERSIONS)
        .expect("Checked in tests")
}

/// Helper to get a builder for a [`ServerConfig`] with the gateway's presets.
/// NOTE: Remember to set `alpn_protocols` to [`GW_ALPN_PROTOCOLS`] afterwards!
pub fn server_config_builder(
) -> rustls::ConfigBuilder<ServerConfig, rustls::WantsVerifier> {
    // We use the correct provider and TLS versions here
    #[allow(clippy::disallowed_methods)]
    ServerConfig::builder_with_provider(GW_CRYPTO_PROVIDER.clone())
        .with_protocol_versions(GW_TLS_PROTOCOL_VERSIONS)
        .expect("Checked in tests")
}

/// Parse exactly one root certificate out of `pem_bytes` and return a
/// [`RootCertStore`] pinned to it.
///
/// Returns [`Error::NoCerts`] or [`Error::TooManyCerts`] if the file doesn't
/// contain exactly one certificate -- the gateway's trust store is never a
/// bundle, since pinning a single cert is the whole point.
pub fn load_pinned_root_store(
    mut pem_bytes: &[u8],
) -> Result<RootCertStore, Error> {
    let certs = rustls_pemfile::certs(&mut pem_bytes)
        .collect::<Result<Vec<_>, _>>()?;

    match certs.len() {
        0 => return Err(Error::NoCerts),
        1 => (),
        n => return Err(Error::TooManyCerts(n)),
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert)?;
    }
    Ok(roots)
}

/// Gateway TLS protocol version: TLSv1.3 only.
pub static GW_TLS_PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] =
    &[&rustls::version::TLS13];
/// Gateway cipher suite: specifically `TLS13_AES_128_GCM_SHA256`.
static GW_CIPHER_SUITES: &[rustls::SupportedCipherSuite] =
    &[rustls::crypto::ring::cipher_suite::TLS13_AES_128_GCM_SHA256];
/// Gateway key exchange group: X25519.
static GW_KEY_EXCHANGE_GROUPS: &[&dyn rustls::crypto::SupportedKxGroup] =
    &[rustls::crypto::ring::kx_group::X25519];
/// Default value for [`ClientConfig::alpn_protocols`] and
/// [`ServerConfig::alpn_protocols`]: HTTP/1.1 and HTTP/2.
pub static GW_ALPN_PROTOCOLS: LazyLock<Vec<Vec<u8>>> =
    LazyLock::new(|| vec!["h2".into(), "http/1.1".into()]);

/// Our [`rustls::crypto::CryptoProvider`].
/// Use this instead of [`rustls::crypto::ring::default_provider`].
///
/// Unlike a single-issuer CA scheme, a pinned root supplied by an operator may
/// carry an RSA or ECDSA key just as easily as Ed25519, so we keep ring's full
/// default set of signature verification algorithms rather than narrowing it.
/// Pinning comes from the size of the root store (exactly one cert), not from
/// restricting which signature schemes are accepted.
pub static GW_CRYPTO_PROVIDER: LazyLock<Arc<rustls::crypto::CryptoProvider>> =
    LazyLock::new(|| {
        #[allow(clippy::disallowed_methods)] // We customize it here
        let mut provider = rustls::crypto::ring::default_provider();
        GW_CIPHER_SUITES.clone_into(&mut provider.cipher_suites);
        GW_KEY_EXCHANGE_GROUPS.clone_into(&mut provider.kx_groups);
        Arc::new(provider)
    });

/// Mozilla's webpki roots as a lazily-initialized [`rustls::RootCertStore`].
///
/// Only used if a deployment explicitly opts into falling back to public CAs
/// instead of a pinned root; the gateway's default posture never touches
/// this.
///
/// # Example
///
/// ```ignore
/// # use std::time::Duration;
/// # use anyhow::Context;
/// #
/// fn build_reqwest_client() -> anyhow::Result<reqwest::Client> {
///     let tls_config = gwtls::client_config_builder()
///         .with_root_certificates(gwtls::WEBPKI_ROOT_CERTS.clone())
///         .with_no_client_auth();
///
///     let client = reqwest::ClientBuilder::new()
///         .https_only(true)
///         .use_preconfigured_tls(tls_config)
///         .timeout(Duration::from_secs(10))
///         .build()
///         .context("reqwest::ClientBuilder::build failed")?;
///
///     Ok(client)
/// }
/// ```
#[cfg(feature = "webpki-roots")]
pub static WEBPKI_ROOT_CERTS: std::sync::LazyLock<
    std::sync::Arc<rustls::RootCertStore>,
> = LazyLock::new(|| {
    let roots = webpki_roots::TLS_SERVER_ROOTS.to_vec();
    Arc::new(rustls::RootCertStore { roots })
});
