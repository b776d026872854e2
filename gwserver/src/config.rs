//! Environment-driven gateway configuration, loaded once at startup. A
//! missing secret, unreadable policy file, or missing TLS material is a
//! `ConfigError` and is fatal -- never surfaced at request time.

use std::{path::PathBuf, time::Duration};

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),
    #[error("{0} is set but empty")]
    EmptyVar(&'static str),
}

pub struct GatewayConfig {
    pub jwt_secret: SecretString,
    pub bind_addr: std::net::SocketAddr,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub policy_path: PathBuf,
    pub data_dir: PathBuf,
    pub audit_log_path: PathBuf,
    pub worker_bin: PathBuf,
    /// `None` means slots live until gateway shutdown -- spec.md §9's
    /// default; only set via explicit CLI opt-in.
    pub idle_timeout: Option<Duration>,
}

impl GatewayConfig {
    pub fn jwt_secret_from_env() -> Result<SecretString, ConfigError> {
        let value =
            std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?;
        if value.is_empty() {
            return Err(ConfigError::EmptyVar("JWT_SECRET"));
        }
        Ok(SecretString::from(value))
    }
}
