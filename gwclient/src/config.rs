//! Environment-driven agent configuration. `JWT_SECRET` and `PROXY_URL` are
//! the agent's required environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} is set but empty")]
    Empty(&'static str),
}

/// Agent-side configuration, loaded once at startup. A missing or empty
/// `JWT_SECRET` is fatal: startup fails loudly rather than running
/// unauthenticated.
pub struct AgentConfig {
    pub tenant: String,
    pub target: String,
    pub proxy_url: String,
    pub jwt_secret: SecretString,
    /// Path to the single pinned root certificate (PEM).
    pub ca_path: PathBuf,
    /// Explicit opt-in to fall back to system trust if `ca_path` is
    /// missing. Defaults to `false` -- spec.md §4.2: "the default is
    /// strict".
    pub allow_system_trust_fallback: bool,
}

impl AgentConfig {
    /// Load from the process environment. `tenant` and `target` are
    /// supplied by the caller (typically CLI args), since they identify
    /// *this* agent instance rather than being process-wide secrets.
    pub fn from_env(
        tenant: impl Into<String>,
        target: impl Into<String>,
        ca_path: PathBuf,
        allow_system_trust_fallback: bool,
    ) -> Result<Self, ConfigError> {
        let jwt_secret = required_secret("JWT_SECRET")?;
        let proxy_url = required_var("PROXY_URL")?;

        Ok(Self {
            tenant: tenant.into(),
            target: target.into(),
            proxy_url,
            jwt_secret,
            ca_path,
            allow_system_trust_fallback,
        })
    }
}

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(name).map_err(|_| ConfigError::Missing(name))?;
    if value.is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(value)
}

fn required_secret(name: &'static str) -> Result<SecretString, ConfigError> {
    required_var(name).map(SecretString::from)
}
