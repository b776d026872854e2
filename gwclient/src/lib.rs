//! The tenant agent side of the gateway: mint/cache a bearer token, then
//! send it over a TLS connection pinned to a single root certificate.

pub mod config;
pub mod token;
pub mod transport;

pub use config::{AgentConfig, ConfigError};
pub use token::TokenCache;
pub use transport::Transport;
