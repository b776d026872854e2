//! Per-agent bearer token mint/cache.
//!
//! Mirrors `lexe-api/src/auth.rs`'s `EphemeralBearerAuthenticator`: a single
//! cached token behind a `tokio::sync::Mutex`, refreshed proactively once
//! it's within the refresh margin of expiry rather than waiting for it to
//! actually lapse.

use std::sync::Arc;

use gwcore::token::{self, Claims, DEFAULT_LIFETIME_SECS, DEFAULT_REFRESH_MARGIN_SECS};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    claims: Claims,
}

/// Mints and caches bearer tokens for a single, fixed tenant.
///
/// Not `Clone` -- share via `Arc<TokenCache>` if multiple tasks need the
/// same agent's token. Safe for concurrent callers: `get()` takes the lock
/// for the duration of a possible re-mint, so concurrent callers either
/// observe the existing valid token or block briefly while one of them
/// mints a new one.
pub struct TokenCache {
    tenant: String,
    secret: SecretString,
    lifetime_secs: i64,
    refresh_margin_secs: i64,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(tenant: impl Into<String>, secret: SecretString) -> Arc<Self> {
        Self::with_lifetime(
            tenant,
            secret,
            DEFAULT_LIFETIME_SECS,
            DEFAULT_REFRESH_MARGIN_SECS,
        )
    }

    pub fn with_lifetime(
        tenant: impl Into<String>,
        secret: SecretString,
        lifetime_secs: i64,
        refresh_margin_secs: i64,
    ) -> Arc<Self> {
        Arc::new(Self {
            tenant: tenant.into(),
            secret,
            lifetime_secs,
            refresh_margin_secs,
            cached: Mutex::new(None),
        })
    }

    /// Mint a brand new token bound to `now` (seconds since epoch), bypassing
    /// the cache. Callers normally want [`TokenCache::get`] instead.
    pub fn mint(&self, now: i64) -> (String, Claims) {
        let claims = Claims::new(self.tenant.clone(), now, self.lifetime_secs);
        let raw = token::encode(self.secret.expose_secret().as_bytes(), &claims);
        tracing::debug!(tenant = %self.tenant, exp = claims.exp, "token.created");
        (raw, claims)
    }

    /// Return a token valid for at least the refresh margin, minting a
    /// fresh one if the cache is empty or within the margin of expiry.
    pub async fn get(&self, now: i64) -> String {
        let mut guard = self.cached.lock().await;

        let needs_refresh = match &*guard {
            Some(cached) => token_needs_refresh(now, cached.claims.exp, self.refresh_margin_secs),
            None => true,
        };

        if needs_refresh {
            if guard.is_some() {
                tracing::debug!(tenant = %self.tenant, "token.refresh_needed");
            }
            let (raw, claims) = self.mint(now);
            *guard = Some(CachedToken { token: raw, claims });
        }

        guard.as_ref().expect("just populated above").token.clone()
    }

    /// Drop the cached token so the next [`TokenCache::get`] re-mints.
    /// Called after the transport observes an auth failure.
    pub async fn invalidate(&self) {
        let mut guard = self.cached.lock().await;
        *guard = None;
    }
}

fn token_needs_refresh(now: i64, expires_at: i64, refresh_margin_secs: i64) -> bool {
    now + refresh_margin_secs >= expires_at
}
