//! The three-segment `header.payload.mac` bearer token: minted by an agent,
//! verified by the gateway. See the module-level docs on [`encode`] and
//! [`verify`] for the exact wire shape.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ring::hmac;
use serde::{Deserialize, Serialize};

/// Default token lifetime: 5 minutes.
pub const DEFAULT_LIFETIME_SECS: i64 = 5 * 60;
/// Default refresh margin: 1 minute before expiry.
pub const DEFAULT_REFRESH_MARGIN_SECS: i64 = 60;
/// Maximum allowed clock drift when checking `iat`/`exp`.
pub const CLOCK_TOLERANCE_SECS: i64 = 30;

/// The literal token header. Only `HS256` is supported; there is no
/// algorithm negotiation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header<'a> {
    alg: &'a str,
}

const HEADER_ALG: Header<'static> = Header { alg: "HS256" };

/// The verified payload of a token: a tenant identifier plus its validity
/// window. Produced by [`verify`], consumed by the policy enforcer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub tenant: String,
    /// Seconds since the Unix epoch.
    pub iat: i64,
    /// Seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn new(tenant: impl Into<String>, iat: i64, lifetime_secs: i64) -> Self {
        Self {
            tenant: tenant.into(),
            iat,
            exp: iat + lifetime_secs,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not three dot-separated segments")]
    Malformed,
    #[error("token segment is not valid base64")]
    Base64,
    #[error("token payload is not valid JSON")]
    Json,
    #[error("MAC verification failed")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not yet valid")]
    NotYetValid,
    #[error("tenant claim is absent or empty")]
    EmptyTenant,
}

/// Sign `claims` with `secret` and return the three-segment token string.
pub fn encode(secret: &[u8], claims: &Claims) -> String {
    let header_b64 = b64_json(&HEADER_ALG);
    let payload_b64 = b64_json(claims);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    let tag = hmac::sign(&key, signing_input.as_bytes());
    let mac_b64 = URL_SAFE_NO_PAD.encode(tag.as_ref());

    format!("{signing_input}.{mac_b64}")
}

/// Verify `raw` against `secret` at time `now` (seconds since epoch) and
/// return the extracted [`Claims`] on success.
///
/// Rejects the token if `now >= exp`, if `now < iat - tolerance`, or if the
/// tenant claim is absent/empty. Does not inspect the header beyond
/// confirming it decodes -- there's only one supported algorithm, so there's
/// nothing to negotiate.
pub fn verify(secret: &[u8], raw: &str, now: i64) -> Result<Claims, TokenError> {
    let mut parts = raw.split('.');
    let header_b64 = parts.next().ok_or(TokenError::Malformed)?;
    let payload_b64 = parts.next().ok_or(TokenError::Malformed)?;
    let mac_b64 = parts.next().ok_or(TokenError::Malformed)?;
    if parts.next().is_some() {
        return Err(TokenError::Malformed);
    }

    // Header is currently unused beyond validating it's well-formed JSON;
    // `alg` is always HS256.
    let _header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| TokenError::Base64)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let mac = URL_SAFE_NO_PAD
        .decode(mac_b64)
        .map_err(|_| TokenError::Base64)?;

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
    hmac::verify(&key, signing_input.as_bytes(), &mac)
        .map_err(|_| TokenError::BadSignature)?;

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| TokenError::Base64)?;
    let claims: Claims =
        serde_json::from_slice(&payload_bytes).map_err(|_| TokenError::Json)?;

    if claims.tenant.is_empty() {
        return Err(TokenError::EmptyTenant);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    if now < claims.iat - CLOCK_TOLERANCE_SECS {
        return Err(TokenError::NotYetValid);
    }

    Ok(claims)
}

fn b64_json<T: Serialize>(value: &T) -> String {
    let bytes = serde_json::to_vec(value).expect("Serialize impl is infallible");
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn round_trips() {
        let claims = Claims::new("tenant_a", 1_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let verified = verify(SECRET, &token, 1_001).unwrap();
        assert_eq!(claims, verified);
    }

    #[test]
    fn rejects_bad_signature() {
        let claims = Claims::new("tenant_a", 1_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let err = verify(b"wrong-secret", &token, 1_001).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn rejects_tampered_payload() {
        let claims = Claims::new("tenant_a", 1_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let mut segments: Vec<&str> = token.split('.').collect();
        let tampered_claims = Claims::new("admin", 1_000, DEFAULT_LIFETIME_SECS);
        let tampered_payload = super::b64_json(&tampered_claims);
        segments[1] = &tampered_payload;
        let tampered = segments.join(".");
        let err = verify(SECRET, &tampered, 1_001).unwrap_err();
        assert_eq!(err, TokenError::BadSignature);
    }

    #[test]
    fn rejects_expired() {
        let claims = Claims::new("tenant_a", 1_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let err = verify(SECRET, &token, claims.exp).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn rejects_not_yet_valid() {
        let claims = Claims::new("tenant_a", 10_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let too_early = claims.iat - CLOCK_TOLERANCE_SECS - 1;
        let err = verify(SECRET, &token, too_early).unwrap_err();
        assert_eq!(err, TokenError::NotYetValid);
    }

    #[test]
    fn tolerates_small_clock_skew() {
        let claims = Claims::new("tenant_a", 10_000, DEFAULT_LIFETIME_SECS);
        let token = encode(SECRET, &claims);
        let slightly_early = claims.iat - CLOCK_TOLERANCE_SECS;
        assert!(verify(SECRET, &token, slightly_early).is_ok());
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(
            verify(SECRET, "not-a-token", 0).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            verify(SECRET, "a.b", 0).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(
            verify(SECRET, "a.b.c.d", 0).unwrap_err(),
            TokenError::Malformed
        );
    }

    proptest! {
        // Every minted token is accepted strictly within [iat, exp) and
        // rejected outside it.
        #[test]
        fn prop_validity_window(
            iat in 0i64..1_000_000_000,
            lifetime in 1i64..100_000,
            tenant in "[a-z][a-z0-9_]{0,16}",
        ) {
            let claims = Claims::new(tenant, iat, lifetime);
            let token = encode(SECRET, &claims);

            prop_assert!(verify(SECRET, &token, claims.exp - 1).is_ok());
            prop_assert_eq!(
                verify(SECRET, &token, claims.exp).unwrap_err(),
                TokenError::Expired
            );
        }
    }
}
