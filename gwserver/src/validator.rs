//! Thin wrapper turning `gwcore::token::verify`'s error kinds into the
//! `RequestError::Auth` the HTTP layer returns as a 401.

use gwcore::{
    error::RequestError,
    token::{self, Claims},
};
use secrecy::{ExposeSecret, SecretString};

pub struct TokenValidator {
    secret: SecretString,
}

impl TokenValidator {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Validate a raw `Authorization: Bearer <token>` value and extract its
    /// [`Claims`]. spec.md §4.3: bad signature, malformed, expired, and
    /// not-yet-valid all collapse to the same `AuthError` -- callers should
    /// not be able to distinguish auth failures from each other.
    pub fn validate(&self, raw_token: &str, now: i64) -> Result<Claims, RequestError> {
        token::verify(self.secret.expose_secret().as_bytes(), raw_token, now)
            .map_err(|e| RequestError::Auth(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use gwcore::token::Claims;

    use super::*;

    #[test]
    fn validates_well_formed_token() {
        let validator = TokenValidator::new(SecretString::from("secret".to_owned()));
        let claims = Claims::new("tenant_a", 1_000, 300);
        let raw = token::encode(b"secret", &claims);
        let validated = validator.validate(&raw, 1_001).unwrap();
        assert_eq!(validated.tenant, "tenant_a");
    }

    #[test]
    fn rejects_expired_token() {
        let validator = TokenValidator::new(SecretString::from("secret".to_owned()));
        let claims = Claims::new("tenant_a", 1_000, 300);
        let raw = token::encode(b"secret", &claims);
        let err = validator.validate(&raw, claims.exp).unwrap_err();
        assert!(matches!(err, RequestError::Auth(_)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let validator = TokenValidator::new(SecretString::from("secret".to_owned()));
        let claims = Claims::new("tenant_a", 1_000, 300);
        let raw = token::encode(b"other-secret", &claims);
        let err = validator.validate(&raw, 1_001).unwrap_err();
        assert!(matches!(err, RequestError::Auth(_)));
    }
}
