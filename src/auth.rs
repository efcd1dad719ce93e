//! Credential issuing and verification.
//!
//! Two token kinds share one signing key and are told apart by audience:
//! player credentials (subject = user id) returned at registration, and
//! short-lived photo tokens (subject = blob reference) embedded in photo
//! URLs. Audience checking keeps a photo token from ever authenticating a
//! request.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Audience claim for player credentials.
const PLAYER_AUDIENCE: &str = "player";
/// Audience claim for photo access tokens.
const PHOTO_AUDIENCE: &str = "photo";

/// Failures raised while minting or checking tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token is missing, expired, tampered with or aimed at the wrong
    /// audience.
    #[error("invalid credential")]
    InvalidCredential {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    /// The token verified but its subject is not the expected shape.
    #[error("credential subject is not a user id")]
    InvalidSubject {
        #[source]
        source: uuid::Error,
    },
    /// Signing failed. Key material problem, not a caller error.
    #[error("failed to sign credential")]
    Signing {
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    aud: String,
    exp: i64,
}

/// Mints and verifies the HS256 tokens the backend hands out.
#[derive(Clone)]
pub struct IdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    credential_ttl: Duration,
    photo_ttl: Duration,
}

impl IdentityProvider {
    /// Build a provider from the signing secret and the two token lifetimes.
    pub fn new(secret: &str, credential_ttl: Duration, photo_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            credential_ttl,
            photo_ttl,
        }
    }

    fn sign(&self, sub: String, aud: &str, ttl: Duration) -> Result<String, AuthError> {
        let claims = Claims {
            sub,
            aud: aud.to_string(),
            exp: (OffsetDateTime::now_utc() + ttl).unix_timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|source| AuthError::Signing { source })
    }

    fn verify(&self, token: &str, aud: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[aud]);
        validation.set_required_spec_claims(&["exp", "aud"]);
        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|source| AuthError::InvalidCredential { source })
    }

    /// Mint the bearer credential returned to a freshly registered player.
    pub fn issue_credential(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.sign(user_id.to_string(), PLAYER_AUDIENCE, self.credential_ttl)
    }

    /// Resolve a bearer credential to the user id it was issued for.
    pub fn authenticate(&self, token: &str) -> Result<Uuid, AuthError> {
        let claims = self.verify(token, PLAYER_AUDIENCE)?;
        claims
            .sub
            .parse()
            .map_err(|source| AuthError::InvalidSubject { source })
    }

    /// Mint a short-lived token granting read access to one photo reference.
    pub fn issue_photo_token(&self, reference: &str) -> Result<String, AuthError> {
        self.sign(reference.to_string(), PHOTO_AUDIENCE, self.photo_ttl)
    }

    /// Resolve a photo token to the blob reference it grants access to.
    pub fn verify_photo_token(&self, token: &str) -> Result<String, AuthError> {
        Ok(self.verify(token, PHOTO_AUDIENCE)?.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> IdentityProvider {
        IdentityProvider::new("test-secret", Duration::hours(1), Duration::hours(1))
    }

    #[test]
    fn credential_round_trip() {
        let identity = provider();
        let user_id = Uuid::new_v4();
        let token = identity.issue_credential(user_id).unwrap();
        assert_eq!(identity.authenticate(&token).unwrap(), user_id);
    }

    #[test]
    fn photo_token_round_trip() {
        let identity = provider();
        let token = identity.issue_photo_token("abc123.jpeg").unwrap();
        assert_eq!(identity.verify_photo_token(&token).unwrap(), "abc123.jpeg");
    }

    #[test]
    fn photo_token_does_not_authenticate() {
        let identity = provider();
        let user_id = Uuid::new_v4();
        let token = identity.issue_photo_token(&user_id.to_string()).unwrap();
        assert!(matches!(
            identity.authenticate(&token),
            Err(AuthError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn expired_credential_is_rejected() {
        // Past the default decoding leeway.
        let identity =
            IdentityProvider::new("test-secret", Duration::minutes(-5), Duration::hours(1));
        let token = identity.issue_credential(Uuid::new_v4()).unwrap();
        assert!(matches!(
            identity.authenticate(&token),
            Err(AuthError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let identity = provider();
        let other = IdentityProvider::new("other-secret", Duration::hours(1), Duration::hours(1));
        let token = other.issue_credential(Uuid::new_v4()).unwrap();
        assert!(identity.authenticate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(provider().authenticate("not-a-token").is_err());
    }
}
