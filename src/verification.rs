//! Out-of-band verification tokens (email verification, password reset).
//!
//! A signed token is `base64url(payload).base64url(HMAC-SHA256(payload))`
//! keyed with a process secret. Signature validity is independent of any
//! stored record, so callers must also check the record they persisted.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use ulid::Ulid;
use utoipa::ToSchema;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("verification secret must not be empty")]
    EmptySecret,
    #[error("verification token is not two dot-separated segments")]
    TokenFormat,
    #[error("verification token segment is not valid base64url")]
    Base64,
    #[error("verification token payload is not valid json: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("verification token expired")]
    Expired,
    #[error("could not initialise HMAC")]
    Hmac,
}

/// The action a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Purpose {
    VerifyEmail,
    ResetPassword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub purpose: Purpose,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub expiration: DateTime<Utc>,
}

impl VerificationToken {
    /// The payload carries whole seconds, so `expiration` is truncated here.
    #[must_use]
    pub fn new(resource_id: Ulid, purpose: Purpose, expiration: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new(),
            resource_id,
            purpose,
            expiration: expiration.trunc_subsecs(0),
        }
    }

    /// Token for `resource_id` expiring `ttl` from now.
    #[must_use]
    pub fn expiring_in(resource_id: Ulid, purpose: Purpose, ttl: Duration) -> Self {
        Self::new(resource_id, purpose, Utc::now() + ttl)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

/// Signs and checks verification tokens with the process secret.
pub struct TokenSigner {
    secret: SecretString,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner").finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// # Errors
    /// Returns `Error::EmptySecret` for an empty secret.
    pub fn new(secret: SecretString) -> Result<Self, Error> {
        if secret.expose_secret().is_empty() {
            return Err(Error::EmptySecret);
        }
        Ok(Self { secret })
    }

    fn mac(&self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::Hmac)?;
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Returns the token alongside its signed string form.
    ///
    /// # Errors
    /// Returns an error if the payload cannot be serialized.
    pub fn sign(&self, token: VerificationToken) -> Result<(VerificationToken, String), Error> {
        let payload = Base64UrlUnpadded::encode_string(&serde_json::to_vec(&token)?);
        let signature = Base64UrlUnpadded::encode_string(&self.mac(payload.as_bytes())?);
        Ok((token, format!("{payload}.{signature}")))
    }

    /// # Errors
    /// See [`TokenSigner::verify_at`].
    pub fn verify(&self, candidate: &str) -> Result<(bool, VerificationToken), Error> {
        self.verify_at(candidate, Utc::now())
    }

    /// Check a signed token.
    ///
    /// Returns `secure == false` when the signature does not match; the decoded
    /// token is returned for audit logging only and must not be trusted.
    ///
    /// # Errors
    /// Returns an error for malformed tokens and `Error::Expired` for an
    /// authentic token past its expiration.
    pub fn verify_at(
        &self,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<(bool, VerificationToken), Error> {
        let (payload, signature) = candidate.split_once('.').ok_or(Error::TokenFormat)?;
        if payload.is_empty() || signature.contains('.') {
            return Err(Error::TokenFormat);
        }
        let provided = Base64UrlUnpadded::decode_vec(signature).map_err(|_| Error::Base64)?;
        let token: VerificationToken = serde_json::from_slice(
            &Base64UrlUnpadded::decode_vec(payload).map_err(|_| Error::Base64)?,
        )?;

        let expected = self.mac(payload.as_bytes())?;
        if !bool::from(provided.ct_eq(&expected)) {
            return Ok((false, token));
        }
        if token.is_expired_at(now) {
            return Err(Error::Expired);
        }
        Ok((true, token))
    }
}
