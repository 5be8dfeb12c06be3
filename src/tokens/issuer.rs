//! Access/refresh token issuance and verification.
//!
//! Tokens are compact JWS (`header.claims.signature`, base64url without
//! padding) signed by the current key of the issuer's [`KeySet`]. The header
//! names the signing key so superseded keys keep verifying while published.

use super::claims::Claims;
use super::config::TokenConfig;
use super::ids::{IdGenerator, MonotonicIds};
use super::jwks::{KeyEntry, KeySet};
use super::keys::{self, Algorithm, SigningKey};
use super::Error;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};
use ulid::Ulid;
use url::Url;

/// Path appended to the issuer URL to form the refresh audience.
pub const REAUTHENTICATE_PATH: &str = "/v1/reauthenticate";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

/// Signed access/refresh pair from a single issuance. Both share a `jti`.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_claims: Claims,
    pub refresh_claims: Claims,
}

pub struct Issuer {
    keys: KeySet,
    current: RwLock<Option<KeyEntry>>,
    algorithm: Algorithm,
    audience: Vec<String>,
    issuer: String,
    refresh_audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
    token_overlap: Duration,
    ids: Arc<dyn IdGenerator>,
}

impl std::fmt::Debug for Issuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Issuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("current", &self.current_key_id())
            .field("keys", &self.keys.len())
            .finish_non_exhaustive()
    }
}

impl Issuer {
    /// Issuer with the default monotonic id source. Keys are added separately.
    ///
    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn new(config: &TokenConfig) -> Result<Self, Error> {
        Self::with_ids(config, Arc::new(MonotonicIds::new()))
    }

    /// # Errors
    /// Returns `Error::Config` if the configuration is invalid.
    pub fn with_ids(config: &TokenConfig, ids: Arc<dyn IdGenerator>) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            keys: KeySet::new(),
            current: RwLock::new(None),
            algorithm: Algorithm::EdDSA,
            audience: config.audience.clone(),
            refresh_audience: refresh_audience_for(&config.issuer)?,
            issuer: config.issuer.clone(),
            access_ttl: config.access_ttl,
            refresh_ttl: config.refresh_ttl,
            token_overlap: config.token_overlap,
            ids,
        })
    }

    /// Load every configured key file and register it.
    ///
    /// # Errors
    /// Returns the first load or registration error.
    pub fn load_keys(&self, paths: &BTreeMap<Ulid, PathBuf>) -> Result<(), Error> {
        for (kid, path) in paths {
            let key = keys::load(path)?;
            self.add_key(*kid, key)?;
            info!(%kid, path = %path.display(), "loaded signing key");
        }
        Ok(())
    }

    /// Generate a key under a fresh id and register it. Returns the new id.
    ///
    /// # Errors
    /// Returns an error if no id can be allocated.
    pub fn generate_key(&self) -> Result<(Ulid, Arc<dyn SigningKey>), Error> {
        let kid = self.ids.next_id()?;
        let key = keys::generate();
        self.add_key(kid, Arc::clone(&key))?;
        Ok((kid, key))
    }

    /// Register a key. The key with the greatest id signs new tokens,
    /// regardless of insertion order.
    ///
    /// # Errors
    /// Returns `Error::ZeroKeyId` for the nil id and `Error::DuplicateKeyId`
    /// if `kid` is already registered.
    pub fn add_key(&self, kid: Ulid, key: Arc<dyn SigningKey>) -> Result<(), Error> {
        if kid.is_nil() {
            return Err(Error::ZeroKeyId);
        }
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.keys.add(kid, Arc::clone(&key))?;
        if current.as_ref().map_or(true, |entry| kid > entry.kid) {
            debug!(%kid, "signing key is now current");
            *current = Some(KeyEntry { kid, key });
        }
        Ok(())
    }

    /// Stop publishing a superseded key. Tokens signed by it stop verifying.
    ///
    /// # Errors
    /// Returns `Error::RemoveCurrentKey` if `kid` is the current signing key.
    pub fn remove_key(&self, kid: Ulid) -> Result<bool, Error> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        if current.as_ref().is_some_and(|entry| entry.kid == kid) {
            return Err(Error::RemoveCurrentKey(kid.to_string()));
        }
        let removed = self.keys.remove(kid);
        if removed {
            info!(%kid, "signing key removed");
        }
        Ok(removed)
    }

    #[must_use]
    pub fn current_key_id(&self) -> Option<Ulid> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|entry| entry.kid)
    }

    #[must_use]
    pub fn key_set(&self) -> &KeySet {
        &self.keys
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    #[must_use]
    pub fn refresh_audience(&self) -> &str {
        &self.refresh_audience
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// # Errors
    /// Returns `Error::IdOverflow` if no token id can be allocated.
    pub fn create_access_token(&self, claims: Claims) -> Result<Claims, Error> {
        self.create_access_token_at(claims, Utc::now())
    }

    /// Stamp `claims` as an access token issued at `now`.
    ///
    /// # Errors
    /// Returns `Error::IdOverflow` if no token id can be allocated.
    pub fn create_access_token_at(
        &self,
        mut claims: Claims,
        now: DateTime<Utc>,
    ) -> Result<Claims, Error> {
        let now = now.timestamp();
        claims.jti = self.ids.next_id()?.to_string();
        claims.aud.clone_from(&self.audience);
        claims.iss.clone_from(&self.issuer);
        claims.iat = now;
        claims.nbf = now;
        claims.exp = now + self.access_ttl.num_seconds();
        Ok(claims)
    }

    /// Refresh claims paired with `access`: same `jti` and subject, valid from
    /// `token_overlap` before the access token expires. Identity and
    /// authorization fields are not carried.
    #[must_use]
    pub fn create_refresh_token(&self, access: &Claims) -> Claims {
        let mut aud = access.aud.clone();
        if !aud.iter().any(|a| a == &self.refresh_audience) {
            aud.push(self.refresh_audience.clone());
        }
        Claims {
            sub: access.sub.clone(),
            aud,
            iss: access.iss.clone(),
            jti: access.jti.clone(),
            iat: access.iat,
            nbf: access.exp + self.token_overlap.num_seconds(),
            exp: access.iat + self.refresh_ttl.num_seconds(),
            ..Claims::default()
        }
    }

    /// Sign `claims` with the current key.
    ///
    /// # Errors
    /// Returns `Error::NoSigningKey` if no key has been added.
    pub fn sign(&self, claims: &Claims) -> Result<String, Error> {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(Error::NoSigningKey)?;

        let header = TokenHeader {
            alg: current.key.algorithm().as_str().to_string(),
            typ: "JWT".to_string(),
            kid: Some(current.kid.to_string()),
        };
        let signing_input = format!("{}.{}", b64e_json(&header)?, b64e_json(claims)?);
        let signature = current.key.sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    /// Issue, stamp and sign an access/refresh pair. Nothing is returned
    /// unless both tokens were signed.
    ///
    /// # Errors
    /// Returns the first issuance or signing error.
    pub fn create_tokens(&self, claims: Claims) -> Result<TokenPair, Error> {
        let access_claims = self.create_access_token(claims)?;
        let refresh_claims = self.create_refresh_token(&access_claims);
        let access_token = self.sign(&access_claims)?;
        let refresh_token = self.sign(&refresh_claims)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
            access_claims,
            refresh_claims,
        })
    }

    /// Full validation against the current time.
    ///
    /// # Errors
    /// Returns the verification failure; see [`Issuer::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Claims, Error> {
        self.verify_at(token, Utc::now())
    }

    /// Signature, algorithm, issuer, audience and validity window.
    ///
    /// # Errors
    /// Returns the first failed check.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let claims = self.parse(token)?;
        if claims.iss != self.issuer {
            return Err(Error::InvalidIssuer);
        }
        if !self.audience.iter().any(|aud| claims.has_audience(aud)) {
            return Err(Error::InvalidAudience);
        }
        let now = now.timestamp();
        if claims.nbf > now {
            return Err(Error::NotYetValid);
        }
        if claims.exp <= now {
            return Err(Error::Expired);
        }
        Ok(claims)
    }

    /// [`Issuer::verify`] plus membership of the refresh audience.
    ///
    /// # Errors
    /// Returns `Error::NotRefreshToken` for a valid token lacking the refresh audience.
    pub fn verify_refresh(&self, token: &str) -> Result<Claims, Error> {
        self.verify_refresh_at(token, Utc::now())
    }

    /// # Errors
    /// See [`Issuer::verify_refresh`].
    pub fn verify_refresh_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, Error> {
        let claims = self.verify_at(token, now)?;
        if !claims.has_audience(&self.refresh_audience) {
            return Err(Error::NotRefreshToken);
        }
        Ok(claims)
    }

    /// Check the signature only; temporal and audience claims are not examined.
    ///
    /// # Errors
    /// Returns `Error::UnparseableClaims` when the signature holds but the
    /// payload is not a claims object.
    pub fn parse(&self, token: &str) -> Result<Claims, Error> {
        let (header_b64, claims_b64, sig_b64) = split_token(token)?;
        let key = self.key_for_header(&b64d_json(header_b64)?)?;

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
        key.verify(format!("{header_b64}.{claims_b64}").as_bytes(), &signature)?;

        b64d_json(claims_b64).map_err(|_| Error::UnparseableClaims)
    }

    /// Resolve the verification key named by the token header.
    ///
    /// # Errors
    /// Fails on an algorithm outside the allow-list, a missing or zero key
    /// id, or a key id that is not in the key set.
    pub fn get_key(&self, token: &str) -> Result<Arc<dyn SigningKey>, Error> {
        let (header_b64, _, _) = split_token(token)?;
        self.key_for_header(&b64d_json(header_b64)?)
    }

    fn key_for_header(&self, header: &TokenHeader) -> Result<Arc<dyn SigningKey>, Error> {
        if header.alg != self.algorithm.as_str() {
            return Err(Error::UnexpectedAlgorithm(header.alg.clone()));
        }
        let kid = header
            .kid
            .as_deref()
            .filter(|kid| !kid.is_empty())
            .ok_or(Error::MissingKeyId)?;
        let kid = Ulid::from_string(kid).map_err(|_| Error::UnknownSigningKey)?;
        if kid.is_nil() {
            return Err(Error::ZeroKeyId);
        }
        self.keys.find(kid).ok_or(Error::UnknownSigningKey)
    }
}

/// Decode the claims of a compact token without checking its signature.
///
/// Only for tokens this process has just issued.
///
/// # Errors
/// Returns an error for malformed tokens.
pub fn peek_claims(token: &str) -> Result<Claims, Error> {
    let (_, claims_b64, _) = split_token(token)?;
    b64d_json(claims_b64)
}

fn refresh_audience_for(issuer: &str) -> Result<String, Error> {
    Url::parse(issuer)
        .map_err(|err| Error::Config(format!("issuer {issuer:?} is not a URL: {err}")))?;
    Ok(format!(
        "{}{REAUTHENTICATE_PATH}",
        issuer.trim_end_matches('/')
    ))
}

fn split_token(token: &str) -> Result<(&str, &str, &str), Error> {
    let mut parts = token.split('.');
    let header = parts.next().ok_or(Error::TokenFormat)?;
    let claims = parts.next().ok_or(Error::TokenFormat)?;
    let signature = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() || header.is_empty() || claims.is_empty() || signature.is_empty() {
        return Err(Error::TokenFormat);
    }
    Ok((header, claims, signature))
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::claims::Subject;
    use crate::tokens::ids::tests::SequentialIds;
    use crate::tokens::keys::Ed25519Key;

    const ISSUER: &str = "https://id.example.test";
    const AUDIENCE: &str = "https://app.example.test";

    fn config() -> TokenConfig {
        TokenConfig {
            audience: vec![AUDIENCE.to_string()],
            issuer: ISSUER.to_string(),
            ..TokenConfig::default()
        }
    }

    fn issuer_with_key() -> Result<(Issuer, Ulid), Error> {
        let issuer = Issuer::new(&config())?;
        let kid = Ulid::from_parts(1_700_000_000_000, 1);
        issuer.add_key(kid, Arc::new(Ed25519Key::from_seed(&[9u8; 32])))?;
        Ok((issuer, kid))
    }

    fn user_claims() -> Claims {
        Claims {
            email: Some("alice@example.test".to_string()),
            name: Some("Alice".to_string()),
            permissions: vec!["read:things".to_string()],
            ..Claims::for_subject(Subject::User(Ulid::from_parts(1, 42)))
        }
    }

    fn tamper_header(token: &str, header: &TokenHeader) -> Result<String, Error> {
        let (_, claims, sig) = split_token(token)?;
        Ok(format!("{}.{claims}.{sig}", b64e_json(header)?))
    }

    #[test]
    fn refresh_audience_is_derived_from_issuer() -> Result<(), Error> {
        let issuer = Issuer::new(&TokenConfig {
            issuer: format!("{ISSUER}/"),
            ..config()
        })?;
        assert_eq!(
            issuer.refresh_audience(),
            "https://id.example.test/v1/reauthenticate"
        );
        Ok(())
    }

    #[test]
    fn construction_fails_without_issuer() {
        let result = Issuer::new(&TokenConfig {
            issuer: String::new(),
            ..config()
        });
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn sign_then_verify() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;
        let claims = issuer.create_access_token(user_claims())?;
        let token = issuer.sign(&claims)?;
        let verified = issuer.verify(&token)?;

        assert_eq!(verified, claims);
        assert!(verified.nbf <= verified.iat && verified.iat < verified.exp);
        assert_eq!(verified.exp - verified.iat, 3600);
        assert_eq!(verified.iss, ISSUER);
        assert_eq!(verified.aud, vec![AUDIENCE.to_string()]);
        Ok(())
    }

    #[test]
    fn signing_without_key_fails() -> Result<(), Error> {
        let issuer = Issuer::new(&config())?;
        assert!(matches!(
            issuer.create_tokens(user_claims()),
            Err(Error::NoSigningKey)
        ));
        Ok(())
    }

    #[test]
    fn newest_key_wins_regardless_of_insertion_order() -> Result<(), Error> {
        let issuer = Issuer::new(&config())?;
        let older = Ulid::from_parts(1_000, 1);
        let newer = Ulid::from_parts(2_000, 1);

        issuer.add_key(newer, Arc::new(Ed25519Key::from_seed(&[2u8; 32])))?;
        issuer.add_key(older, Arc::new(Ed25519Key::from_seed(&[1u8; 32])))?;
        assert_eq!(issuer.current_key_id(), Some(newer));

        let token = issuer.sign(&issuer.create_access_token(user_claims())?)?;
        let header: TokenHeader = b64d_json(split_token(&token)?.0)?;
        assert_eq!(header.kid, Some(newer.to_string()));
        assert_eq!(header.alg, "EdDSA");
        Ok(())
    }

    #[test]
    fn superseded_key_verifies_until_removed() -> Result<(), Error> {
        let (issuer, old_kid) = issuer_with_key()?;
        let token = issuer.sign(&issuer.create_access_token(user_claims())?)?;

        let new_kid = Ulid::from_parts(1_800_000_000_000, 1);
        issuer.add_key(new_kid, Arc::new(Ed25519Key::from_seed(&[10u8; 32])))?;
        assert_eq!(issuer.current_key_id(), Some(new_kid));
        issuer.verify(&token)?;

        assert!(issuer.remove_key(old_kid)?);
        assert!(matches!(issuer.verify(&token), Err(Error::UnknownSigningKey)));
        assert_eq!(Error::UnknownSigningKey.to_string(), "unknown signing key");
        Ok(())
    }

    #[test]
    fn current_key_cannot_be_removed() -> Result<(), Error> {
        let (issuer, kid) = issuer_with_key()?;
        assert!(matches!(issuer.remove_key(kid), Err(Error::RemoveCurrentKey(_))));
        assert!(!issuer.remove_key(Ulid::from_parts(5, 5))?);
        Ok(())
    }

    #[test]
    fn zero_key_id_is_rejected() -> Result<(), Error> {
        let issuer = Issuer::new(&config())?;
        assert!(matches!(
            issuer.add_key(Ulid::nil(), keys::generate()),
            Err(Error::ZeroKeyId)
        ));
        Ok(())
    }

    #[test]
    fn refresh_token_window() -> Result<(), Error> {
        let cfg = TokenConfig {
            access_ttl: Duration::seconds(900),
            refresh_ttl: Duration::seconds(86_400),
            token_overlap: Duration::seconds(-120),
            ..config()
        };
        let issuer = Issuer::new(&cfg)?;
        let access = issuer.create_access_token(user_claims())?;
        let refresh = issuer.create_refresh_token(&access);

        assert_eq!(refresh.jti, access.jti);
        assert_eq!(refresh.sub, access.sub);
        assert_eq!(refresh.nbf - access.exp, -120);
        assert_eq!(refresh.nbf - access.iat, 900 - 120);
        assert_eq!(refresh.exp - access.exp, 86_400 - 900);
        assert!(refresh.has_audience(AUDIENCE));
        assert!(refresh.has_audience(issuer.refresh_audience()));
        assert!(refresh.email.is_none());
        assert!(refresh.name.is_none());
        assert!(refresh.permissions.is_empty());
        Ok(())
    }

    #[test]
    fn create_tokens_pairs_by_jti() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;
        let pair = issuer.create_tokens(user_claims())?;

        let access = issuer.verify(&pair.access_token)?;
        assert_eq!(access, pair.access_claims);

        // not yet inside the overlap window
        assert!(matches!(
            issuer.verify_refresh(&pair.refresh_token),
            Err(Error::NotYetValid)
        ));
        let later = Utc::now() + Duration::seconds(3600);
        let refresh = issuer.verify_refresh_at(&pair.refresh_token, later)?;
        assert_eq!(refresh.jti, access.jti);
        assert_eq!(refresh, pair.refresh_claims);
        Ok(())
    }

    #[test]
    fn access_token_is_not_a_refresh_token() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;
        let pair = issuer.create_tokens(user_claims())?;
        assert!(matches!(
            issuer.verify_refresh(&pair.access_token),
            Err(Error::NotRefreshToken)
        ));
        Ok(())
    }

    #[test]
    fn expired_token_still_parses() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;
        let issued = Utc::now() - Duration::seconds(7200);
        let claims = issuer.create_access_token_at(user_claims(), issued)?;
        let token = issuer.sign(&claims)?;

        assert!(matches!(issuer.verify(&token), Err(Error::Expired)));
        assert_eq!(issuer.parse(&token)?, claims);

        assert!(issuer.parse(&format!("{token}garbage")).is_err());
        assert!(issuer.parse(&format!("{token}.more")).is_err());
        Ok(())
    }

    #[test]
    fn verify_rejects_foreign_issuer_and_audience() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;

        let mut claims = issuer.create_access_token(user_claims())?;
        claims.iss = "https://evil.example.test".to_string();
        let token = issuer.sign(&claims)?;
        assert!(matches!(issuer.verify(&token), Err(Error::InvalidIssuer)));

        let mut claims = issuer.create_access_token(user_claims())?;
        claims.aud = vec!["https://elsewhere.example.test".to_string()];
        let token = issuer.sign(&claims)?;
        assert!(matches!(issuer.verify(&token), Err(Error::InvalidAudience)));
        Ok(())
    }

    #[test]
    fn header_checks() -> Result<(), Error> {
        let (issuer, kid) = issuer_with_key()?;
        let token = issuer.sign(&issuer.create_access_token(user_claims())?)?;

        let cases = [
            (
                TokenHeader {
                    alg: "HS256".to_string(),
                    typ: "JWT".to_string(),
                    kid: Some(kid.to_string()),
                },
                "unexpected",
            ),
            (
                TokenHeader {
                    alg: "EdDSA".to_string(),
                    typ: "JWT".to_string(),
                    kid: None,
                },
                "missing",
            ),
            (
                TokenHeader {
                    alg: "EdDSA".to_string(),
                    typ: "JWT".to_string(),
                    kid: Some(Ulid::nil().to_string()),
                },
                "zero",
            ),
            (
                TokenHeader {
                    alg: "EdDSA".to_string(),
                    typ: "JWT".to_string(),
                    kid: Some(Ulid::from_parts(3, 3).to_string()),
                },
                "unknown",
            ),
        ];

        for (header, expected) in cases {
            let forged = tamper_header(&token, &header)?;
            let result = issuer.get_key(&forged);
            let matched = match expected {
                "unexpected" => matches!(result, Err(Error::UnexpectedAlgorithm(_))),
                "missing" => matches!(result, Err(Error::MissingKeyId)),
                "zero" => matches!(result, Err(Error::ZeroKeyId)),
                _ => matches!(result, Err(Error::UnknownSigningKey)),
            };
            assert!(matched, "{expected}");
            assert!(issuer.verify(&forged).is_err());
        }
        Ok(())
    }

    #[test]
    fn signed_non_claims_payload_is_unparseable() -> Result<(), Error> {
        let (issuer, kid) = issuer_with_key()?;
        let key = issuer.get_key(&issuer.sign(&issuer.create_access_token(user_claims())?)?)?;

        let header = b64e_json(&TokenHeader {
            alg: "EdDSA".to_string(),
            typ: "JWT".to_string(),
            kid: Some(kid.to_string()),
        })?;
        let payload = b64e_json(&vec![1, 2, 3])?;
        let input = format!("{header}.{payload}");
        let token = format!(
            "{input}.{}",
            Base64UrlUnpadded::encode_string(&key.sign(input.as_bytes()))
        );
        assert!(matches!(issuer.parse(&token), Err(Error::UnparseableClaims)));
        Ok(())
    }

    #[test]
    fn injected_ids_drive_token_ids() -> Result<(), Error> {
        let issuer = Issuer::with_ids(
            &config(),
            Arc::new(SequentialIds::starting_at(1_700_000_000_000)),
        )?;
        let first = issuer.create_access_token(user_claims())?;
        let second = issuer.create_access_token(user_claims())?;
        assert_eq!(first.jti, Ulid::from_parts(1_700_000_000_000, 1).to_string());
        assert!(second.jti > first.jti);
        Ok(())
    }

    #[test]
    fn peek_reads_unverified_claims() -> Result<(), Error> {
        let (issuer, _) = issuer_with_key()?;
        let pair = issuer.create_tokens(user_claims())?;
        assert_eq!(peek_claims(&pair.access_token)?, pair.access_claims);
        assert!(matches!(peek_claims("a.b"), Err(Error::TokenFormat)));
        Ok(())
    }
}
