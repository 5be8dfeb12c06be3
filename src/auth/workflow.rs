//! Login, API-key authentication, reauthentication and the out-of-band
//! verification flows.
//!
//! Every flow either returns a complete token pair with its cookies or an
//! error; cookies are only built once issuance has succeeded. Outcomes that
//! would reveal whether an identity exists all surface as
//! [`AuthError::Failed`] (or a silent success for verification requests)
//! after a randomized delay.

use super::delay::FailureDelay;
use super::error::AuthError;
use super::store::{CredentialStore, TokenSender, VerificationMessage, VerificationRecord};
use super::utils::{normalize_email, valid_client_id, valid_email};
use crate::cookies::CookieManager;
use crate::passwd;
use crate::tokens::{Claims, Issuer, Subject, TokenPair};
use crate::verification::{self, Purpose, TokenSigner, VerificationToken};
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

const DEFAULT_VERIFICATION_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Derived key verified for unknown identities so both paths cost the same.
const DUMMY_DERIVED_KEY: &str = "$argon2id$v=19$m=65536,t=1,p=2$c2FsdHNhbHRzYWx0c2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[derive(Clone, Copy, Debug)]
pub struct WorkflowConfig {
    verification_ttl: Duration,
    resend_cooldown: Duration,
    failure_delay: FailureDelay,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            verification_ttl: Duration::seconds(DEFAULT_VERIFICATION_TTL_SECONDS),
            resend_cooldown: Duration::seconds(DEFAULT_RESEND_COOLDOWN_SECONDS),
            failure_delay: FailureDelay::default(),
        }
    }

    #[must_use]
    pub fn with_verification_ttl_seconds(mut self, seconds: i64) -> Self {
        self.verification_ttl = Duration::seconds(seconds);
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.resend_cooldown = Duration::seconds(seconds);
        self
    }

    #[must_use]
    pub fn with_failure_delay(mut self, failure_delay: FailureDelay) -> Self {
        self.failure_delay = failure_delay;
        self
    }

    #[must_use]
    pub fn verification_ttl(&self) -> Duration {
        self.verification_ttl
    }

    #[must_use]
    pub fn resend_cooldown(&self) -> Duration {
        self.resend_cooldown
    }
}

/// A freshly issued token pair and the `Set-Cookie` headers binding it.
#[derive(Debug)]
pub struct Authenticated {
    pub tokens: TokenPair,
    pub cookies: HeaderMap,
}

pub struct AuthWorkflow {
    issuer: Arc<Issuer>,
    cookies: CookieManager,
    store: Arc<dyn CredentialStore>,
    signer: TokenSigner,
    sender: Arc<dyn TokenSender>,
    config: WorkflowConfig,
}

impl std::fmt::Debug for AuthWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthWorkflow")
            .field("issuer", &self.issuer)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthWorkflow {
    #[must_use]
    pub fn new(
        issuer: Arc<Issuer>,
        cookies: CookieManager,
        store: Arc<dyn CredentialStore>,
        signer: TokenSigner,
        sender: Arc<dyn TokenSender>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            issuer,
            cookies,
            store,
            signer,
            sender,
            config,
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }

    /// Email and password login.
    ///
    /// # Errors
    /// `AuthError::InvalidInput` for malformed input, `AuthError::Failed` for
    /// unknown, unverified or wrong-password identities.
    #[instrument(skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> Result<Authenticated, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email"));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("missing password"));
        }

        let Some(user) = self.store.user_by_email(&email).await? else {
            // same cost as a real check
            let _ = passwd::verify(DUMMY_DERIVED_KEY, password);
            return Err(self.deny("unknown identity").await);
        };

        match passwd::verify(&user.password, password) {
            Ok(true) => {}
            Ok(false) => return Err(self.deny("wrong password").await),
            Err(err) => {
                error!(user_id = %user.id, "stored derived key is unusable: {err}");
                return Err(self.deny("unusable derived key").await);
            }
        }
        if !user.verified {
            return Err(self.deny("identity not verified").await);
        }

        if let Err(err) = self.store.update_last_login(user.id, Utc::now()).await {
            warn!(user_id = %user.id, "failed to update last login: {err:#}");
        }

        let session = self.issue(user.claims())?;
        info!(user_id = %user.id, "login succeeded");
        Ok(session)
    }

    /// API key authentication with client id and secret.
    ///
    /// # Errors
    /// `AuthError::Failed` for unknown clients or wrong secrets.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        client_id: &str,
        secret: &str,
    ) -> Result<Authenticated, AuthError> {
        let client_id = client_id.trim();
        if !valid_client_id(client_id) {
            return Err(AuthError::InvalidInput("invalid client id"));
        }
        if secret.is_empty() {
            return Err(AuthError::InvalidInput("missing client secret"));
        }

        let Some(key) = self.store.api_key_by_client_id(client_id).await? else {
            let _ = passwd::verify(DUMMY_DERIVED_KEY, secret);
            return Err(self.deny("unknown client").await);
        };
        if !matches!(passwd::verify(&key.secret, secret), Ok(true)) {
            return Err(self.deny("wrong client secret").await);
        }

        if let Err(err) = self.store.update_last_seen(key.id, Utc::now()).await {
            warn!(api_key_id = %key.id, "failed to update last seen: {err:#}");
        }

        let session = self.issue(key.claims())?;
        info!(api_key_id = %key.id, "api key authenticated");
        Ok(session)
    }

    /// Exchange a refresh token for a new pair. When the access token from the
    /// same issuance is supplied it may be expired, but must carry the same
    /// token id and subject.
    ///
    /// # Errors
    /// `AuthError::Failed` for invalid refresh tokens, mismatched pairs and
    /// subjects that can no longer authenticate.
    #[instrument(skip_all)]
    pub async fn reauthenticate(
        &self,
        refresh_token: &str,
        access_token: Option<&str>,
    ) -> Result<Authenticated, AuthError> {
        let refresh = match self.issuer.verify_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(err) => {
                warn!("refresh token rejected: {err}");
                return Err(self.deny("invalid refresh token").await);
            }
        };

        if let Some(access_token) = access_token {
            match self.issuer.parse(access_token) {
                Ok(access) if access.jti == refresh.jti && access.sub == refresh.sub => {}
                Ok(_) => return Err(self.deny("access and refresh tokens do not pair").await),
                Err(err) => {
                    warn!("access token rejected: {err}");
                    return Err(self.deny("invalid access token").await);
                }
            }
        }

        let subject = match refresh.subject() {
            Ok(subject) => subject,
            Err(err) => {
                warn!("{err}");
                return Err(self.deny("unknown subject").await);
            }
        };
        let claims = self.reload(subject).await?;
        let session = self.issue(claims)?;
        debug!(%subject, "reauthenticated");
        Ok(session)
    }

    async fn reload(&self, subject: Subject) -> Result<Claims, AuthError> {
        match subject {
            Subject::User(id) => {
                let Some(user) = self.store.user_by_id(id).await? else {
                    return Err(self.deny("user no longer exists").await);
                };
                if !user.verified {
                    return Err(self.deny("identity not verified").await);
                }
                if let Err(err) = self.store.update_last_login(id, Utc::now()).await {
                    warn!(user_id = %id, "failed to update last login: {err:#}");
                }
                Ok(user.claims())
            }
            Subject::ApiKey(id) => {
                let Some(key) = self.store.api_key_by_id(id).await? else {
                    return Err(self.deny("api key no longer exists").await);
                };
                if let Err(err) = self.store.update_last_seen(id, Utc::now()).await {
                    warn!(api_key_id = %id, "failed to update last seen: {err:#}");
                }
                Ok(key.claims())
            }
            Subject::Verification(_) => Err(self.deny("subject type cannot reauthenticate").await),
        }
    }

    /// `Set-Cookie` headers expiring both auth cookies on every audience domain.
    ///
    /// # Errors
    /// Returns an internal error if an audience entry has no host.
    pub fn logout(&self) -> Result<HeaderMap, AuthError> {
        let mut headers = HeaderMap::new();
        self.cookies
            .clear_auth_cookies(&mut headers, self.issuer.audience())?;
        Ok(headers)
    }

    /// Send a verification token for `purpose` to `email`.
    ///
    /// Unknown identities, already-verified emails and requests inside the
    /// resend cooldown all succeed without sending anything. Every outcome
    /// past input validation waits one randomized delay, so response time does
    /// not reveal whether the email is registered.
    ///
    /// # Errors
    /// `AuthError::InvalidInput` for a malformed email; internal errors for
    /// store or delivery failures.
    #[instrument(skip_all, fields(purpose = ?purpose))]
    pub async fn request_verification(&self, email: &str, purpose: Purpose) -> Result<(), AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidInput("invalid email"));
        }

        let outcome = self.send_verification(&email, purpose).await;
        self.config.failure_delay.wait().await;
        outcome
    }

    async fn send_verification(&self, email: &str, purpose: Purpose) -> Result<(), AuthError> {
        let Some(user) = self.store.user_by_email(email).await? else {
            debug!("verification requested for unknown identity");
            return Ok(());
        };
        if purpose == Purpose::VerifyEmail && user.verified {
            debug!(user_id = %user.id, "email already verified");
            return Ok(());
        }

        let now = Utc::now();
        if let Some(previous) = self.store.latest_verification(user.id, purpose).await? {
            if previous.created_at + self.config.resend_cooldown > now {
                debug!(user_id = %user.id, "resend requested too soon");
                return Ok(());
            }
        }

        let (token, signed) = self.signer.sign(VerificationToken::new(
            user.id,
            purpose,
            now + self.config.verification_ttl,
        ))?;
        self.store
            .save_verification(VerificationRecord {
                id: token.id,
                resource_id: token.resource_id,
                purpose,
                expiration: token.expiration,
                created_at: now,
            })
            .await?;
        self.sender.send(&VerificationMessage {
            to_email: user.email,
            purpose,
            token: signed,
        })?;
        info!(user_id = %user.id, token_id = %token.id, "verification token issued");
        Ok(())
    }

    /// Consume an email verification token.
    ///
    /// # Errors
    /// `AuthError::Denied` for any unusable token.
    #[instrument(skip_all)]
    pub async fn verify_email(&self, signed: &str) -> Result<(), AuthError> {
        let record = self.redeem(signed, Purpose::VerifyEmail).await?;
        self.store.mark_email_verified(record.resource_id).await?;
        info!(user_id = %record.resource_id, "email verified");
        Ok(())
    }

    /// Consume a password reset token and store a new derived key.
    ///
    /// # Errors
    /// `AuthError::InvalidInput` for an empty password, `AuthError::Denied`
    /// for any unusable token.
    #[instrument(skip_all)]
    pub async fn reset_password(&self, signed: &str, new_password: &str) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::InvalidInput("missing password"));
        }
        let derived_key = passwd::create(new_password)?;
        let record = self.redeem(signed, Purpose::ResetPassword).await?;
        self.store
            .update_password(record.resource_id, derived_key)
            .await?;
        info!(user_id = %record.resource_id, "password reset");
        Ok(())
    }

    /// Check a signed token against its stored record and delete the record.
    async fn redeem(&self, signed: &str, purpose: Purpose) -> Result<VerificationRecord, AuthError> {
        let token = match self.signer.verify(signed.trim()) {
            Ok((true, token)) => token,
            Ok((false, token)) => {
                warn!(token_id = %token.id, "insecure verification token");
                return Err(self.refuse("signature mismatch").await);
            }
            Err(verification::Error::Expired) => return Err(self.refuse("token expired").await),
            Err(err) => {
                debug!("{err}");
                return Err(self.refuse("malformed token").await);
            }
        };
        if token.purpose != purpose {
            return Err(self.refuse("token issued for another purpose").await);
        }

        let Some(record) = self.store.verification(token.id).await? else {
            return Err(self.refuse("no stored record").await);
        };
        if record.resource_id != token.resource_id || record.purpose != purpose {
            return Err(self.refuse("record does not match token").await);
        }
        if record.expiration <= Utc::now() {
            self.store.delete_verification(record.id).await?;
            return Err(self.refuse("stored record expired").await);
        }
        if !self.store.delete_verification(record.id).await? {
            return Err(self.refuse("record already consumed").await);
        }
        Ok(record)
    }

    fn issue(&self, claims: Claims) -> Result<Authenticated, AuthError> {
        let tokens = self.issuer.create_tokens(claims)?;
        let mut cookies = HeaderMap::new();
        self.cookies
            .set_auth_cookies(&mut cookies, &tokens.access_token, &tokens.refresh_token)?;
        Ok(Authenticated { tokens, cookies })
    }

    async fn deny(&self, reason: &'static str) -> AuthError {
        debug!(reason, "authentication failed");
        self.config.failure_delay.wait().await;
        AuthError::Failed
    }

    async fn refuse(&self, reason: &'static str) -> AuthError {
        debug!(reason, "verification denied");
        self.config.failure_delay.wait().await;
        AuthError::Denied
    }
}
