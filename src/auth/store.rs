//! Credential records and the narrow interface the workflow reads them through.

use crate::tokens::{Claims, Subject};
use crate::verification::Purpose;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Ulid,
    /// Normalized (trimmed, lowercase).
    pub email: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub permissions: Vec<String>,
    /// Encoded derived key.
    pub password: String,
    pub verified: bool,
    pub last_login: Option<DateTime<Utc>>,
}

impl UserRecord {
    /// Access token claims for this user.
    #[must_use]
    pub fn claims(&self) -> Claims {
        Claims {
            email: Some(self.email.clone()),
            name: self.name.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
            ..Claims::for_subject(Subject::User(self.id))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub id: Ulid,
    pub client_id: String,
    /// Encoded derived key of the client secret.
    pub secret: String,
    pub name: Option<String>,
    pub role: Option<String>,
    pub permissions: Vec<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl ApiKeyRecord {
    #[must_use]
    pub fn claims(&self) -> Claims {
        Claims {
            client_id: Some(self.client_id.clone()),
            name: self.name.clone(),
            role: self.role.clone(),
            permissions: self.permissions.clone(),
            ..Claims::for_subject(Subject::ApiKey(self.id))
        }
    }
}

/// Persisted side of a verification token; deleted after first use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationRecord {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub purpose: Purpose,
    pub expiration: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Storage of user, API-key and verification records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn user_by_id(&self, id: Ulid) -> Result<Option<UserRecord>>;

    async fn update_last_login(&self, id: Ulid, at: DateTime<Utc>) -> Result<()>;

    async fn api_key_by_client_id(&self, client_id: &str) -> Result<Option<ApiKeyRecord>>;

    async fn api_key_by_id(&self, id: Ulid) -> Result<Option<ApiKeyRecord>>;

    async fn update_last_seen(&self, id: Ulid, at: DateTime<Utc>) -> Result<()>;

    async fn save_verification(&self, record: VerificationRecord) -> Result<()>;

    async fn verification(&self, id: Ulid) -> Result<Option<VerificationRecord>>;

    /// Most recently created record for a resource and purpose.
    async fn latest_verification(
        &self,
        resource_id: Ulid,
        purpose: Purpose,
    ) -> Result<Option<VerificationRecord>>;

    /// Returns false if the record did not exist.
    async fn delete_verification(&self, id: Ulid) -> Result<bool>;

    async fn mark_email_verified(&self, user_id: Ulid) -> Result<()>;

    async fn update_password(&self, user_id: Ulid, derived_key: String) -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct VerificationMessage {
    pub to_email: String,
    pub purpose: Purpose,
    /// Signed token to embed in the out-of-band link.
    pub token: String,
}

/// Delivery of verification tokens to their owner.
pub trait TokenSender: Send + Sync {
    /// # Errors
    /// Returns an error if the message could not be handed off.
    fn send(&self, message: &VerificationMessage) -> Result<()>;
}

/// Local dev sender: logs the recipient and purpose, never the token.
#[derive(Clone, Debug)]
pub struct LogTokenSender;

impl TokenSender for LogTokenSender {
    fn send(&self, message: &VerificationMessage) -> Result<()> {
        tracing::info!(
            to_email = %message.to_email,
            purpose = ?message.purpose,
            "verification token send stub"
        );
        Ok(())
    }
}
