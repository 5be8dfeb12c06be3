//! In-process credential store for local development and tests.

use super::store::{
    ApiKeyRecord, CredentialStore, TokenSender, UserRecord, VerificationMessage,
    VerificationRecord,
};
use super::utils::normalize_email;
use crate::verification::Purpose;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::RwLock;
use ulid::Ulid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Ulid, UserRecord>,
    api_keys: HashMap<Ulid, ApiKeyRecord>,
    verifications: HashMap<Ulid, VerificationRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a user. The email is stored normalized.
    ///
    /// # Errors
    /// Returns an error if another user already has the email.
    pub async fn insert_user(&self, mut user: UserRecord) -> Result<()> {
        user.email = normalize_email(&user.email);
        let mut tables = self.tables.write().await;
        if tables
            .users
            .values()
            .any(|existing| existing.email == user.email && existing.id != user.id)
        {
            return Err(anyhow!("email {} already registered", user.email));
        }
        tables.users.insert(user.id, user);
        Ok(())
    }

    /// # Errors
    /// Returns an error if another key already has the client id.
    pub async fn insert_api_key(&self, key: ApiKeyRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables
            .api_keys
            .values()
            .any(|existing| existing.client_id == key.client_id && existing.id != key.id)
        {
            return Err(anyhow!("client id {} already registered", key.client_id));
        }
        tables.api_keys.insert(key.id, key);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn user_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn user_by_id(&self, id: Ulid) -> Result<Option<UserRecord>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn update_last_login(&self, id: Ulid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| anyhow!("user {id} not found"))?;
        user.last_login = Some(at);
        Ok(())
    }

    async fn api_key_by_client_id(&self, client_id: &str) -> Result<Option<ApiKeyRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .api_keys
            .values()
            .find(|key| key.client_id == client_id)
            .cloned())
    }

    async fn api_key_by_id(&self, id: Ulid) -> Result<Option<ApiKeyRecord>> {
        Ok(self.tables.read().await.api_keys.get(&id).cloned())
    }

    async fn update_last_seen(&self, id: Ulid, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.write().await;
        let key = tables
            .api_keys
            .get_mut(&id)
            .ok_or_else(|| anyhow!("api key {id} not found"))?;
        key.last_seen = Some(at);
        Ok(())
    }

    async fn save_verification(&self, record: VerificationRecord) -> Result<()> {
        self.tables
            .write()
            .await
            .verifications
            .insert(record.id, record);
        Ok(())
    }

    async fn verification(&self, id: Ulid) -> Result<Option<VerificationRecord>> {
        Ok(self.tables.read().await.verifications.get(&id).cloned())
    }

    async fn latest_verification(
        &self,
        resource_id: Ulid,
        purpose: Purpose,
    ) -> Result<Option<VerificationRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .verifications
            .values()
            .filter(|record| record.resource_id == resource_id && record.purpose == purpose)
            .max_by_key(|record| record.created_at)
            .cloned())
    }

    async fn delete_verification(&self, id: Ulid) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .await
            .verifications
            .remove(&id)
            .is_some())
    }

    async fn mark_email_verified(&self, user_id: Ulid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        user.verified = true;
        Ok(())
    }

    async fn update_password(&self, user_id: Ulid, derived_key: String) -> Result<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        user.password = derived_key;
        Ok(())
    }
}

/// Sender that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryOutbox {
    sent: Mutex<Vec<VerificationMessage>>,
}

impl MemoryOutbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<VerificationMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenSender for MemoryOutbox {
    fn send(&self, message: &VerificationMessage) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }
}
