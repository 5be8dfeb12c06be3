//! JSON seed file for [`MemoryStore`].
//!
//! ```json
//! {
//!   "users": [{ "email": "alice@example.test", "password": "…", "permissions": ["read"] }],
//!   "api_keys": [{ "client_id": "ci-runner", "secret": "$argon2id$v=19$…" }]
//! }
//! ```
//!
//! `password` and `secret` take either an encoded derived key or a plain
//! value that is derived on load.

use super::memory::MemoryStore;
use super::store::{ApiKeyRecord, UserRecord};
use super::utils::{normalize_email, valid_client_id, valid_email};
use crate::passwd::{self, DerivedKey};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;
use ulid::Ulid;

const DERIVED_KEY_PREFIX: &str = "$argon2id$";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Seed {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub api_keys: Vec<SeedApiKey>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default = "verified_by_default")]
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedApiKey {
    pub client_id: String,
    pub secret: String,
    pub name: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

const fn verified_by_default() -> bool {
    true
}

impl Seed {
    /// # Errors
    /// Returns an error if the file cannot be read or is not a valid seed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse seed file: {}", path.display()))
    }

    /// Insert every record into `store`. Returns the number of users and API
    /// keys inserted.
    ///
    /// # Errors
    /// Returns an error for an invalid email or client id, a malformed derived
    /// key, an empty secret or a duplicate record. Records before the failing
    /// one stay inserted.
    pub async fn apply(self, store: &MemoryStore) -> Result<(usize, usize)> {
        let users = self.users.len();
        let api_keys = self.api_keys.len();

        for user in self.users {
            let email = normalize_email(&user.email);
            if !valid_email(&email) {
                bail!("invalid email in seed: {:?}", user.email);
            }
            let password = derived_key(&user.password)
                .with_context(|| format!("invalid password for {email}"))?;
            store
                .insert_user(UserRecord {
                    id: Ulid::new(),
                    email,
                    name: user.name,
                    role: user.role,
                    permissions: user.permissions,
                    password,
                    verified: user.verified,
                    last_login: None,
                })
                .await?;
        }

        for key in self.api_keys {
            if !valid_client_id(&key.client_id) {
                bail!("invalid client id in seed: {:?}", key.client_id);
            }
            let secret = derived_key(&key.secret)
                .with_context(|| format!("invalid secret for {}", key.client_id))?;
            store
                .insert_api_key(ApiKeyRecord {
                    id: Ulid::new(),
                    client_id: key.client_id,
                    secret,
                    name: key.name,
                    role: key.role,
                    permissions: key.permissions,
                    last_seen: None,
                })
                .await?;
        }

        debug!(users, api_keys, "seed applied");
        Ok((users, api_keys))
    }
}

fn derived_key(value: &str) -> Result<String> {
    if value.starts_with(DERIVED_KEY_PREFIX) {
        DerivedKey::parse(value)?;
        return Ok(value.to_string());
    }
    Ok(passwd::create(value)?)
}
