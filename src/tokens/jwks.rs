//! Published key set.
//!
//! `KeySet` is the only shared mutable structure in the engine. Reads (serving
//! the JWKS document, resolving a verification key) take the shared lock;
//! `add`/`remove` and the fingerprint computation take the exclusive lock.
//! The fingerprint and last-modified time change only through `add`/`remove`.

use super::{keys::SigningKey, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::warn;
use ulid::Ulid;

/// Planned interval between key rotations. Cache directives are derived from it.
pub const KEY_ROTATION_INTERVAL: Duration = Duration::from_secs(28 * 24 * 60 * 60);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    pub kid: String,
}

/// The published document together with its validators, read under one lock.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub jwks: Jwks,
    /// Quoted strong validator, empty when the set has no keys.
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct KeyEntry {
    pub kid: Ulid,
    pub key: Arc<dyn SigningKey>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Vec<KeyEntry>,
    etag: Option<String>,
    last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct KeySet {
    inner: RwLock<Inner>,
}

impl KeySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key.
    ///
    /// # Errors
    /// Returns `Error::DuplicateKeyId` if `kid` is already present.
    pub fn add(&self, kid: Ulid, key: Arc<dyn SigningKey>) -> Result<(), Error> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.entries.iter().any(|entry| entry.kid == kid) {
            return Err(Error::DuplicateKeyId(kid.to_string()));
        }
        inner.entries.push(KeyEntry { kid, key });
        inner.etag = None;
        inner.last_modified = Some(Utc::now());
        Ok(())
    }

    /// Drop a key from the published set. Returns false if it was not present.
    pub fn remove(&self, kid: Ulid) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.kid != kid);
        if inner.entries.len() == before {
            return false;
        }
        inner.etag = None;
        inner.last_modified = Some(Utc::now());
        true
    }

    /// Document, `ETag` and last-modified time as of a single point in time, so
    /// a concurrent `add`/`remove` can never pair one body with another's
    /// validator.
    pub fn snapshot(&self) -> Snapshot {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if inner.etag.is_some() || inner.entries.is_empty() {
                return Snapshot {
                    jwks: document(&inner.entries),
                    etag: inner.etag.clone().unwrap_or_default(),
                    last_modified: inner.last_modified,
                };
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let jwks = document(&inner.entries);
        let etag = match &inner.etag {
            Some(etag) => etag.clone(),
            None if inner.entries.is_empty() => String::new(),
            None => {
                let etag = fingerprint(&jwks);
                inner.etag = Some(etag.clone());
                etag
            }
        };
        Snapshot {
            jwks,
            etag,
            last_modified: inner.last_modified,
        }
    }

    /// Resolve a key by id. Duplicate ids cannot be inserted through `add`;
    /// if one is ever observed the first entry wins.
    pub fn find(&self, kid: Ulid) -> Option<Arc<dyn SigningKey>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches = inner.entries.iter().filter(|entry| entry.kid == kid);
        let first = matches.next()?;
        if matches.next().is_some() {
            warn!(%kid, "multiple keys share a key id, using the first");
        }
        Some(Arc::clone(&first.key))
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `Cache-Control` value for the JWKS document. Keys rotate rarely and on a
/// plan, so caches may hold the document for a quarter of the rotation
/// interval and serve it stale for a day while revalidating.
pub fn cache_control() -> &'static str {
    static CACHE_CONTROL: OnceLock<String> = OnceLock::new();
    CACHE_CONTROL.get_or_init(|| {
        let max_age = KEY_ROTATION_INTERVAL.as_secs() / 4;
        let stale = KEY_ROTATION_INTERVAL.as_secs() / 28;
        format!("public, max-age={max_age}, must-revalidate, stale-while-revalidate={stale}")
    })
}

fn document(entries: &[KeyEntry]) -> Jwks {
    Jwks {
        keys: entries
            .iter()
            .map(|entry| entry.key.jwk(&entry.kid.to_string()))
            .collect(),
    }
}

fn fingerprint(jwks: &Jwks) -> String {
    // serde_json keeps struct field order, so this serialization is canonical
    let canonical = serde_json::to_vec(jwks).unwrap_or_default();
    format!("\"{:x}\"", Sha256::digest(&canonical))
}
