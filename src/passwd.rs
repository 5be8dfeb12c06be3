//! Password derived keys.
//!
//! Encoded as `$argon2id$v=19$m=<KiB>,t=<passes>,p=<lanes>$<salt>$<hash>` with
//! salt and hash in unpadded standard base64, the PHC string layout. Each
//! field is parsed on its own so operators get a precise error for a corrupt
//! record.

use argon2::{Algorithm, Argon2, Params, Version};
use base64ct::{Base64Unpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;
use thiserror::Error;

const ALGORITHM_TAG: &str = "argon2id";
const MEMORY_COST_KIB: u32 = 64 * 1024;
const TIME_COST: u32 = 1;
const PARALLELISM: u32 = 2;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

static PARAMS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^m=([^,]*),t=([^,]*),p=([^,]*)$").expect("PARAMS is a valid regex pattern")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("derived key must not be empty")]
    EmptyDerivedKey,
    #[error("derived key has {0} fields, expected 6")]
    FieldCount(usize),
    #[error("derived key must start with '$'")]
    MissingPrefix,
    #[error("unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(String),
    #[error("malformed version field {0:?}")]
    MalformedVersion(String),
    #[error("unsupported argon2 version {0}")]
    UnsupportedVersion(u32),
    #[error("malformed parameter field {0:?}")]
    MalformedParams(String),
    #[error("parameter {name} value {value:?} is not a valid number")]
    InvalidParam { name: &'static str, value: String },
    #[error("salt is not valid base64")]
    InvalidSalt,
    #[error("hash is not valid base64")]
    InvalidHash,
    #[error("key derivation failed: {0}")]
    Kdf(String),
}

/// Fields of an encoded derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKey {
    pub version: u32,
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

impl DerivedKey {
    /// Parse an encoded derived key.
    ///
    /// # Errors
    /// Returns a distinct error for each malformed field.
    pub fn parse(encoded: &str) -> Result<Self, Error> {
        if encoded.is_empty() {
            return Err(Error::EmptyDerivedKey);
        }
        let fields: Vec<&str> = encoded.split('$').collect();
        if fields.len() != 6 {
            return Err(Error::FieldCount(fields.len()));
        }
        if !fields[0].is_empty() {
            return Err(Error::MissingPrefix);
        }
        if fields[1] != ALGORITHM_TAG {
            return Err(Error::UnsupportedAlgorithm(fields[1].to_string()));
        }

        let version = fields[2]
            .strip_prefix("v=")
            .ok_or_else(|| Error::MalformedVersion(fields[2].to_string()))?;
        let version = parse_param("v", version)?;
        if version != u32::from(Version::V0x13) {
            return Err(Error::UnsupportedVersion(version));
        }

        let captures = PARAMS
            .captures(fields[3])
            .ok_or_else(|| Error::MalformedParams(fields[3].to_string()))?;
        let capture = |i: usize| captures.get(i).map_or("", |m| m.as_str());

        Ok(Self {
            version,
            memory_cost: parse_param("m", capture(1))?,
            time_cost: parse_param("t", capture(2))?,
            parallelism: parse_param("p", capture(3))?,
            salt: Base64Unpadded::decode_vec(fields[4]).map_err(|_| Error::InvalidSalt)?,
            hash: Base64Unpadded::decode_vec(fields[5]).map_err(|_| Error::InvalidHash)?,
        })
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "${ALGORITHM_TAG}$v={}$m={},t={},p={}${}${}",
            self.version,
            self.memory_cost,
            self.time_cost,
            self.parallelism,
            Base64Unpadded::encode_string(&self.salt),
            Base64Unpadded::encode_string(&self.hash),
        )
    }
}

fn parse_param(name: &'static str, value: &str) -> Result<u32, Error> {
    value.parse().map_err(|_| Error::InvalidParam {
        name,
        value: value.to_string(),
    })
}

fn derive(
    password: &[u8],
    salt: &[u8],
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
    output_len: usize,
) -> Result<Vec<u8>, Error> {
    let params = Params::new(memory_cost, time_cost, parallelism, Some(output_len))
        .map_err(|err| Error::Kdf(err.to_string()))?;
    let mut out = vec![0u8; output_len];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(password, salt, &mut out)
        .map_err(|err| Error::Kdf(err.to_string()))?;
    Ok(out)
}

/// Derive a key for `password` under a fresh random salt.
///
/// # Errors
/// Returns `Error::EmptyPassword` for empty input.
pub fn create(password: &str) -> Result<String, Error> {
    if password.is_empty() {
        return Err(Error::EmptyPassword);
    }
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let hash = derive(
        password.as_bytes(),
        &salt,
        MEMORY_COST_KIB,
        TIME_COST,
        PARALLELISM,
        HASH_LEN,
    )?;
    Ok(DerivedKey {
        version: u32::from(Version::V0x13),
        memory_cost: MEMORY_COST_KIB,
        time_cost: TIME_COST,
        parallelism: PARALLELISM,
        salt,
        hash,
    }
    .encode())
}

/// Recompute the key with the stored parameters and compare in constant time.
///
/// # Errors
/// Returns a parse error for a malformed derived key and
/// `Error::EmptyPassword` for an empty password.
pub fn verify(encoded: &str, password: &str) -> Result<bool, Error> {
    if password.is_empty() {
        return Err(Error::EmptyPassword);
    }
    let stored = DerivedKey::parse(encoded)?;
    if stored.hash.is_empty() {
        return Ok(false);
    }
    let computed = derive(
        password.as_bytes(),
        &stored.salt,
        stored.memory_cost,
        stored.time_cost,
        stored.parallelism,
        stored.hash.len(),
    )?;
    Ok(bool::from(computed.ct_eq(&stored.hash)))
}
