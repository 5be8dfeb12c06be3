use super::Error;
use chrono::Duration;
use std::collections::BTreeMap;
use std::path::PathBuf;
use ulid::Ulid;
use url::Url;

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
pub const DEFAULT_TOKEN_OVERLAP_SECONDS: i64 = -5 * 60;

/// Token issuance settings.
///
/// Built once at startup; [`TokenConfig::validate`] must pass before the
/// configuration reaches an `Issuer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    /// Key files to load, by key id.
    pub keys: BTreeMap<Ulid, PathBuf>,
    pub audience: Vec<String>,
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Negative: the refresh token becomes usable this long before the access
    /// token expires.
    pub token_overlap: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            keys: BTreeMap::new(),
            audience: Vec::new(),
            issuer: String::new(),
            access_ttl: Duration::seconds(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl: Duration::seconds(DEFAULT_REFRESH_TTL_SECONDS),
            token_overlap: Duration::seconds(DEFAULT_TOKEN_OVERLAP_SECONDS),
        }
    }
}

impl TokenConfig {
    /// Check the relationships between settings.
    ///
    /// # Errors
    /// Returns `Error::Config` describing the first violated rule.
    pub fn validate(&self) -> Result<(), Error> {
        if self.audience.is_empty() {
            return Err(Error::Config("at least one audience is required".to_string()));
        }
        if let Some(aud) = self.audience.iter().find(|aud| aud.trim().is_empty()) {
            return Err(Error::Config(format!("audience entry {aud:?} is empty")));
        }

        let issuer = Url::parse(&self.issuer)
            .map_err(|err| Error::Config(format!("issuer {:?} is not a URL: {err}", self.issuer)))?;
        if issuer.cannot_be_a_base() {
            return Err(Error::Config(format!(
                "issuer {:?} must be an absolute URL",
                self.issuer
            )));
        }

        if self.access_ttl <= Duration::zero() {
            return Err(Error::Config("access TTL must be positive".to_string()));
        }
        if self.refresh_ttl <= self.access_ttl {
            return Err(Error::Config(
                "refresh TTL must be longer than access TTL".to_string(),
            ));
        }
        if self.token_overlap >= Duration::zero() {
            return Err(Error::Config("token overlap must be negative".to_string()));
        }
        if -self.token_overlap > self.access_ttl {
            return Err(Error::Config(
                "token overlap must not exceed the access TTL".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a `kid=path,kid=path` key map.
///
/// # Errors
/// Returns `Error::Config` for entries without `=`, ids that are not ULIDs,
/// the zero id, or an id listed twice.
pub fn parse_key_paths(input: &str) -> Result<BTreeMap<Ulid, PathBuf>, Error> {
    let mut keys = BTreeMap::new();
    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (kid, path) = entry
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("key entry {entry:?} is not kid=path")))?;
        let kid = Ulid::from_string(kid.trim())
            .map_err(|_| Error::Config(format!("key id {kid:?} is not a ULID")))?;
        if kid.is_nil() {
            return Err(Error::Config("key id must not be the zero value".to_string()));
        }
        if keys.insert(kid, PathBuf::from(path.trim())).is_some() {
            return Err(Error::Config(format!("key id {kid} listed twice")));
        }
    }
    Ok(keys)
}
