use super::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// The principal a token was issued to.
///
/// Encoded in the `sub` claim as a one-character type tag followed by the
/// identifier, e.g. `u01HZX...` for a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Subject {
    User(Ulid),
    ApiKey(Ulid),
    Verification(Ulid),
}

impl Subject {
    #[must_use]
    pub const fn tag(&self) -> char {
        match self {
            Self::User(_) => 'u',
            Self::ApiKey(_) => 'k',
            Self::Verification(_) => 'v',
        }
    }

    #[must_use]
    pub const fn id(&self) -> Ulid {
        match self {
            Self::User(id) | Self::ApiKey(id) | Self::Verification(id) => *id,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag(), self.id())
    }
}

impl FromStr for Subject {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let tag = chars.next().ok_or_else(|| Error::UnknownSubject(s.to_string()))?;
        let id = Ulid::from_string(chars.as_str()).map_err(|_| Error::UnknownSubject(s.to_string()))?;
        match tag {
            'u' => Ok(Self::User(id)),
            'k' => Ok(Self::ApiKey(id)),
            'v' => Ok(Self::Verification(id)),
            _ => Err(Error::UnknownSubject(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub aud: Vec<String>,
    #[serde(default)]
    pub iss: String,
    #[serde(default)]
    pub jti: String,
    #[serde(default)]
    pub iat: i64,
    #[serde(default)]
    pub nbf: i64,
    #[serde(default)]
    pub exp: i64,
    #[serde(rename = "clientID", default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
}

impl Claims {
    /// Claims for `subject` with no registered claims set; the issuer fills in
    /// audience, issuer, id and timestamps.
    #[must_use]
    pub fn for_subject(subject: Subject) -> Self {
        Self {
            sub: subject.to_string(),
            ..Self::default()
        }
    }

    /// Decode the `sub` claim.
    ///
    /// # Errors
    /// Returns `Error::UnknownSubject` for an empty, malformed or unrecognized subject.
    pub fn subject(&self) -> Result<Subject, Error> {
        self.sub.parse()
    }

    #[must_use]
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.iter().any(|aud| aud == audience)
    }

    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|perm| perm == permission)
    }

    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.iat, 0)
    }

    #[must_use]
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.nbf, 0)
    }

    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
