use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // key material
    #[error("could not read key file {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("key file contains no PEM blocks")]
    NoPemBlocks,
    #[error("malformed PEM block: {0}")]
    MalformedPem(String),
    #[error("unexpected PEM block type {0:?}")]
    UnexpectedPemType(String),
    #[error("key file contains more than one {0} block")]
    DuplicatePemBlock(&'static str),
    #[error("key file is missing its {0} block")]
    MissingPemBlock(&'static str),
    #[error("could not decode {0} key")]
    KeyDecode(&'static str),
    #[error("public key does not match private key")]
    KeyMismatch,
    #[error("could not encode key: {0}")]
    KeyEncode(String),

    // key set
    #[error("key id {0} is already registered")]
    DuplicateKeyId(String),
    #[error("cannot remove the current signing key {0}")]
    RemoveCurrentKey(String),
    #[error("issuer has no signing key")]
    NoSigningKey,

    // verification
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unexpected signing method {0:?}")]
    UnexpectedAlgorithm(String),
    #[error("token does not have kid in header")]
    MissingKeyId,
    #[error("token kid is the zero value")]
    ZeroKeyId,
    #[error("unknown signing key")]
    UnknownSigningKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("could not parse claims from token")]
    UnparseableClaims,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("invalid audience")]
    InvalidAudience,
    #[error("token is not a refresh token")]
    NotRefreshToken,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("token expired")]
    Expired,
    #[error("unknown subject type in {0:?}")]
    UnknownSubject(String),

    // issuance
    #[error("identifier generator exhausted within a single millisecond")]
    IdOverflow,

    // configuration
    #[error("invalid token configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for errors caused by a token presented by a client rather than by
    /// the server's own configuration or key material.
    #[must_use]
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::TokenFormat
                | Self::Base64
                | Self::Json(_)
                | Self::UnexpectedAlgorithm(_)
                | Self::MissingKeyId
                | Self::ZeroKeyId
                | Self::UnknownSigningKey
                | Self::InvalidSignature
                | Self::UnparseableClaims
                | Self::InvalidIssuer
                | Self::InvalidAudience
                | Self::NotRefreshToken
                | Self::NotYetValid
                | Self::Expired
                | Self::UnknownSubject(_)
        )
    }
}
