//! Signing keys, the published key set and access/refresh token issuance.

pub mod claims;
pub mod config;
mod error;
pub mod ids;
pub mod issuer;
pub mod jwks;
pub mod keys;

pub use claims::{Claims, Subject};
pub use config::TokenConfig;
pub use error::Error;
pub use issuer::{Issuer, TokenPair};
pub use jwks::{Jwk, Jwks, KeySet, Snapshot};
pub use keys::{Algorithm, Ed25519Key, SigningKey};
