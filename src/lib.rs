//! # Tessera (credential issuance and verification)
//!
//! `tessera` issues and verifies short-lived access tokens and longer-lived
//! refresh tokens signed with rotating Ed25519 keys, and publishes the public
//! halves as a JWKS document for external verifiers.
//!
//! ## Tokens
//!
//! Tokens are compact JWS (`EdDSA`) whose header carries the key id. Key ids
//! are ULIDs; the key with the greatest id signs, every registered key
//! verifies. A refresh token shares the access token's `jti` and subject, adds
//! the refresh audience and becomes valid shortly before the access token
//! expires.
//!
//! ## Credentials
//!
//! Passwords and API key secrets are stored as argon2id derived keys and
//! compared in constant time. Email verification and password reset use
//! HMAC-signed, single-use verification tokens.
//!
//! ## Cookies
//!
//! Access and refresh tokens are set as cookies on every domain of the token
//! audience. `Secure` is only dropped for local and private hosts.

pub mod api;
pub mod auth;
pub mod cli;
pub mod cookies;
pub mod passwd;
pub mod tokens;
pub mod verification;
