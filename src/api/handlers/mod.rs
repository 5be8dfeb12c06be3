//! HTTP handlers. Each is a thin adapter over the auth workflow or the issuer.

pub mod auth;
pub mod health;
pub mod jwks;
