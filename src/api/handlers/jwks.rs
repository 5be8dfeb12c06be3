//! Public key publication and discovery metadata.

use crate::{
    auth::AuthWorkflow,
    tokens::{issuer::REAUTHENTICATE_PATH, jwks::cache_control},
};
use axum::{
    extract::Extension,
    http::{
        header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH, LAST_MODIFIED},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

pub const JWKS_ROUTE: &str = "/.well-known/jwks.json";

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct OpenIdConfiguration {
    pub issuer: String,
    pub jwks_uri: String,
    pub token_endpoint: String,
    pub response_types_supported: Vec<String>,
    pub subject_types_supported: Vec<String>,
    pub id_token_signing_alg_values_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
}

/// Publish every signing key with conditional-request validators.
#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "JSON Web Key Set"),
        (status = 304, description = "The cached key set is current"),
    ),
    tag = "keys"
)]
pub async fn jwks(headers: HeaderMap, workflow: Extension<Arc<AuthWorkflow>>) -> Response {
    let snapshot = workflow.issuer().key_set().snapshot();
    let etag = snapshot.etag;

    let mut response_headers = HeaderMap::new();
    response_headers.insert(CACHE_CONTROL, HeaderValue::from_static(cache_control()));
    if !etag.is_empty() {
        match HeaderValue::from_str(&etag) {
            Ok(value) => {
                response_headers.insert(ETAG, value);
            }
            Err(err) => error!("Failed to build ETag header: {err}"),
        }
    }
    if let Some(last_modified) = snapshot.last_modified {
        if let Ok(value) = HeaderValue::from_str(&http_date(last_modified)) {
            response_headers.insert(LAST_MODIFIED, value);
        }
    }

    if !etag.is_empty() && if_none_match(&headers, &etag) {
        debug!("JWKS not modified");
        return (StatusCode::NOT_MODIFIED, response_headers).into_response();
    }

    (StatusCode::OK, response_headers, Json(snapshot.jwks)).into_response()
}

/// Static discovery document derived from the issuer configuration.
#[utoipa::path(
    get,
    path = "/.well-known/openid-configuration",
    responses(
        (status = 200, description = "Discovery metadata", body = OpenIdConfiguration),
    ),
    tag = "keys"
)]
pub async fn openid_configuration(workflow: Extension<Arc<AuthWorkflow>>) -> impl IntoResponse {
    Json(discovery(&workflow))
}

fn discovery(workflow: &AuthWorkflow) -> OpenIdConfiguration {
    let issuer = workflow.issuer();
    let base = issuer.issuer().trim_end_matches('/');
    OpenIdConfiguration {
        issuer: issuer.issuer().to_string(),
        jwks_uri: format!("{base}{JWKS_ROUTE}"),
        token_endpoint: format!("{base}{REAUTHENTICATE_PATH}"),
        response_types_supported: vec!["token".to_string()],
        subject_types_supported: vec!["public".to_string()],
        id_token_signing_alg_values_supported: vec![issuer.algorithm().to_string()],
        token_endpoint_auth_methods_supported: vec!["client_secret_post".to_string()],
    }
}

/// RFC 7231 IMF-fixdate.
fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Whether `If-None-Match` lists `etag` (weak comparison) or `*`.
fn if_none_match(headers: &HeaderMap, etag: &str) -> bool {
    let current = etag.trim_start_matches("W/");
    headers
        .get_all(IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| candidate == "*" || candidate.trim_start_matches("W/") == current)
}
