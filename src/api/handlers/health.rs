use crate::auth::AuthWorkflow;
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    name: String,
    version: String,
    keys: usize,
    current_key: Option<String>,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "A signing key is available", body = [Health]),
        (status = 503, description = "No signing key is loaded", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, workflow: Extension<Arc<AuthWorkflow>>) -> impl IntoResponse {
    let issuer = workflow.issuer();
    let current_key = issuer.current_key_id();

    let health = Health {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        keys: issuer.key_set().len(),
        current_key: current_key.map(|kid| kid.to_string()),
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let headers = format!("{}:{}", health.name, health.version)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if current_key.is_some() {
        (StatusCode::OK, headers, body)
    } else {
        debug!("No current signing key");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}
