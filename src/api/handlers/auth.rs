//! Login, API key, reauthentication and verification endpoints.
//!
//! Responses never say why an authentication attempt failed; the workflow
//! logs the reason.

use crate::{
    auth::{utils::extract_bearer_token, AuthError, AuthWorkflow, Authenticated},
    cookies::{read_cookie, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME},
    verification::Purpose,
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct AuthenticateRequest {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Default)]
pub struct ReauthenticateRequest {
    /// Falls back to the `refresh_token` cookie.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerificationRequest {
    pub email: String,
    pub purpose: Purpose,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

impl From<Authenticated> for TokenResponse {
    fn from(session: Authenticated) -> Self {
        let access = &session.tokens.access_claims;
        Self {
            expires_in: access.exp - access.iat,
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: "Bearer".to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidInput(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::Failed => {
                (StatusCode::UNAUTHORIZED, "failed authentication").into_response()
            }
            Self::Denied => (StatusCode::BAD_REQUEST, "verification denied").into_response(),
            Self::Internal(err) => {
                error!("Request failed: {err:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

fn session_response(result: Result<Authenticated, AuthError>) -> Response {
    match result {
        Ok(mut session) => {
            let cookies = std::mem::take(&mut session.cookies);
            (StatusCode::OK, cookies, Json(TokenResponse::from(session))).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Email and password login.
#[utoipa::path(
    post,
    path = "/v1/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued, auth cookies set", body = TokenResponse),
        (status = 400, description = "Malformed input", body = String),
        (status = 401, description = "Failed authentication", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    session_response(workflow.login(&request.email, &request.password).await)
}

/// API key authentication.
#[utoipa::path(
    post,
    path = "/v1/authenticate",
    request_body = AuthenticateRequest,
    responses(
        (status = 200, description = "Token pair issued, auth cookies set", body = TokenResponse),
        (status = 400, description = "Malformed input", body = String),
        (status = 401, description = "Failed authentication", body = String)
    ),
    tag = "auth"
)]
pub async fn authenticate(
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<AuthenticateRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    session_response(
        workflow
            .authenticate(&request.client_id, &request.client_secret)
            .await,
    )
}

/// Exchange a refresh token for a new pair.
///
/// The refresh token comes from the body or the `refresh_token` cookie. The
/// access token of the same issuance is read from the `access_token` cookie or
/// an `Authorization: Bearer` header when present.
#[utoipa::path(
    post,
    path = "/v1/reauthenticate",
    request_body = ReauthenticateRequest,
    responses(
        (status = 200, description = "Token pair issued, auth cookies set", body = TokenResponse),
        (status = 400, description = "No refresh token supplied", body = String),
        (status = 401, description = "Failed authentication", body = String)
    ),
    tag = "auth"
)]
pub async fn reauthenticate(
    headers: HeaderMap,
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<ReauthenticateRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let refresh_token = request
        .refresh_token
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| read_cookie(&headers, REFRESH_COOKIE_NAME));
    let Some(refresh_token) = refresh_token else {
        return (StatusCode::BAD_REQUEST, "Missing refresh token").into_response();
    };
    let access_token = read_cookie(&headers, ACCESS_COOKIE_NAME)
        .or_else(|| extract_bearer_token(&headers));

    session_response(
        workflow
            .reauthenticate(&refresh_token, access_token.as_deref())
            .await,
    )
}

/// Expire the auth cookies on every audience domain.
#[utoipa::path(
    post,
    path = "/v1/logout",
    responses(
        (status = 204, description = "Auth cookies cleared")
    ),
    tag = "auth"
)]
pub async fn logout(workflow: Extension<Arc<AuthWorkflow>>) -> Response {
    match workflow.logout() {
        Ok(cookies) => (StatusCode::NO_CONTENT, cookies).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Send a verification token. The response does not reveal whether the
/// email belongs to an account.
#[utoipa::path(
    post,
    path = "/v1/request-verification",
    request_body = VerificationRequest,
    responses(
        (status = 204, description = "Request accepted"),
        (status = 400, description = "Malformed input", body = String)
    ),
    tag = "auth"
)]
pub async fn request_verification(
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<VerificationRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    match workflow
        .request_verification(&request.email, request.purpose)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consume an email verification token.
#[utoipa::path(
    post,
    path = "/v1/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Invalid, expired or used token", body = String)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    if request.token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token").into_response();
    }
    match workflow.verify_email(&request.token).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Consume a password reset token and set a new password.
#[utoipa::path(
    post,
    path = "/v1/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Invalid, expired or used token", body = String)
    ),
    tag = "auth"
)]
pub async fn reset_password(
    workflow: Extension<Arc<AuthWorkflow>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload").into_response();
    };
    if request.token.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token").into_response();
    }
    match workflow
        .reset_password(&request.token, &request.password)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => err.into_response(),
    }
}
